//! Explicitly constructed collaborators shared by the application services.

use std::sync::Arc;

use crate::application::records::HomeLayout;
use crate::domain::AppConfig;
use crate::infrastructure::{
    Clock, ConfigStore, ExistenceCache, ExternalTools, SambaTools, SystemClock, TtlCache,
};

/// Everything a service needs, built once at startup and passed down.
#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<ConfigStore>,
    pub tools: Arc<dyn ExternalTools>,
    pub clock: Arc<dyn Clock>,
    pub cache: Arc<dyn ExistenceCache>,
    pub layout: HomeLayout,
}

impl AppContext {
    /// Context with injected collaborators; store and layout come from `config`.
    #[must_use]
    pub fn new(
        config: AppConfig,
        tools: Arc<dyn ExternalTools>,
        clock: Arc<dyn Clock>,
        cache: Arc<dyn ExistenceCache>,
    ) -> Self {
        Self {
            store: Arc::new(ConfigStore::new(&config.paths.smb_conf)),
            layout: HomeLayout::new(&config.paths.home_root),
            config,
            tools,
            clock,
            cache,
        }
    }

    /// Production context: real tools, system clock, TTL cache.
    #[must_use]
    pub fn from_config(config: AppConfig) -> Self {
        let tools = Arc::new(SambaTools::system(&config.paths.home_root));
        let cache = Arc::new(TtlCache::new(config.cache_ttl()));
        Self::new(config, tools, Arc::new(SystemClock), cache)
    }
}
