//! Domain layer - core types, errors and validation.
//!
//! This layer contains pure domain models and error types
//! without any external dependencies (files, processes, etc.).

pub mod app_config;
pub mod error;
pub mod models;
pub mod validation;

pub use app_config::{AppConfig, CacheConfig, DirectoryConfig, PathConfig, QueueConfig};
pub use error::{AppError, ErrorKind, Result};
pub use models::{
    Account, DeprovisionReport, GlobalSettings, HomesSettings, NewShare, OrphanedDirectory,
    RawConfig, RemovalPlan, SectionSettings, SettingsUpdate, ShareFilter, ShareRecord,
    ShareScope, ShareSpec,
};
