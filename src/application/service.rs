//! Async facade used by request handlers and the CLI.
//!
//! Mutations are wrapped as units of work and run on the [`TaskQueue`] worker;
//! callers wait for each result. Read-only calls skip the queue and run on the
//! blocking pool under the shared side of the config guard.

use std::sync::Arc;

use crate::application::context::AppContext;
use crate::application::orchestrator::ResourceOrchestrator;
use crate::application::queue::TaskQueue;
use crate::domain::{
    Account, AppError, DeprovisionReport, NewShare, OrphanedDirectory, RawConfig, Result,
    SectionSettings, SettingsUpdate, ShareFilter, ShareRecord, ShareScope, ShareSpec,
};

/// Entry point for every operation the manager exposes.
pub struct ManagerService {
    orchestrator: Arc<ResourceOrchestrator>,
    queue: TaskQueue,
}

impl ManagerService {
    /// Builds the orchestrator from `ctx` and starts the queue worker.
    ///
    /// # Errors
    /// Returns error if the worker thread cannot be started.
    pub fn start(ctx: &AppContext) -> Result<Self> {
        let queue = TaskQueue::start(ctx.config.queue_capacity())?;
        Ok(Self {
            orchestrator: Arc::new(ResourceOrchestrator::new(ctx)),
            queue,
        })
    }

    async fn mutate<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ResourceOrchestrator) -> Result<T> + Send + 'static,
    {
        let orchestrator = Arc::clone(&self.orchestrator);
        self.queue.submit_and_wait(move || op(&orchestrator)).await
    }

    async fn read<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ResourceOrchestrator) -> Result<T> + Send + 'static,
    {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::task::spawn_blocking(move || op(&orchestrator))
            .await
            .map_err(|_| AppError::TaskAborted)?
    }

    /// Stops the queue after the already queued mutations finish.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }

    // Accounts

    /// # Errors
    /// See [`ResourceOrchestrator::list_accounts`].
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.read(ResourceOrchestrator::list_accounts).await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::account_exists`].
    pub async fn account_exists(&self, username: &str) -> Result<bool> {
        let username = username.to_string();
        self.read(move |o| o.account_exists(&username)).await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::provision_user`].
    pub async fn provision_user(&self, username: &str, secret: &str) -> Result<Account> {
        let (username, secret) = (username.to_string(), secret.to_string());
        self.mutate(move |o| o.provision_user(&username, &secret))
            .await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::deprovision_user`].
    pub async fn deprovision_user(&self, username: &str, remove_home: bool) -> Result<DeprovisionReport> {
        let username = username.to_string();
        self.mutate(move |o| o.deprovision_user(&username, remove_home))
            .await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::change_credential`].
    pub async fn change_credential(&self, username: &str, secret: &str) -> Result<()> {
        let (username, secret) = (username.to_string(), secret.to_string());
        self.mutate(move |o| o.change_credential(&username, &secret))
            .await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::change_own_credential`].
    pub async fn change_own_credential(&self, username: &str, current: &str, secret: &str) -> Result<()> {
        let (username, current, secret) =
            (username.to_string(), current.to_string(), secret.to_string());
        self.mutate(move |o| o.change_own_credential(&username, &current, &secret))
            .await
    }

    // Shares

    /// # Errors
    /// See [`ResourceOrchestrator::list_shares`].
    pub async fn list_shares(&self, filter: ShareFilter) -> Result<Vec<ShareRecord>> {
        self.read(move |o| o.list_shares(&filter)).await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::create_share`].
    pub async fn create_share(&self, share: NewShare) -> Result<ShareRecord> {
        self.mutate(move |o| o.create_share(&share)).await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::update_share`].
    pub async fn update_share(&self, id: &str, spec: ShareSpec, scope: ShareScope) -> Result<ShareRecord> {
        let id = id.to_string();
        self.mutate(move |o| o.update_share(&id, &spec, &scope))
            .await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::delete_share`].
    pub async fn delete_share(&self, id: &str, scope: ShareScope) -> Result<()> {
        let id = id.to_string();
        self.mutate(move |o| o.delete_share(&id, &scope)).await
    }

    // Settings

    /// # Errors
    /// See [`ResourceOrchestrator::settings`].
    pub async fn settings(&self) -> Result<SectionSettings> {
        self.read(ResourceOrchestrator::settings).await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::update_settings`].
    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<usize> {
        self.mutate(move |o| o.update_settings(&update)).await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::raw`].
    pub async fn raw(&self) -> Result<RawConfig> {
        self.read(ResourceOrchestrator::raw).await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::replace_raw`].
    pub async fn replace_raw(&self, content: String) -> Result<()> {
        self.mutate(move |o| o.replace_raw(&content)).await
    }

    // Orphans and status

    /// # Errors
    /// See [`ResourceOrchestrator::list_orphans`].
    pub async fn list_orphans(&self) -> Result<Vec<OrphanedDirectory>> {
        self.read(ResourceOrchestrator::list_orphans).await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::delete_orphan`].
    pub async fn delete_orphan(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.mutate(move |o| o.delete_orphan(&name)).await
    }

    /// # Errors
    /// See [`ResourceOrchestrator::service_status`].
    pub async fn service_status(&self) -> Result<String> {
        self.read(ResourceOrchestrator::service_status).await
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    use chrono::Local;
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::application::records::share_records;
    use crate::application::sections::ConfigDocument;
    use crate::application::testing::{FakeTools, FixedClock};
    use crate::domain::AppConfig;
    use crate::infrastructure::TtlCache;

    fn setup(content: &str) -> (TempDir, AppContext) {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.paths.home_root = dir.path().join("homes");
        config.paths.smb_conf = dir.path().join("smb.conf");
        config.queue.capacity = 4;
        fs::create_dir_all(config.paths.home_root.join("alice")).unwrap();
        fs::write(&config.paths.smb_conf, content).unwrap();

        let ctx = AppContext::new(
            config,
            Arc::new(FakeTools::with_accounts(&["alice", "bob"])),
            Arc::new(FixedClock::new(Local::now())),
            Arc::new(TtlCache::new(Duration::from_secs(60))),
        );
        (dir, ctx)
    }

    fn new_share(name: String) -> NewShare {
        NewShare {
            owner: "alice".into(),
            name,
            spec: ShareSpec {
                shared_with: vec!["bob".into()],
                ..ShareSpec::default()
            },
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_produce_well_formed_sections() {
        let (dir, ctx) = setup("");
        let service = Arc::new(ManagerService::start(&ctx).unwrap());

        let creates: Vec<_> = (0..24)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.create_share(new_share(format!("Share{i}"))).await })
            })
            .collect();
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.list_shares(ShareFilter::All).await })
            })
            .collect();

        for create in creates {
            create.await.unwrap().unwrap();
        }
        for reader in readers {
            reader.await.unwrap().unwrap();
        }
        service.shutdown().await;

        let text = fs::read_to_string(dir.path().join("smb.conf")).unwrap();
        let doc = ConfigDocument::parse(&text);
        assert_eq!(doc.sections().len(), 24);
        assert_eq!(doc.to_string(), text);

        let home: PathBuf = dir.path().join("homes/alice");
        let records = share_records(&doc, &ctx.layout);
        assert_eq!(records.len(), 24);
        for record in &records {
            assert_eq!(record.owner, "alice");
            assert_eq!(record.path, home.to_string_lossy());
            assert_eq!(record.shared_with, ["bob"]);
            assert!(!record.read_only);
            let section = doc.find_exact(&record.id).unwrap();
            assert_eq!(section.entries().count(), 7, "{}", record.id);
        }
    }

    #[tokio::test]
    async fn test_mutations_fail_after_shutdown_but_reads_work() {
        let (_dir, ctx) = setup("[global]\n   workgroup = W\n");
        let service = ManagerService::start(&ctx).unwrap();
        service.shutdown().await;

        let err = service
            .create_share(new_share("Docs".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QueueClosed));
        assert_eq!(err.http_status(), 503);

        let settings = service.settings().await.unwrap();
        assert_eq!(settings.global.workgroup, "W");
        assert_eq!(service.list_accounts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_errors_cross_the_queue_unchanged() {
        let (_dir, ctx) = setup("");
        let service = ManagerService::start(&ctx).unwrap();

        service.create_share(new_share("Docs".into())).await.unwrap();
        let err = service
            .create_share(new_share("Docs".into()))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 409);

        let err = service
            .delete_share("alice-share-Docs", ShareScope::Owner("bob".into()))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 403);

        assert!(service.account_exists("alice").await.unwrap());
        service.shutdown().await;
    }
}
