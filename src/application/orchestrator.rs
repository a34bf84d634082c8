//! Account and share lifecycles that combine config records with external tools.
//!
//! Every mutating method here is meant to run on the task queue's worker.
//! Multi-step operations undo completed steps in reverse order when a later
//! step fails, and always report the failure that started the rollback.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::context::AppContext;
use crate::application::records::{prepare_spec, HomeLayout, RecordMutator};
use crate::domain::validation::{parse_share_id, require_account_name};
use crate::domain::{
    Account, AppError, DeprovisionReport, DirectoryConfig, NewShare, OrphanedDirectory,
    RawConfig, Result, SectionSettings, SettingsUpdate, ShareFilter, ShareRecord, ShareScope,
    ShareSpec,
};
use crate::infrastructure::{
    directory_size, list_home_directories, ConfigStore, CredentialMode, ExistenceCache,
    ExternalTools,
};

/// A completed provisioning step and how to take it back.
#[derive(Debug)]
enum Undo {
    Directory(PathBuf),
    Account(String),
}

fn require_secret(secret: &str) -> Result<()> {
    if secret.is_empty() {
        return Err(AppError::validation("password must not be empty"));
    }
    if secret.contains(['\n', '\r']) {
        return Err(AppError::validation("password must be a single line"));
    }
    Ok(())
}

/// Error for a replacement that could not be written, given the outcome of restoring the backup.
fn after_failed_write(write: AppError, restore: Result<()>) -> AppError {
    match restore {
        Ok(()) => write,
        Err(revert) => {
            warn!(error = %revert, "Failed to restore config after write error");
            AppError::RevertFailed {
                diagnostic: write.to_string(),
                revert_error: revert.to_string(),
            }
        }
    }
}

/// Coordinates config records, account tooling and the home root.
pub struct ResourceOrchestrator {
    records: RecordMutator,
    store: Arc<ConfigStore>,
    tools: Arc<dyn ExternalTools>,
    cache: Arc<dyn ExistenceCache>,
    layout: HomeLayout,
    directories: DirectoryConfig,
}

impl ResourceOrchestrator {
    #[must_use]
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            records: RecordMutator::new(
                Arc::clone(&ctx.store),
                ctx.layout.clone(),
                Arc::clone(&ctx.clock),
            ),
            store: Arc::clone(&ctx.store),
            tools: Arc::clone(&ctx.tools),
            cache: Arc::clone(&ctx.cache),
            layout: ctx.layout.clone(),
            directories: ctx.config.directories.clone(),
        }
    }

    // Accounts

    /// Creates home directory, account and credential, all or nothing.
    ///
    /// A home directory that existed before the call is never removed.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for a bad name or password,
    /// `AppError::Conflict` if the account exists, or the failing step's error.
    pub fn provision_user(&self, username: &str, secret: &str) -> Result<Account> {
        require_account_name(username, "username")?;
        require_secret(secret)?;
        if self.tools.account_exists(username)? {
            return Err(AppError::conflict(format!("user '{username}' already exists")));
        }

        let home = self.layout.home_dir(username);
        let mut completed = Vec::new();
        let result = self.provision_steps(username, secret, &home, &mut completed);
        self.cache.invalidate(username);

        match result {
            Ok(()) => {
                info!(username, home = %home.display(), "User provisioned");
                Ok(Account {
                    username: username.to_string(),
                    home_dir: home,
                })
            }
            Err(e) => {
                warn!(username, error = %e, "Provisioning failed, rolling back");
                self.roll_back(completed);
                Err(e)
            }
        }
    }

    fn provision_steps(
        &self,
        username: &str,
        secret: &str,
        home: &Path,
        completed: &mut Vec<Undo>,
    ) -> Result<()> {
        // mkdir may succeed before ownership fails, so the undo goes in first
        if !home.exists() {
            completed.push(Undo::Directory(home.to_path_buf()));
        }
        self.tools.create_directory(home, &self.directories)?;

        self.tools.create_account(username, home)?;
        completed.push(Undo::Account(username.to_string()));

        self.tools
            .set_credential(username, secret, CredentialMode::New)?;
        self.tools.enable_account(username)?;
        Ok(())
    }

    fn roll_back(&self, completed: Vec<Undo>) {
        for step in completed.into_iter().rev() {
            let outcome = match &step {
                Undo::Account(username) => self.tools.remove_account(username),
                Undo::Directory(path) => self.tools.remove_directory(path),
            };
            if let Err(e) = outcome {
                warn!(?step, error = %e, "Rollback step failed");
            }
        }
    }

    /// Removes a user's shares, account and optionally home directory.
    ///
    /// Share cleanup runs first; if it fails the account is left untouched.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for a bad name, an IO error from share
    /// cleanup, or the account or directory removal failure.
    pub fn deprovision_user(&self, username: &str, remove_home: bool) -> Result<DeprovisionReport> {
        require_account_name(username, "username")?;

        let plan = self.records.delete_all_records_for_user(username)?;
        if !plan.is_empty() {
            self.tools.reload_service();
        }

        let removed = self.tools.remove_account(username);
        self.cache.invalidate(username);
        removed?;

        let home = remove_home.then(|| self.tools.remove_directory(&self.layout.home_dir(username)));
        self.tools.reload_service();
        let home_removed = match home {
            Some(removed) => {
                removed?;
                true
            }
            None => false,
        };

        let report = DeprovisionReport {
            updated_shares: plan.updated_ids(),
            deleted_shares: plan.delete,
            home_removed,
        };
        info!(
            username,
            deleted = report.deleted_shares.len(),
            updated = report.updated_shares.len(),
            home_removed,
            "User deprovisioned"
        );
        Ok(report)
    }

    /// Overwrites the credential of an existing account.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the account does not exist.
    pub fn change_credential(&self, username: &str, secret: &str) -> Result<()> {
        require_account_name(username, "username")?;
        require_secret(secret)?;
        if !self.tools.account_exists(username)? {
            return Err(AppError::not_found(format!("user '{username}'")));
        }

        self.tools
            .set_credential(username, secret, CredentialMode::Change)?;
        info!(username, "Password changed");
        Ok(())
    }

    /// Changes a user's own credential after checking the current one.
    ///
    /// # Errors
    /// Returns `AppError::Unauthorized` if `current` does not verify.
    pub fn change_own_credential(&self, username: &str, current: &str, secret: &str) -> Result<()> {
        require_account_name(username, "username")?;
        require_secret(secret)?;
        if !self.tools.verify_credential(username, current)? {
            return Err(AppError::Unauthorized {
                message: "current password is incorrect".into(),
            });
        }

        self.tools
            .set_credential(username, secret, CredentialMode::Change)?;
        info!(username, "Own password changed");
        Ok(())
    }

    /// # Errors
    /// Returns the port's error if the account list cannot be read.
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        self.tools.list_accounts()
    }

    /// Whether `username` has an account, served from the cache when fresh.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for a bad name, or the port's error.
    pub fn account_exists(&self, username: &str) -> Result<bool> {
        require_account_name(username, "username")?;
        if let Some(exists) = self.cache.get(username) {
            return Ok(exists);
        }
        let exists = self.tools.account_exists(username)?;
        self.cache.put(username, exists);
        Ok(exists)
    }

    // Shares

    /// Shares matching `filter`, in file order.
    ///
    /// # Errors
    /// Returns error if the config file cannot be read.
    pub fn list_shares(&self, filter: &ShareFilter) -> Result<Vec<ShareRecord>> {
        let mut records = self.records.list_share_records()?;
        records.retain(|record| filter.matches(record));
        Ok(records)
    }

    /// Creates a share in the owner's home, creating the subdirectory if needed.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for bad input, `AppError::NotFound` if
    /// the owner has no home directory, `AppError::Conflict` for a taken id.
    pub fn create_share(&self, share: &NewShare) -> Result<ShareRecord> {
        let owner = require_account_name(&share.owner, "owner")?;
        let spec = prepare_spec(&share.spec)?;
        let id = self.records.available_share_id(owner, &share.name)?;
        self.prepare_directory(owner, &spec)?;

        self.records.insert_share(&id, owner, &spec)?;
        self.tools.reload_service();

        Ok(ShareRecord {
            id,
            owner: owner.to_string(),
            path: self
                .layout
                .share_path(owner, &spec.sub_path)
                .to_string_lossy()
                .into_owned(),
            shared_with: spec.shared_with,
            read_only: spec.read_only,
            comment: spec.comment,
            sub_path: spec.sub_path,
        })
    }

    /// Regenerates share `id` from `spec`.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if absent, `AppError::Forbidden` if the
    /// share is outside `scope`, or a validation error.
    pub fn update_share(&self, id: &str, spec: &ShareSpec, scope: &ShareScope) -> Result<ShareRecord> {
        let (owner, _) = parse_share_id(id)
            .ok_or_else(|| AppError::validation(format!("invalid share ID format: '{id}'")))?;
        let spec = prepare_spec(spec)?;

        // no directory is touched for a share the caller may not change
        let existing = self.records.find_share(id)?;
        if let ShareScope::Owner(user) = scope {
            if *user != existing.owner {
                return Err(AppError::forbidden(format!("share '{id}' belongs to another user")));
            }
        }
        self.prepare_directory(owner, &spec)?;

        let record = self.records.update_share(id, &spec, scope)?;
        self.tools.reload_service();
        Ok(record)
    }

    /// Removes share `id`; the directory stays.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if absent or `AppError::Forbidden` if the
    /// share is outside `scope`.
    pub fn delete_share(&self, id: &str, scope: &ShareScope) -> Result<()> {
        self.records.delete_share(id, scope)?;
        self.tools.reload_service();
        Ok(())
    }

    fn prepare_directory(&self, owner: &str, spec: &ShareSpec) -> Result<()> {
        let home = self.layout.home_dir(owner);
        if !home.is_dir() {
            return Err(AppError::not_found(format!(
                "home directory of '{owner}' ({})",
                home.display()
            )));
        }
        if !spec.sub_path.is_empty() {
            self.tools
                .create_directory(&home.join(&spec.sub_path), &self.directories)?;
        }
        Ok(())
    }

    // Settings and raw config

    /// # Errors
    /// Returns error if the config file cannot be read.
    pub fn settings(&self) -> Result<SectionSettings> {
        self.records.settings()
    }

    /// Applies both partials with one write, then reloads if anything changed.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for multi-line values or an IO error.
    pub fn update_settings(&self, update: &SettingsUpdate) -> Result<usize> {
        let changed = self.records.update_settings(update)?;
        if changed > 0 {
            self.tools.reload_service();
        }
        Ok(changed)
    }

    /// Current file text and location.
    ///
    /// # Errors
    /// Returns error if the config file cannot be read.
    pub fn raw(&self) -> Result<RawConfig> {
        let content = self.store.shared().read_text()?;
        Ok(RawConfig {
            path: self.store.path().to_path_buf(),
            content,
        })
    }

    /// Replaces the whole file, keeping it only if it validates on disk.
    ///
    /// # Errors
    /// Returns `AppError::ConfigRejected` when validation failed and the old
    /// content was restored, `AppError::RevertFailed` when restoring failed too.
    pub fn replace_raw(&self, content: &str) -> Result<()> {
        let config = self.store.exclusive();
        let backup = config.read_text()?;

        if let Err(e) = config.write_text(content) {
            return Err(after_failed_write(e, config.write_text(&backup)));
        }

        let diagnostic = match self.tools.validate_config(config.path()) {
            Ok(report) if report.passed => {
                drop(config);
                info!(bytes = content.len(), "Raw config replaced");
                self.tools.reload_service();
                return Ok(());
            }
            Ok(report) => report.diagnostic,
            Err(e) => e.to_string(),
        };

        match config.write_text(&backup) {
            Ok(()) => {
                warn!(%diagnostic, "Rejected raw config, previous content restored");
                Err(AppError::ConfigRejected { diagnostic })
            }
            Err(revert) => Err(AppError::RevertFailed {
                diagnostic,
                revert_error: revert.to_string(),
            }),
        }
    }

    // Orphans and status

    /// Home directories with no account, with their sizes.
    ///
    /// # Errors
    /// Returns error if accounts or the home root cannot be read.
    pub fn list_orphans(&self) -> Result<Vec<OrphanedDirectory>> {
        let accounts: HashSet<String> = self
            .tools
            .list_accounts()?
            .into_iter()
            .map(|account| account.username)
            .collect();

        let orphans: Vec<OrphanedDirectory> = list_home_directories(self.layout.root())?
            .into_iter()
            .filter(|entry| !accounts.contains(&entry.name))
            .map(|entry| OrphanedDirectory {
                size_bytes: directory_size(&entry.path),
                name: entry.name,
                path: entry.path,
            })
            .collect();

        debug!(count = orphans.len(), "Orphaned directories listed");
        Ok(orphans)
    }

    /// Deletes an orphaned home directory.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if the account still exists and
    /// `AppError::NotFound` if there is no such directory.
    pub fn delete_orphan(&self, name: &str) -> Result<()> {
        require_account_name(name, "directory name")?;

        if self
            .tools
            .list_accounts()?
            .iter()
            .any(|account| account.username == name)
        {
            return Err(AppError::conflict(format!(
                "cannot delete directory: user '{name}' still exists"
            )));
        }

        let path = self.layout.home_dir(name);
        if !path.is_dir() {
            return Err(AppError::not_found(format!("directory '{name}'")));
        }

        self.tools.remove_directory(&path)?;
        info!(name, path = %path.display(), "Orphaned directory deleted");
        Ok(())
    }

    /// # Errors
    /// Returns the port's error if the status tool fails.
    pub fn service_status(&self) -> Result<String> {
        self.tools.service_status()
    }
}
