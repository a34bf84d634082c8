//! In-memory collaborators for unit tests.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::domain::{Account, AppError, DirectoryConfig, Result};
use crate::infrastructure::{Clock, CredentialMode, ExternalTools, ValidationReport};

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Local>);

impl FixedClock {
    pub fn new(at: DateTime<Local>) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Port fake: journals calls, keeps accounts in memory and fails on demand.
///
/// Directories are really created and removed so tests can inspect the home root.
#[derive(Default)]
pub struct FakeTools {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    accounts: Mutex<BTreeSet<String>>,
    secrets: Mutex<Vec<(String, String)>>,
    invalid_marker: Mutex<Option<String>>,
    clobber_on_validate: Mutex<bool>,
}

impl FakeTools {
    pub fn with_accounts(names: &[&str]) -> Self {
        let tools = Self::default();
        tools
            .accounts
            .lock()
            .extend(names.iter().map(ToString::to_string));
        tools
    }

    /// Makes every later call of `method` fail with a tool error.
    pub fn fail_on(&self, method: &'static str) {
        self.failing.lock().insert(method);
    }

    /// Makes `validate_config` fail for files containing `marker`.
    pub fn reject_configs_containing(&self, marker: &str) {
        *self.invalid_marker.lock() = Some(marker.to_string());
    }

    /// Makes `validate_config` leave a directory where the config file was,
    /// so any later write to it fails.
    pub fn clobber_config_on_validate(&self) {
        *self.clobber_on_validate.lock() = true;
    }

    /// Journal entries in call order, e.g. `create_account alice`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Journal entries naming `method`.
    pub fn calls_to(&self, method: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split(' ').next() == Some(method))
            .collect()
    }

    pub fn has_account(&self, name: &str) -> bool {
        self.accounts.lock().contains(name)
    }

    /// Last secret set for `name`.
    pub fn secret_of(&self, name: &str) -> Option<String> {
        self.secrets
            .lock()
            .iter()
            .rev()
            .find(|(user, _)| user == name)
            .map(|(_, secret)| secret.clone())
    }

    fn record(&self, method: &'static str, detail: impl AsRef<str>) -> Result<()> {
        self.calls
            .lock()
            .push(format!("{method} {}", detail.as_ref()).trim_end().to_string());
        if self.failing.lock().contains(method) {
            Err(AppError::tool(method, "exit status 1", format!("{method} scripted failure")))
        } else {
            Ok(())
        }
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

impl ExternalTools for FakeTools {
    fn create_directory(&self, path: &Path, _ownership: &DirectoryConfig) -> Result<()> {
        self.record("create_directory", display(path))?;
        fs::create_dir_all(path).map_err(|e| AppError::io("fake mkdir", e))
    }

    fn remove_directory(&self, path: &Path) -> Result<()> {
        self.record("remove_directory", display(path))?;
        if path.exists() {
            fs::remove_dir_all(path).map_err(|e| AppError::io("fake rmdir", e))?;
        }
        Ok(())
    }

    fn create_account(&self, username: &str, _home: &Path) -> Result<()> {
        self.record("create_account", username)?;
        self.accounts.lock().insert(username.to_string());
        Ok(())
    }

    fn set_credential(&self, username: &str, secret: &str, mode: CredentialMode) -> Result<()> {
        self.record("set_credential", format!("{username} {mode:?}"))?;
        self.secrets
            .lock()
            .push((username.to_string(), secret.to_string()));
        Ok(())
    }

    fn enable_account(&self, username: &str) -> Result<()> {
        self.record("enable_account", username)
    }

    fn remove_account(&self, username: &str) -> Result<()> {
        self.record("remove_account", username)?;
        self.accounts.lock().remove(username);
        Ok(())
    }

    fn verify_credential(&self, username: &str, secret: &str) -> Result<bool> {
        self.record("verify_credential", username)?;
        Ok(self.secret_of(username).as_deref() == Some(secret))
    }

    fn validate_config(&self, path: &Path) -> Result<ValidationReport> {
        self.record("validate_config", display(path))?;
        let content = fs::read_to_string(path).map_err(|e| AppError::io("fake testparm", e))?;
        let rejected = self
            .invalid_marker
            .lock()
            .as_deref()
            .is_some_and(|marker| content.contains(marker));
        if *self.clobber_on_validate.lock() {
            fs::remove_file(path).map_err(|e| AppError::io("fake clobber", e))?;
            fs::create_dir(path).map_err(|e| AppError::io("fake clobber", e))?;
        }
        Ok(ValidationReport {
            passed: !rejected,
            diagnostic: if rejected {
                "Unknown parameter encountered".into()
            } else {
                "Loaded services file OK.".into()
            },
        })
    }

    fn reload_service(&self) {
        // reload never fails from the caller's point of view
        let _ = self.record("reload_service", "");
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        self.record("list_accounts", "")?;
        Ok(self
            .accounts
            .lock()
            .iter()
            .map(|name| Account {
                username: name.clone(),
                home_dir: PathBuf::from("/home/samba").join(name),
            })
            .collect())
    }

    fn account_exists(&self, username: &str) -> Result<bool> {
        self.record("account_exists", username)?;
        Ok(self.has_account(username))
    }

    fn service_status(&self) -> Result<String> {
        self.record("service_status", "")?;
        Ok("Samba version 4.19.5\nNo locked files\n".into())
    }
}
