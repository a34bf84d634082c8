//! Samba and account tooling.
//!
//! [`ExternalTools`] is the one seam through which the manager touches the
//! outside world. [`SambaTools`] drives the real binaries.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::domain::{Account, AppError, DirectoryConfig, Result};

use super::process::{CommandOutput, CommandRunner, SystemRunner};

const CHOWN: &str = "chown";
const CHMOD: &str = "chmod";
const USERADD: &str = "useradd";
const USERDEL: &str = "userdel";
const SMBPASSWD: &str = "smbpasswd";
const PDBEDIT: &str = "pdbedit";
const SMBCLIENT: &str = "smbclient";
const TESTPARM: &str = "testparm";
const SMBCONTROL: &str = "smbcontrol";
const SMBSTATUS: &str = "smbstatus";

/// Whether a credential is set on a fresh account or replaces an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    New,
    Change,
}

/// Outcome of a config syntax check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub passed: bool,
    pub diagnostic: String,
}

/// Side effects on directories, accounts and the running service.
///
/// All methods except [`ExternalTools::reload_service`] report a non-zero exit
/// as `AppError::Tool`.
pub trait ExternalTools: Send + Sync {
    /// Creates `path` (and parents) and applies ownership and mode recursively.
    fn create_directory(&self, path: &Path, ownership: &DirectoryConfig) -> Result<()>;

    /// Removes `path` recursively. A missing directory is not an error.
    fn remove_directory(&self, path: &Path) -> Result<()>;

    /// Creates a login-less system account bound to `home`.
    fn create_account(&self, username: &str, home: &Path) -> Result<()>;

    /// Sets the share credential, streaming the secret twice for confirmation.
    fn set_credential(&self, username: &str, secret: &str, mode: CredentialMode) -> Result<()>;

    fn enable_account(&self, username: &str) -> Result<()>;

    /// Removes the account from the password database and the system.
    fn remove_account(&self, username: &str) -> Result<()>;

    /// Whether `secret` authenticates `username` against the running service.
    fn verify_credential(&self, username: &str, secret: &str) -> Result<bool>;

    /// Checks the syntax of the config file at `path`.
    fn validate_config(&self, path: &Path) -> Result<ValidationReport>;

    /// Asks the running service to re-read its config. Failures are only logged.
    fn reload_service(&self);

    /// Accounts in the password database, in tool order.
    fn list_accounts(&self) -> Result<Vec<Account>>;

    fn account_exists(&self, username: &str) -> Result<bool>;

    /// Raw session status text of the running service.
    fn service_status(&self) -> Result<String>;
}

/// Production tools backed by a [`CommandRunner`].
pub struct SambaTools<R = SystemRunner> {
    runner: R,
    home_root: PathBuf,
}

impl SambaTools<SystemRunner> {
    /// Create tools that run real binaries.
    #[must_use]
    pub fn system(home_root: impl Into<PathBuf>) -> Self {
        Self::new(SystemRunner, home_root)
    }
}

impl<R: CommandRunner> SambaTools<R> {
    #[must_use]
    pub fn new(runner: R, home_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            home_root: home_root.into(),
        }
    }

    fn run(&self, tool: &str, args: &[&str]) -> Result<CommandOutput> {
        tracing::debug!(tool, ?args, "Running external tool");
        self.runner.run(tool, args, None)
    }

    fn run_checked(&self, tool: &str, args: &[&str]) -> Result<CommandOutput> {
        self.run(tool, args)?.check(tool)
    }
}

impl<R: CommandRunner> ExternalTools for SambaTools<R> {
    fn create_directory(&self, path: &Path, ownership: &DirectoryConfig) -> Result<()> {
        if ownership.mode.is_empty() || !ownership.mode.chars().all(|c| ('0'..='7').contains(&c)) {
            return Err(AppError::Config {
                message: format!("directory mode '{}' is not octal", ownership.mode),
            });
        }

        fs::create_dir_all(path).map_err(|e| {
            AppError::io(format!("Failed to create directory {}", path.display()), e)
        })?;

        let target = path.to_string_lossy();
        let owner = format!("{}:{}", ownership.owner, ownership.group);
        self.run_checked(CHOWN, &["-R", &owner, &target])?;
        self.run_checked(CHMOD, &["-R", &ownership.mode, &target])?;
        Ok(())
    }

    fn remove_directory(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::io(
                format!("Failed to delete directory {}", path.display()),
                e,
            )),
        }
    }

    fn create_account(&self, username: &str, home: &Path) -> Result<()> {
        let home = home.to_string_lossy();
        self.run_checked(
            USERADD,
            &[
                "--extrausers",
                "--no-create-home",
                "--shell",
                "/usr/sbin/nologin",
                "--home-dir",
                &home,
                "--badname",
                username,
            ],
        )?;
        Ok(())
    }

    fn set_credential(&self, username: &str, secret: &str, mode: CredentialMode) -> Result<()> {
        let args = match mode {
            CredentialMode::New => vec!["-a", "-s", username],
            CredentialMode::Change => vec!["-s", username],
        };
        tracing::debug!(tool = SMBPASSWD, ?args, "Running external tool");
        let confirmation = format!("{secret}\n{secret}\n");
        self.runner
            .run(SMBPASSWD, &args, Some(&confirmation))?
            .check(SMBPASSWD)?;
        Ok(())
    }

    fn enable_account(&self, username: &str) -> Result<()> {
        self.run_checked(SMBPASSWD, &["-e", username])?;
        Ok(())
    }

    fn remove_account(&self, username: &str) -> Result<()> {
        // Both removals are attempted; the first failure is reported.
        let samba = self
            .run(SMBPASSWD, &["-x", username])
            .and_then(|out| out.check(SMBPASSWD));
        let system = self
            .run(USERDEL, &["--extrausers", username])
            .and_then(|out| out.check(USERDEL));
        samba?;
        system?;
        Ok(())
    }

    fn verify_credential(&self, username: &str, secret: &str) -> Result<bool> {
        let login = format!("{username}%{secret}");
        tracing::debug!(tool = SMBCLIENT, username, "Verifying credential");
        let output = self
            .runner
            .run(SMBCLIENT, &["-L", "localhost", "-U", &login, "-N"], None)?;
        Ok(output.success())
    }

    fn validate_config(&self, path: &Path) -> Result<ValidationReport> {
        let target = path.to_string_lossy();
        let output = self.run(TESTPARM, &["-s", &target])?;
        Ok(ValidationReport {
            passed: output.success(),
            diagnostic: output.diagnostic(),
        })
    }

    fn reload_service(&self) {
        match self.run(SMBCONTROL, &["smbd", "reload-config"]) {
            Ok(output) if output.success() => tracing::debug!("Service reloaded"),
            Ok(output) => tracing::warn!(
                status = %output.status_text(),
                output = %output.diagnostic(),
                "Service reload failed"
            ),
            Err(e) => tracing::warn!(error = %e, "Service reload failed"),
        }
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let output = self.run_checked(PDBEDIT, &["-L"])?;
        Ok(parse_account_list(&output.stdout, &self.home_root))
    }

    fn account_exists(&self, username: &str) -> Result<bool> {
        Ok(self.run(PDBEDIT, &["-L", "-u", username])?.success())
    }

    fn service_status(&self) -> Result<String> {
        Ok(self.run_checked(SMBSTATUS, &[])?.stdout)
    }
}

/// Parses `pdbedit -L` output (`name:uid:full name` per line).
fn parse_account_list(stdout: &str, home_root: &Path) -> Vec<Account> {
    stdout
        .lines()
        .filter_map(|line| line.split(':').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| Account {
            username: name.to_string(),
            home_dir: home_root.join(name),
        })
        .collect()
}
