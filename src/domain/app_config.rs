//! Application configuration.
//!
//! Where smb.conf and the managed home root live, plus queue, cache and
//! directory ownership settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Directory holding one home directory per account.
    #[serde(default = "default_home_root")]
    pub home_root: PathBuf,

    /// The Samba configuration file being managed.
    #[serde(default = "default_smb_conf")]
    pub smb_conf: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            home_root: default_home_root(),
            smb_conf: default_smb_conf(),
        }
    }
}

fn default_home_root() -> PathBuf {
    PathBuf::from("/home/samba")
}

fn default_smb_conf() -> PathBuf {
    PathBuf::from("/etc/samba/smb.conf")
}

/// Serialization queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of pending units before submitters wait.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

const fn default_capacity() -> usize {
    100
}

/// Account existence cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds a cached existence answer stays valid.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

const fn default_ttl_secs() -> u64 {
    60
}

/// Ownership and permissions applied to created directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_root")]
    pub owner: String,

    #[serde(default = "default_root")]
    pub group: String,

    /// Octal permission bits as text, e.g. `"770"`.
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            owner: default_root(),
            group: default_root(),
            mode: default_mode(),
        }
    }
}

fn default_root() -> String {
    "root".to_string()
}

fn default_mode() -> String {
    "770".to_string()
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub directories: DirectoryConfig,
}

impl AppConfig {
    /// Default location of the configuration file.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("samba-manager")
            .join("config.toml")
    }

    /// Cache TTL as a duration.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// Queue capacity, never zero.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.paths.home_root, PathBuf::from("/home/samba"));
        assert_eq!(config.paths.smb_conf, PathBuf::from("/etc/samba/smb.conf"));
        assert_eq!(config.queue.capacity, 100);
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.directories.mode, "770");
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut config = AppConfig::default();
        config.queue.capacity = 0;
        assert_eq!(config.queue_capacity(), 1);
    }

    #[test]
    fn test_default_config_path_name() {
        let path = AppConfig::default_config_path();
        assert!(path.ends_with("samba-manager/config.toml"));
    }
}
