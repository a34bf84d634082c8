//! Configuration file management.
//!
//! Handles loading and saving the TOML application configuration.

use std::fs;
use std::path::Path;

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Samba Manager Configuration
# Auto-generated - edit as needed

[paths]
# Directory holding one home directory per account
home_root = "/home/samba"

# Samba configuration file to manage
smb_conf = "/etc/samba/smb.conf"

[queue]
# Pending mutations allowed before callers wait
capacity = 100

[cache]
# Seconds an account existence lookup is cached
ttl_secs = 60

[directories]
# Ownership and mode of created home and share directories
owner = "root"
group = "root"
mode = "770"
"#;

/// Load configuration from `path`, or defaults if the file does not exist.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config_from_file(path)
    } else {
        tracing::debug!(path = %path.display(), "No configuration file, using defaults");
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Save configuration to `path`.
///
/// # Errors
/// Returns error if file cannot be written.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    let content = toml::to_string_pretty(config).map_err(|e| AppError::Config {
        message: format!("Failed to serialize config: {e}"),
    })?;

    fs::write(path, content)
        .map_err(|e| AppError::io(format!("Failed to write config file: {}", path.display()), e))?;

    tracing::info!(path = %path.display(), "Configuration saved");

    Ok(())
}

/// Create the default configuration file at `path` if it doesn't exist.
///
/// Returns whether a file was written.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %path.display(), "Created default configuration");

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.queue.capacity, 100);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.directories.owner, "root");
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: AppConfig = toml::from_str("[paths]\nhome_root = \"/srv/homes\"\n").unwrap();
        assert_eq!(config.paths.home_root, Path::new("/srv/homes"));
        assert_eq!(config.paths.smb_conf, Path::new("/etc/samba/smb.conf"));
        assert_eq!(config.queue.capacity, 100);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.queue.capacity = 7;
        save_config(&config, &config_path).unwrap();

        let loaded = load_config_from_file(&config_path).unwrap();
        assert_eq!(loaded.queue.capacity, 7);
        assert_eq!(loaded.paths.home_root, config.paths.home_root);
    }

    #[test]
    fn test_ensure_config_exists_only_once() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested/config.toml");

        assert!(ensure_config_exists(&config_path).unwrap());
        assert!(!ensure_config_exists(&config_path).unwrap());
        assert!(load_config(&config_path).is_ok());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[queue]\ncapacity = \"lots\"\n").unwrap();

        assert!(matches!(
            load_config(&config_path),
            Err(AppError::Config { .. })
        ));
    }
}
