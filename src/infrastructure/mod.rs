//! Infrastructure layer - external adapters (filesystem, processes, clock).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod cache;
pub mod clock;
pub mod config;
pub mod config_store;
pub mod home_dirs;
pub mod process;
pub mod samba_tools;

pub use cache::{ExistenceCache, TtlCache};
pub use clock::{Clock, SystemClock};
pub use config::{ensure_config_exists, load_config, load_config_from_file, save_config};
pub use config_store::{ConfigStore, ExclusiveConfig, SharedConfig};
pub use home_dirs::{directory_size, list_home_directories, HomeEntry};
pub use process::{CommandOutput, CommandRunner, SystemRunner};
pub use samba_tools::{CredentialMode, ExternalTools, SambaTools, ValidationReport};
