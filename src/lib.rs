//! Samba Manager - serialized management of smb.conf shares and Samba accounts.
//!
//! The library is layered the same way as the binary:
//! - [`domain`]: models, errors, validation and application config
//! - [`application`]: the smb.conf record model, lifecycles and the task queue
//! - [`infrastructure`]: files, external tools, cache and clock
//!
//! Request handlers use [`application::ManagerService`], built from an
//! [`application::AppContext`].

pub mod application;
pub mod domain;
pub mod infrastructure;
