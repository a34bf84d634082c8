//! Application layer - use cases and orchestration.
//!
//! This layer contains the smb.conf record model, the account and share
//! lifecycles, and the queue that serializes every mutation.

pub mod context;
pub mod formatter;
pub mod orchestrator;
pub mod queue;
pub mod records;
pub mod sections;
pub mod service;

#[cfg(test)]
pub mod testing;

pub use context::AppContext;
pub use formatter::{
    format_accounts_table, format_orphans_table, format_report, format_settings,
    format_shares_table, to_json, OutputFormat,
};
pub use orchestrator::ResourceOrchestrator;
pub use queue::TaskQueue;
pub use records::{HomeLayout, RecordMutator};
pub use sections::{ConfigDocument, Section};
pub use service::ManagerService;
