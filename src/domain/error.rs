//! Domain-level error types for samba-manager.
//!
//! All errors are typed with `thiserror` and carry a human-readable message.
//! The HTTP layer maps them through [`AppError::http_status`].

use thiserror::Error;

/// Broad error category, used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Unauthorized,
    ExternalTool,
    Rejected,
    Io,
    Unavailable,
}

/// Application-level errors with HTTP status mapping for the API layer.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed username, share name, share id or subpath.
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Target share, account or directory does not exist.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Name collision or an operation blocked by existing state.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The record exists but belongs to someone else.
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// A presented credential did not verify.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed: {message}{}", format_diagnostic(.diagnostic))]
    Tool {
        tool: String,
        message: String,
        diagnostic: String,
    },

    /// Replacement config failed validation; the previous content was restored.
    #[error("Configuration validation failed, reverted to original: {diagnostic}")]
    ConfigRejected { diagnostic: String },

    /// Replacement config was rejected or not written, and restoring the previous content failed too.
    #[error("Configuration replacement failed and revert failed: {diagnostic} (revert error: {revert_error})")]
    RevertFailed {
        diagnostic: String,
        revert_error: String,
    },

    /// Application configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// JSON serialization failed.
    #[error("JSON error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The serialization queue no longer accepts work.
    #[error("Task queue is shut down")]
    QueueClosed,

    /// A queued task ended without producing a result.
    #[error("Task aborted before completion")]
    TaskAborted,
}

fn format_diagnostic(diagnostic: &str) -> String {
    let trimmed = diagnostic.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(", output: {trimmed}")
    }
}

impl AppError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create an external tool failure.
    pub fn tool(
        tool: impl Into<String>,
        message: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Create a JSON error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Tool { .. } => ErrorKind::ExternalTool,
            Self::ConfigRejected { .. } => ErrorKind::Rejected,
            Self::RevertFailed { .. } | Self::Config { .. } | Self::Io { .. } | Self::JsonParse { .. } => {
                ErrorKind::Io
            }
            Self::QueueClosed | Self::TaskAborted => ErrorKind::Unavailable,
        }
    }

    /// HTTP status code the API layer should answer with.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Rejected => 422,
            ErrorKind::ExternalTool | ErrorKind::Io => 500,
            ErrorKind::Unavailable => 503,
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
