//! Error types for sync operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while serializing, restoring or transporting profiles
#[derive(Debug, Error)]
pub enum SyncError {
    /// Tool configuration is missing a field or names an unknown backend
    #[error("Configuration error: {0}")]
    Config(String),

    /// A mutating operation was invoked on a backend that is not initialized
    #[error("The repository is not initialized")]
    NotInitialized,

    /// Network, subprocess or authentication failure of a transport
    #[error("{backend} transport failed: {message}")]
    Transport { backend: String, message: String },

    /// A single extension operation failed
    #[error("Extension '{id}': {message}")]
    Extension { id: String, message: String },

    /// The `extends` chain loops back onto itself or is too deep
    #[error("Profile chain is cyclic or too deep: {}", chain.join(" -> "))]
    CyclicProfile { chain: Vec<String> },

    /// Profile does not exist in the repository
    #[error("Profile '{0}' not found")]
    ProfileNotFound(String),

    /// Profile already exists in the repository
    #[error("Profile '{0}' already exists")]
    ProfileExists(String),

    /// Profile cannot be deleted or altered in its current state
    #[error("Profile '{name}' is in use: {reason}")]
    ProfileInUse { name: String, reason: String },

    /// Name is unusable as a profile or file name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// File I/O error
    #[error("I/O error for {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(String),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Template directive could not be evaluated
    #[error("Template error: {0}")]
    Template(String),

    /// The host editor rejected a request
    #[error("Editor error: {0}")]
    Editor(String),
}

impl SyncError {
    /// Get the error code for CLI/API responses
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::Extension { .. } => "EXTENSION_ERROR",
            Self::CyclicProfile { .. } => "DATA_ERROR",
            Self::ProfileNotFound(_) => "PROFILE_NOT_FOUND",
            Self::ProfileExists(_) => "PROFILE_EXISTS",
            Self::ProfileInUse { .. } => "PROFILE_IN_USE",
            Self::InvalidName(_) => "VALIDATION_ERROR",
            Self::Io { .. } => "IO_ERROR",
            Self::Json(_) | Self::Yaml(_) => "PARSE_ERROR",
            Self::Template(_) => "TEMPLATE_ERROR",
            Self::Editor(_) => "EDITOR_ERROR",
        }
    }

    /// Notification category used to decide whether the editor is told
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Extension { .. } | Self::Editor(_) => ErrorKind::Extension,
            _ => ErrorKind::Data,
        }
    }

    /// Build a transport error for the named backend
    pub fn transport(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Failure categories from the error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Config,
    NotInitialized,
    Transport,
    Extension,
    Data,
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yml::Error> for SyncError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Editor(format!("state store: {err}"))
    }
}
