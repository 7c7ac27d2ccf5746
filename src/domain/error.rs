//! Domain-level error types for wechat-chat-export.
//!
//! All errors are typed with `thiserror` and provide meaningful context
//! without exposing internal details to end users.

use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage an export failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    /// Resolving the chat identifier from a display name.
    Lookup,
    /// Fetching the message batch from the store.
    Retrieve,
    /// Writing rows to the output sink.
    Emit,
}

impl std::fmt::Display for ExportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lookup => write!(f, "lookup"),
            Self::Retrieve => write!(f, "retrieve"),
            Self::Emit => write!(f, "emit"),
        }
    }
}

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// No contact carries the requested nickname.
    #[error("No chat found with nickname '{name}'")]
    TargetNotFound { name: String },

    /// The WeChat data directory does not exist.
    #[error("WeChat data directory not found: {path}")]
    DataRootNotFound { path: PathBuf },

    /// Database file not found at expected location.
    #[error("WeChat database not found at: {path}")]
    DatabaseNotFound { path: PathBuf },

    /// Failed to open or query the database.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Writing to the output sink failed.
    #[error("Output error: {message}")]
    Sink {
        message: String,
        #[source]
        source: Option<csv::Error>,
    },

    /// JSON serialization failed.
    #[error("JSON error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// A pipeline stage failed; wraps the underlying error.
    #[error("Export {stage} stage failed: {source}")]
    Stage {
        stage: ExportStage,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Create a database error from rusqlite error.
    pub fn database(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a sink error from a csv writer error.
    pub fn sink(err: csv::Error) -> Self {
        Self::Sink {
            message: err.to_string(),
            source: Some(err),
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

    /// Tag this error with the pipeline stage it came from.
    #[must_use]
    pub fn at(self, stage: ExportStage) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Stage the error was raised in, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<ExportStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, skipping stage wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
