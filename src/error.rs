// src/error.rs

//! Unified error handling for the sync service.

use std::fmt;

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Table storage error
    #[error("Storage error: {0}")]
    Store(String),

    /// Upstream fetch error
    #[error("Fetch error for {context}: {message}")]
    Fetch { context: String, message: String },

    /// Topic publishing error
    #[error("Publish error for {topic}: {message}")]
    Publish { topic: String, message: String },

    /// The run was cancelled before all partitions were processed
    #[error("run cancelled")]
    Cancelled,

    /// One or more partitions failed during a run stage
    #[error("{} partition(s) failed: {}", failures.len(), format_failures(failures))]
    RunFailed { failures: Vec<PartitionFailure> },
}

/// A failure scoped to a single (kind, partition) unit of work.
///
/// Carries enough detail to re-run the affected partition safely.
#[derive(Debug, Clone)]
pub struct PartitionFailure {
    pub run_id: String,
    pub kind: String,
    pub region_id: String,
    pub agency_id: String,
    pub message: String,
}

impl fmt::Display for PartitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.agency_id.is_empty() {
            write!(
                f,
                "{} {} (run {}): {}",
                self.kind, self.region_id, self.run_id, self.message
            )
        } else {
            write!(
                f,
                "{} {}/{} (run {}): {}",
                self.kind, self.region_id, self.agency_id, self.run_id, self.message
            )
        }
    }
}

fn format_failures(failures: &[PartitionFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create a fetch error with context.
    pub fn fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a publish error for a topic.
    pub fn publish(topic: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.to_string(),
        }
    }
}
