//! Unified error types for the match lake exporter.
//!
//! Errors fall into two groups:
//! - fatal: abort the run (configuration, cursor)
//! - per-task: caught at the worker boundary, counted, sampled

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of the pipeline an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Match,
    Timeline,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::Timeline => "timeline",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the exporter.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    /// Opening or advancing the match id cursor failed.
    #[error("cursor error: {0}")]
    Cursor(String),

    /// Reading a single document from the source store failed.
    #[error("document store error: {0}")]
    Source(String),

    #[error("object store error for {key}: {message}")]
    ObjectStore { key: String, message: String },

    /// Upstream API call failed after classification and retries.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("malformed document {match_id}: {message}")]
    Malformed { match_id: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn cursor(msg: impl Into<String>) -> Self {
        Self::Cursor(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn object_store(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ObjectStore {
            key: key.into(),
            message: msg.into(),
        }
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn malformed(match_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Malformed {
            match_id: match_id.into(),
            message: msg.into(),
        }
    }

    /// Whether this error must abort the whole run.
    ///
    /// Everything else is recoverable at the task boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Cursor(_))
    }
}
