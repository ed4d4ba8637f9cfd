//! Error types for the profile, knowledge and advisor layers.

use std::path::PathBuf;

use thiserror::Error;

/// Chatify error type.
#[derive(Debug, Error)]
pub enum ChatifyError {
    /// A raw provider record lacks a required field.
    #[error("malformed {kind} record: missing `{field}`")]
    MalformedRecord {
        /// Record family (`artist`, `track`, `profile`, `playlist`).
        kind: &'static str,
        /// Name of the missing field.
        field: &'static str,
    },
    /// The mandatory profile fetch failed, so no snapshot can be built.
    #[error("profile collection failed: {0}")]
    Collection(String),
    /// The per-user collection is absent; the caller should rebuild it.
    #[error("knowledge collection `{collection}` does not exist")]
    NeedsReinitialization {
        /// Name of the missing collection.
        collection: String,
    },
    /// The credential expired and could not be refreshed.
    #[error("credential expired, please re-authenticate")]
    AuthExpired,
    /// The language model call failed.
    #[error("generation failed: {0}")]
    Generation(String),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The provider answered with a non-success status.
    #[error("provider returned {status} for {endpoint}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Endpoint path, without query string.
        endpoint: String,
    },
    /// A snapshot export exists but cannot be parsed.
    #[error("snapshot at {path} is corrupt: {source}")]
    SnapshotCorrupt {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },
    /// Uncategorized failure caught at a top-level operation boundary.
    #[error("{operation} failed: {message}")]
    Operation {
        /// Caller-facing operation name.
        operation: &'static str,
        /// Underlying error message.
        message: String,
    },
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] rig::embeddings::EmbeddingError),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// HTTP error from the provider client.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatifyError {
    /// Whether this error asks the caller to rebuild the user's collection.
    #[must_use]
    pub const fn needs_reinitialization(&self) -> bool {
        matches!(self, Self::NeedsReinitialization { .. })
    }

    /// Wrap an error at a top-level operation boundary.
    ///
    /// Categorized conditions the caller reacts to (`AuthExpired`,
    /// `Collection`, `MalformedRecord`) pass through untouched.
    #[must_use]
    pub fn at_boundary(self, operation: &'static str) -> Self {
        match self {
            Self::AuthExpired
            | Self::Collection(_)
            | Self::MalformedRecord { .. }
            | Self::Operation { .. } => self,
            other => Self::Operation {
                operation,
                message: other.to_string(),
            },
        }
    }
}

/// Convenience result alias.
pub type ChatifyResult<T> = Result<T, ChatifyError>;
