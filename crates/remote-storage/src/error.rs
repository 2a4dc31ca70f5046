//! Storage client error types.

use backupstore_media_crypto::CryptoError;

/// Errors produced by remote storage operations.
///
/// Nothing here is retried by the client itself. Use [`is_not_found`] and
/// [`is_retryable`] to decide what an outer retry layer should do.
///
/// [`is_not_found`]: StorageError::is_not_found
/// [`is_retryable`]: StorageError::is_retryable
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The copy source does not exist. Callers may treat this as benign.
    #[error("source object not found")]
    SourceObjectNotFound,

    #[error("provided source length {expected} was {actual}")]
    InvalidLength { expected: u64, actual: u64 },

    /// Non-success status from the source or the upload, or a required
    /// header missing from the source response (`status` is `None`).
    #[error("{message}")]
    TransferIo { status: Option<u16>, message: String },

    /// The source connection failed part-way through the body.
    #[error("error reading from source: {0}")]
    SourceRead(String),

    #[error("prefix listing returned unexpected result: {key} does not start with {prefix}")]
    ProtocolConsistency { key: String, prefix: String },

    #[error("failed to list objects: {0}")]
    ListIo(u16),

    #[error("failed to retrieve usage: {0}")]
    UsageIo(u16),

    #[error("upload descriptor targets cdn {actual}, this client only copies to cdn {expected}")]
    WrongCdn { expected: u32, actual: u32 },

    /// The encrypted upload stream was aborted before completion.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid URI: {0}")]
    InvalidUri(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StorageError {
    pub(crate) fn transfer(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::TransferIo {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TransferIo { status, .. } => *status,
            Self::ListIo(status) | Self::UsageIo(status) => Some(*status),
            Self::SourceObjectNotFound => Some(404),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` for the benign "source already gone" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SourceObjectNotFound)
    }

    /// Returns `true` if retrying the same call may succeed.
    ///
    /// Transport timeouts and connection failures, source reads cut off
    /// mid-body, and upstream 5xx/429 responses are retryable. Length mismatches, protocol violations and
    /// integrity failures are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::SourceRead(_) => true,
            Self::TransferIo {
                status: Some(status),
                ..
            }
            | Self::ListIo(status)
            | Self::UsageIo(status) => is_retryable_status(*status),
            _ => false,
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}
