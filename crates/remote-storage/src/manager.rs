//! Remote storage abstraction.

use backupstore_media_crypto::MediaEncryptionParameters;
use reqwest::Url;

use crate::completion::Completion;
use crate::error::StorageError;
use crate::types::{ListResult, UploadDescriptor, UsageInfo};

/// Storage backend holding encrypted backup media.
///
/// Every operation runs on a background task and returns immediately with
/// a [`Completion`]. Implementations must be safe to share across tasks.
pub trait RemoteStorageManager: Send + Sync {
    /// CDN number this manager writes to.
    fn cdn_number(&self) -> u32;

    /// Copies `source_uri` into storage, encrypting it in transit.
    ///
    /// `expected_source_length` is the plaintext length the caller believes
    /// the source has; a mismatch fails the copy before anything is
    /// uploaded. A descriptor issued for another CDN is rejected
    /// synchronously; an unparseable location or bad header fails the
    /// returned [`Completion`].
    fn copy(
        &self,
        source_uri: Url,
        expected_source_length: u64,
        encryption_parameters: MediaEncryptionParameters,
        upload_descriptor: UploadDescriptor,
    ) -> Result<Completion<()>, StorageError>;

    /// Lists one page of objects under `prefix`.
    fn list(&self, prefix: &str, cursor: Option<String>, limit: u64) -> Completion<ListResult>;

    /// Computes total bytes and object count under `prefix`.
    fn calculate_bytes_used(&self, prefix: &str) -> Completion<UsageInfo>;
}
