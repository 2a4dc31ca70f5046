//! Remote storage client for encrypted backup media on cdn3.
//!
//! # Operations
//!
//! 1. **copy** - stream an object from a source CDN, encrypt it segment by
//!    segment, and forward it to a pre-signed tus upload on cdn3.
//! 2. **list** - page through stored objects under a prefix.
//! 3. **calculate_bytes_used** - aggregate object count and size under a
//!    prefix.
//!
//! All operations run on background tasks and hand back a [`Completion`].
//! Durations and storage manager response codes are recorded through the
//! `metrics` facade (see [`instrumentation`]).

pub mod cdn3;
pub mod completion;
pub mod config;
pub mod error;
pub mod instrumentation;
pub mod manager;
pub mod types;

#[cfg(test)]
mod test_support;

pub use cdn3::Cdn3RemoteStorageManager;
pub use completion::Completion;
pub use config::Cdn3Config;
pub use error::StorageError;
pub use manager::RemoteStorageManager;
pub use types::{ListEntry, ListResult, UploadDescriptor, UsageInfo};

pub use backupstore_media_crypto::MediaEncryptionParameters;
pub use reqwest::Url;
