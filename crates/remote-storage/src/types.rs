//! Domain and wire types for cdn3 storage operations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::StorageError;

/// Destination for one copy: a pre-signed resumable-upload location plus
/// the headers the issuer requires on the upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDescriptor {
    /// CDN the descriptor was issued for.
    pub cdn: u32,
    pub signed_upload_location: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// A stored object, with the listed prefix already removed from its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub key: String,
    pub length: u64,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResult {
    pub entries: Vec<ListEntry>,
    /// Cursor for the next page; `None` when this is the last page.
    pub cursor: Option<String>,
}

impl ListResult {
    /// Returns `true` if another page can be requested.
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}

/// Aggregate usage under a prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageInfo {
    pub bytes_used: u64,
    pub num_objects: u64,
}

/// Serialized list response from the storage manager.
#[derive(Debug, Deserialize)]
pub(crate) struct Cdn3ListResponse {
    pub objects: Vec<Cdn3ListEntry>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Cdn3ListEntry {
    pub key: String,
    pub size: u64,
}

impl Cdn3ListResponse {
    /// Strips `prefix` from every key.
    ///
    /// Any key outside `prefix` means the storage manager answered for a
    /// different partition, so the whole page is rejected.
    pub(crate) fn into_list_result(self, prefix: &str) -> Result<ListResult, StorageError> {
        let mut entries = Vec::with_capacity(self.objects.len());
        for entry in self.objects {
            let Some(relative) = entry.key.strip_prefix(prefix) else {
                error!(
                    key = %entry.key,
                    prefix,
                    "unexpected listing result from cdn3: entry does not contain requested prefix"
                );
                return Err(StorageError::ProtocolConsistency {
                    key: entry.key,
                    prefix: prefix.to_string(),
                });
            };
            entries.push(ListEntry {
                key: relative.to_string(),
                length: entry.size,
            });
        }

        Ok(ListResult {
            entries,
            cursor: self.cursor,
        })
    }
}

/// Serialized usage response from the storage manager.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsageResponse {
    pub num_objects: u64,
    pub bytes_used: u64,
}

impl From<UsageResponse> for UsageInfo {
    fn from(resp: UsageResponse) -> Self {
        Self {
            bytes_used: resp.bytes_used,
            num_objects: resp.num_objects,
        }
    }
}
