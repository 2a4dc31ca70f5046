//! Subcommand implementations.

use std::path::Path;

use anyhow::{Context, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::info;

use backupstore_media_crypto::decrypt_media;
use backupstore_remote_storage::{
    Cdn3RemoteStorageManager, ListEntry, MediaEncryptionParameters, RemoteStorageManager,
    UploadDescriptor, Url,
};

use crate::config::Config;

pub fn manager(config: &Config) -> anyhow::Result<Cdn3RemoteStorageManager> {
    Ok(Cdn3RemoteStorageManager::from_config(&config.storage_manager)?)
}

/// Parses a `name=value` header argument. Only the first `=` splits.
pub fn parse_header(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got {arg:?}")),
    }
}

pub fn parameters(key: &str, nonce: &str) -> anyhow::Result<MediaEncryptionParameters> {
    let key = BASE64.decode(key).context("key is not valid base64")?;
    let nonce = BASE64.decode(nonce).context("nonce is not valid base64")?;
    Ok(MediaEncryptionParameters::from_slices(&key, &nonce)?)
}

/// Uses the given key material, or generates fresh material and prints it
/// so the object can be decrypted later.
pub fn copy_parameters(
    key: Option<&str>,
    nonce: Option<&str>,
) -> anyhow::Result<MediaEncryptionParameters> {
    match (key, nonce) {
        (Some(key), Some(nonce)) => parameters(key, nonce),
        (None, None) => {
            let params = MediaEncryptionParameters::generate();
            println!("key={}", BASE64.encode(params.key()));
            println!("nonce={}", BASE64.encode(params.nonce()));
            Ok(params)
        }
        _ => bail!("--key and --nonce must be given together"),
    }
}

pub async fn list_page<M: RemoteStorageManager>(
    manager: &M,
    prefix: &str,
    cursor: Option<String>,
    limit: u64,
) -> anyhow::Result<()> {
    let page = manager.list(prefix, cursor, limit).await?;
    print_entries(&page.entries);
    if let Some(cursor) = page.cursor {
        eprintln!("next cursor: {cursor}");
    }
    Ok(())
}

/// Follows cursors until the storage manager reports the last page.
///
/// Fails if a page hands back the cursor it was requested with.
pub async fn list_all<M: RemoteStorageManager>(
    manager: &M,
    prefix: &str,
    limit: u64,
) -> anyhow::Result<Vec<ListEntry>> {
    let mut entries = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = manager.list(prefix, cursor.clone(), limit).await?;
        entries.extend(page.entries);
        match page.cursor {
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                bail!("storage manager repeated cursor {next:?} for prefix {prefix:?}");
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(entries)
}

pub fn print_entries(entries: &[ListEntry]) {
    for entry in entries {
        println!("{}\t{}", entry.length, entry.key);
    }
}

pub async fn usage<M: RemoteStorageManager>(manager: &M, prefix: &str) -> anyhow::Result<()> {
    let usage = manager.calculate_bytes_used(prefix).await?;
    println!("{}", serde_json::to_string_pretty(&usage)?);
    Ok(())
}

pub async fn copy<M: RemoteStorageManager>(
    manager: &M,
    source: Url,
    length: u64,
    params: MediaEncryptionParameters,
    descriptor: UploadDescriptor,
) -> anyhow::Result<()> {
    let completion = manager.copy(source.clone(), length, params, descriptor)?;
    match completion.await {
        Ok(()) => {
            info!(source = %source, "copy complete");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            info!(source = %source, "source object no longer exists, nothing copied");
            Ok(())
        }
        Err(e) => Err(e).context(format!("copying {source}")),
    }
}

pub fn decrypt(input: &Path, output: &Path, key: &str, nonce: &str) -> anyhow::Result<()> {
    let params = parameters(key, nonce)?;
    let ciphertext =
        std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let plaintext = decrypt_media(&params, &ciphertext)?;
    std::fs::write(output, &plaintext)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        bytes = plaintext.len(),
        "decrypted object"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use backupstore_remote_storage::{Completion, ListResult, StorageError, UsageInfo};

    /// Serves canned list pages and records the cursors it was asked for.
    struct PagedManager {
        pages: Mutex<Vec<ListResult>>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl PagedManager {
        fn new(mut pages: Vec<ListResult>) -> Self {
            pages.reverse();
            Self {
                pages: Mutex::new(pages),
                cursors: Mutex::new(Vec::new()),
            }
        }
    }

    impl RemoteStorageManager for PagedManager {
        fn cdn_number(&self) -> u32 {
            3
        }

        fn copy(
            &self,
            _source_uri: Url,
            _expected_source_length: u64,
            _encryption_parameters: MediaEncryptionParameters,
            _upload_descriptor: UploadDescriptor,
        ) -> Result<Completion<()>, StorageError> {
            Ok(Completion::spawn(async {
                Err(StorageError::SourceObjectNotFound)
            }))
        }

        fn list(&self, _prefix: &str, cursor: Option<String>, _limit: u64) -> Completion<ListResult> {
            self.cursors.lock().unwrap().push(cursor);
            let page = self.pages.lock().unwrap().pop();
            Completion::spawn(async move { page.ok_or(StorageError::ListIo(500)) })
        }

        fn calculate_bytes_used(&self, _prefix: &str) -> Completion<UsageInfo> {
            Completion::spawn(async { Ok(UsageInfo::default()) })
        }
    }

    fn entry(key: &str, length: u64) -> ListEntry {
        ListEntry {
            key: key.into(),
            length,
        }
    }

    #[tokio::test]
    async fn list_all_follows_cursors() {
        let manager = PagedManager::new(vec![
            ListResult {
                entries: vec![entry("a", 1), entry("b", 2)],
                cursor: Some("c1".into()),
            },
            ListResult {
                entries: vec![entry("c", 3)],
                cursor: None,
            },
        ]);

        let entries = list_all(&manager, "p/", 2).await.unwrap();
        assert_eq!(entries, vec![entry("a", 1), entry("b", 2), entry("c", 3)]);
        assert_eq!(
            *manager.cursors.lock().unwrap(),
            vec![None, Some("c1".to_string())]
        );
    }

    #[tokio::test]
    async fn list_all_surfaces_page_errors() {
        let manager = PagedManager::new(vec![ListResult {
            entries: vec![entry("a", 1)],
            cursor: Some("c1".into()),
        }]);
        assert!(list_all(&manager, "p/", 1).await.is_err());
    }

    #[tokio::test]
    async fn list_all_stops_on_repeated_cursor() {
        let manager = PagedManager::new(vec![
            ListResult {
                entries: vec![entry("a", 1)],
                cursor: Some("c1".into()),
            },
            ListResult {
                entries: vec![entry("b", 2)],
                cursor: Some("c1".into()),
            },
            ListResult {
                entries: vec![entry("c", 3)],
                cursor: None,
            },
        ]);

        let err = list_all(&manager, "p/", 1).await.unwrap_err();
        assert!(err.to_string().contains("c1"), "{err}");
        assert_eq!(manager.cursors.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn copy_treats_missing_source_as_success() {
        let manager = PagedManager::new(Vec::new());
        let descriptor = UploadDescriptor {
            cdn: 3,
            signed_upload_location: "https://cdn3.example/u".into(),
            headers: Default::default(),
        };
        let source = Url::parse("https://cdn2.example/a").unwrap();
        copy(
            &manager,
            source,
            10,
            MediaEncryptionParameters::generate(),
            descriptor,
        )
        .await
        .unwrap();
    }

    #[test]
    fn parse_header_splits_on_first_equals() {
        assert_eq!(
            parse_header("Authorization=Basic a=="),
            Ok(("Authorization".to_string(), "Basic a==".to_string()))
        );
        assert!(parse_header("no-separator").is_err());
        assert!(parse_header("=value").is_err());
    }

    #[test]
    fn parameters_decode_base64() {
        let key = BASE64.encode([1u8; 32]);
        let nonce = BASE64.encode([2u8; 8]);
        let params = parameters(&key, &nonce).unwrap();
        assert_eq!(params.key(), &[1u8; 32]);
        assert_eq!(params.nonce(), &[2u8; 8]);
    }

    #[test]
    fn parameters_reject_wrong_lengths() {
        let key = BASE64.encode([1u8; 16]);
        let nonce = BASE64.encode([2u8; 8]);
        assert!(parameters(&key, &nonce).is_err());
        assert!(parameters("not base64!", &nonce).is_err());
    }

    #[test]
    fn copy_parameters_require_both_or_neither() {
        let nonce = BASE64.encode([2u8; 8]);
        assert!(copy_parameters(None, Some(&nonce)).is_err());
        assert!(copy_parameters(None, None).is_ok());
    }

    #[test]
    fn decrypt_writes_plaintext() {
        use backupstore_media_crypto::EncryptedBody;

        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("object.bin");
        let output = tmp.path().join("object.out");

        let key = [5u8; 32];
        let nonce = [6u8; 8];
        let plaintext = b"attachment bytes".to_vec();

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let ciphertext = rt.block_on(async {
            use futures_util::TryStreamExt;
            let source = futures_util::stream::iter([Ok::<_, std::io::Error>(
                bytes::Bytes::from(plaintext.clone()),
            )]);
            let body = EncryptedBody::new(
                MediaEncryptionParameters::new(key, nonce),
                source,
                plaintext.len() as u64,
            );
            let parts: Vec<bytes::Bytes> = body.try_collect().await.unwrap();
            parts.concat()
        });
        std::fs::write(&input, &ciphertext).unwrap();

        decrypt(&input, &output, &BASE64.encode(key), &BASE64.encode(nonce)).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), plaintext);
    }
}
