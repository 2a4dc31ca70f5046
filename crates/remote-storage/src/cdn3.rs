//! cdn3 remote storage client.
//!
//! Copies go straight from the source CDN to a resumable (tus) upload on
//! cdn3, encrypted segment by segment while in flight. Listing and usage
//! queries go to the cdn3 storage manager, authenticated with Cloudflare
//! Access service-token headers.

use std::collections::HashMap;
use std::sync::Arc;

use backupstore_media_crypto::{
    CryptoError, EncryptedBody, MediaEncryptionParameters, output_size,
};
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue};
use reqwest::{StatusCode, Url};
use tracing::{debug, info, warn};

use crate::completion::Completion;
use crate::config::Cdn3Config;
use crate::error::StorageError;
use crate::instrumentation::{OP_COPY, OP_LIST, OP_USAGE, OperationTimer, record_status};
use crate::manager::RemoteStorageManager;
use crate::types::{Cdn3ListResponse, ListResult, UploadDescriptor, UsageInfo, UsageResponse};

/// CDN number served by this client.
pub const CDN_NUMBER: u32 = 3;

/// Path segment of the storage manager listing endpoint.
pub const CDN_PATH: &str = "backups";

pub const CLIENT_ID_HEADER: &str = "CF-Access-Client-Id";
pub const CLIENT_SECRET_HEADER: &str = "CF-Access-Client-Secret";

const UPLOAD_LENGTH_HEADER: HeaderName = HeaderName::from_static("upload-length");
const TUS_RESUMABLE_HEADER: HeaderName = HeaderName::from_static("tus-resumable");
const TUS_VERSION: &str = "1.0.0";

/// Client for cdn3 backup media storage.
///
/// Cheap to clone; clones share the underlying transports. Both transports
/// are safe for concurrent use, so one instance can serve any number of
/// simultaneous operations.
#[derive(Clone)]
pub struct Cdn3RemoteStorageManager {
    inner: Arc<Inner>,
}

struct Inner {
    cdn_http: reqwest::Client,
    storage_manager_http: reqwest::Client,
    base_url: String,
    client_id: HeaderValue,
    client_secret: HeaderValue,
}

impl Cdn3RemoteStorageManager {
    /// Creates a client over caller-supplied transports.
    ///
    /// `cdn_http` reads copy sources and writes uploads;
    /// `storage_manager_http` serves list and usage queries.
    pub fn new(
        cdn_http: reqwest::Client,
        storage_manager_http: reqwest::Client,
        config: &Cdn3Config,
    ) -> Result<Self, StorageError> {
        config.validate()?;

        let client_id = HeaderValue::from_str(&config.client_id)
            .map_err(|_| StorageError::InvalidHeader(CLIENT_ID_HEADER.into()))?;
        let mut client_secret = HeaderValue::from_str(&config.client_secret)
            .map_err(|_| StorageError::InvalidHeader(CLIENT_SECRET_HEADER.into()))?;
        client_secret.set_sensitive(true);

        Ok(Self {
            inner: Arc::new(Inner {
                cdn_http,
                storage_manager_http,
                base_url: config.base_url().to_string(),
                client_id,
                client_secret,
            }),
        })
    }

    /// Creates a client with transports built from `config`.
    pub fn from_config(config: &Cdn3Config) -> Result<Self, StorageError> {
        Self::new(
            config.build_cdn_client()?,
            config.build_storage_manager_client()?,
            config,
        )
    }

    // -----------------------------------------------------------------------
    // copy
    // -----------------------------------------------------------------------

    async fn transfer(
        &self,
        source_uri: Url,
        expected_source_length: u64,
        encryption_parameters: MediaEncryptionParameters,
        upload_location: Url,
        mut upload_headers: HeaderMap,
    ) -> Result<(), StorageError> {
        let response = self.inner.cdn_http.get(source_uri.clone()).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(source = %source_uri, "copy source not found");
            return Err(StorageError::SourceObjectNotFound);
        }
        if status != StatusCode::OK {
            warn!(source = %source_uri, status = status.as_u16(), "error reading from source");
            return Err(StorageError::transfer(
                Some(status.as_u16()),
                format!("error reading from source: {}", status.as_u16()),
            ));
        }

        let actual_source_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| StorageError::transfer(None, "upstream missing Content-Length"))?;

        if actual_source_length != expected_source_length {
            return Err(StorageError::InvalidLength {
                expected: expected_source_length,
                actual: actual_source_length,
            });
        }

        let encrypted_length = output_size(actual_source_length);
        let body = EncryptedBody::new(
            encryption_parameters,
            response.bytes_stream(),
            actual_source_length,
        );

        upload_headers.insert(UPLOAD_LENGTH_HEADER, HeaderValue::from(encrypted_length));
        upload_headers.insert(TUS_RESUMABLE_HEADER, HeaderValue::from_static(TUS_VERSION));
        upload_headers.insert(CONTENT_LENGTH, HeaderValue::from(encrypted_length));

        let response = self
            .inner
            .cdn_http
            .post(upload_location)
            .headers(upload_headers)
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(upload_error)?;

        let status = response.status();
        if status != StatusCode::CREATED && status != StatusCode::OK {
            warn!(status = status.as_u16(), "upload rejected by cdn3");
            return Err(StorageError::transfer(
                Some(status.as_u16()),
                format!("failed to copy object: {}", status.as_u16()),
            ));
        }

        info!(
            source = %source_uri,
            plaintext_bytes = actual_source_length,
            encrypted_bytes = encrypted_length,
            "copied object to cdn3"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // storage manager
    // -----------------------------------------------------------------------

    fn storage_manager_get(&self, url: &str, query: &[(&str, String)]) -> reqwest::RequestBuilder {
        self.inner
            .storage_manager_http
            .get(url)
            .query(query)
            .header(CLIENT_ID_HEADER, self.inner.client_id.clone())
            .header(CLIENT_SECRET_HEADER, self.inner.client_secret.clone())
    }

    async fn fetch_list(
        &self,
        prefix: &str,
        cursor: Option<String>,
        limit: u64,
    ) -> Result<ListResult, StorageError> {
        let mut query = vec![("prefix", prefix.to_string()), ("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let url = format!("{}/{}/", self.inner.base_url, CDN_PATH);
        let response = self.storage_manager_get(&url, &query).send().await?;
        let status = response.status();
        record_status(OP_LIST, status);

        if !status.is_success() {
            warn!(prefix, status = status.as_u16(), "failed to list objects");
            return Err(StorageError::ListIo(status.as_u16()));
        }

        let body = response.bytes().await?;
        let envelope: Cdn3ListResponse = serde_json::from_slice(&body)?;
        let result = envelope.into_list_result(prefix)?;
        debug!(
            prefix,
            entries = result.entries.len(),
            more = result.has_more(),
            "listed objects"
        );
        Ok(result)
    }

    async fn fetch_usage(&self, prefix: &str) -> Result<UsageInfo, StorageError> {
        let url = format!("{}/usage", self.inner.base_url);
        let response = self
            .storage_manager_get(&url, &[("prefix", prefix.to_string())])
            .send()
            .await?;
        let status = response.status();
        record_status(OP_USAGE, status);

        if !status.is_success() {
            warn!(prefix, status = status.as_u16(), "failed to retrieve usage");
            return Err(StorageError::UsageIo(status.as_u16()));
        }

        let body = response.bytes().await?;
        let usage: UsageResponse = serde_json::from_slice(&body)?;
        Ok(usage.into())
    }
}

impl RemoteStorageManager for Cdn3RemoteStorageManager {
    fn cdn_number(&self) -> u32 {
        CDN_NUMBER
    }

    fn copy(
        &self,
        source_uri: Url,
        expected_source_length: u64,
        encryption_parameters: MediaEncryptionParameters,
        upload_descriptor: UploadDescriptor,
    ) -> Result<Completion<()>, StorageError> {
        if upload_descriptor.cdn != self.cdn_number() {
            return Err(StorageError::WrongCdn {
                expected: self.cdn_number(),
                actual: upload_descriptor.cdn,
            });
        }

        let timer = OperationTimer::start(OP_COPY);
        let this = self.clone();
        Ok(Completion::spawn(async move {
            let _timer = timer;
            let upload_location =
                Url::parse(&upload_descriptor.signed_upload_location).map_err(|e| {
                    StorageError::InvalidUri(format!(
                        "{}: {e}",
                        upload_descriptor.signed_upload_location
                    ))
                })?;
            let upload_headers = descriptor_headers(&upload_descriptor.headers)?;

            this.transfer(
                source_uri,
                expected_source_length,
                encryption_parameters,
                upload_location,
                upload_headers,
            )
            .await
        }))
    }

    fn list(&self, prefix: &str, cursor: Option<String>, limit: u64) -> Completion<ListResult> {
        let timer = OperationTimer::start(OP_LIST);
        let this = self.clone();
        let prefix = prefix.to_string();
        Completion::spawn(async move {
            let _timer = timer;
            this.fetch_list(&prefix, cursor, limit).await
        })
    }

    fn calculate_bytes_used(&self, prefix: &str) -> Completion<UsageInfo> {
        let timer = OperationTimer::start(OP_USAGE);
        let this = self.clone();
        let prefix = prefix.to_string();
        Completion::spawn(async move {
            let _timer = timer;
            this.fetch_usage(&prefix).await
        })
    }
}

/// Converts descriptor headers into a header map.
fn descriptor_headers(headers: &HashMap<String, String>) -> Result<HeaderMap, StorageError> {
    let mut map = HeaderMap::with_capacity(headers.len() + 3);
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| StorageError::InvalidHeader(name.clone()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| StorageError::InvalidHeader(name.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Classifies a failed upload request.
///
/// When the encrypted body aborted the request, the cause is buried in the
/// transport error's source chain.
fn upload_error(err: reqwest::Error) -> StorageError {
    let mut cause = std::error::Error::source(&err);
    while let Some(e) = cause {
        if let Some(crypto) = e.downcast_ref::<CryptoError>() {
            return match crypto {
                CryptoError::Source(inner) => StorageError::SourceRead(inner.to_string()),
                other => StorageError::Integrity(other.to_string()),
            };
        }
        cause = e.source();
    }
    StorageError::Http(err)
}
