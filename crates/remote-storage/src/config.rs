//! cdn3 storage manager configuration and transport construction.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Connection settings for cdn3 and its storage manager.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cdn3Config {
    /// Storage manager base URI. A trailing `/` is ignored.
    pub base_uri: String,

    pub client_id: String,

    pub client_secret: String,

    /// TCP connect timeout for both transports, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// PEM certificates trusted for the CDN transport.
    ///
    /// When non-empty, only these roots are trusted for CDN reads and
    /// uploads. The storage manager always uses the built-in roots.
    #[serde(default)]
    pub cdn_ca_certificates: Vec<String>,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl fmt::Debug for Cdn3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cdn3Config")
            .field("base_uri", &self.base_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("cdn_ca_certificates", &self.cdn_ca_certificates.len())
            .finish()
    }
}

impl Cdn3Config {
    /// Base URI with one trailing `/` removed, for URI construction.
    pub fn base_url(&self) -> &str {
        self.base_uri.strip_suffix('/').unwrap_or(&self.base_uri)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Checks that the settings can produce a working client.
    pub fn validate(&self) -> Result<(), StorageError> {
        reqwest::Url::parse(self.base_url())
            .map_err(|e| StorageError::Config(format!("base_uri {:?}: {e}", self.base_uri)))?;
        if self.client_id.is_empty() {
            return Err(StorageError::Config("client_id is empty".into()));
        }
        if self.client_secret.is_empty() {
            return Err(StorageError::Config("client_secret is empty".into()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(StorageError::Config("connect_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Builds the transport used to read sources and write uploads.
    pub fn build_cdn_client(&self) -> Result<reqwest::Client, StorageError> {
        let mut builder = reqwest::Client::builder().connect_timeout(self.connect_timeout());

        if !self.cdn_ca_certificates.is_empty() {
            builder = builder.tls_built_in_root_certs(false);
            for pem in &self.cdn_ca_certificates {
                let cert = reqwest::Certificate::from_pem(pem.as_bytes())
                    .map_err(|e| StorageError::Config(format!("invalid CDN CA certificate: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
        }

        Ok(builder.build()?)
    }

    /// Builds the transport used for storage manager calls.
    pub fn build_storage_manager_client(&self) -> Result<reqwest::Client, StorageError> {
        Ok(reqwest::Client::builder()
            .connect_timeout(self.connect_timeout())
            .build()?)
    }
}
