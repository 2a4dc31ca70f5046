use std::fmt;

use aead::generic_array::GenericArray;
use aead::stream::{DecryptorLE31, EncryptorLE31};
use aes_gcm::{Aes256Gcm, KeyInit};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, KEY_LEN, NONCE_LEN};

/// Key material for encrypting a single media object.
///
/// Not `Clone`: one set of parameters seals exactly one transfer and is
/// consumed by it. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MediaEncryptionParameters {
    key: [u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
}

impl MediaEncryptionParameters {
    /// Creates parameters from raw key and nonce-prefix bytes.
    pub fn new(key: [u8; KEY_LEN], nonce: [u8; NONCE_LEN]) -> Self {
        Self { key, nonce }
    }

    /// Creates parameters from slices, validating their lengths.
    pub fn from_slices(key: &[u8], nonce: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| CryptoError::InvalidNonceLength(nonce.len()))?;
        Ok(Self::new(key, nonce))
    }

    /// Generates fresh random parameters from the OS RNG.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut nonce);
        Self::new(key, nonce)
    }

    /// Raw key bytes.
    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Raw nonce-prefix bytes.
    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub(crate) fn encryptor(&self) -> EncryptorLE31<Aes256Gcm> {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));
        EncryptorLE31::from_aead(cipher, GenericArray::from_slice(&self.nonce))
    }

    pub(crate) fn decryptor(&self) -> DecryptorLE31<Aes256Gcm> {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));
        DecryptorLE31::from_aead(cipher, GenericArray::from_slice(&self.nonce))
    }
}

impl fmt::Debug for MediaEncryptionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaEncryptionParameters")
            .field("key", &"<redacted>")
            .field("nonce", &"<redacted>")
            .finish()
    }
}
