//! Streaming encryption for backup media objects.
//!
//! Plaintext is cut into fixed-size segments and sealed with AES-256-GCM
//! using the STREAM construction (31-bit little-endian segment counter plus
//! a last-segment flag folded into the nonce). Every segment carries its own
//! authentication tag, so the ciphertext length is a pure function of the
//! plaintext length and can be announced before a single byte is read.
//!
//! # Framing
//!
//! - Full segments of [`SEGMENT_LEN`] plaintext bytes, each followed by a
//!   [`TAG_LEN`]-byte tag.
//! - Exactly one final segment holding the remaining `len % SEGMENT_LEN`
//!   bytes (possibly zero), also tagged.

mod decrypt;
mod encrypt;
mod params;

pub use decrypt::decrypt_media;
pub use encrypt::EncryptedBody;
pub use params::MediaEncryptionParameters;

/// Plaintext bytes per sealed segment: 64 KiB.
///
/// Bounds the memory the encrypter holds for one in-flight object.
pub const SEGMENT_LEN: usize = 64 * 1024;

/// AES-GCM authentication tag appended to every segment.
pub const TAG_LEN: usize = 16;

/// AES-256 key length.
pub const KEY_LEN: usize = 32;

/// STREAM nonce prefix length (12-byte GCM nonce minus the 4-byte counter).
pub const NONCE_LEN: usize = 8;

/// Returns the exact ciphertext length produced for `plaintext_len` bytes.
pub fn output_size(plaintext_len: u64) -> u64 {
    let segments = plaintext_len / SEGMENT_LEN as u64 + 1;
    plaintext_len + segments * TAG_LEN as u64
}

/// Errors produced while encrypting or decrypting media.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("invalid key length: expected 32, got {0}")]
    InvalidKeyLength(usize),

    #[error("invalid nonce length: expected 8, got {0}")]
    InvalidNonceLength(usize),

    #[error("source read failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("source produced {actual} bytes, more than the declared {expected}")]
    SourceOverrun { expected: u64, actual: u64 },

    #[error("source ended after {actual} of {expected} declared bytes")]
    SourceTruncated { expected: u64, actual: u64 },

    #[error("emitted {actual} ciphertext bytes, expected {expected}")]
    CiphertextLength { expected: u64, actual: u64 },

    #[error("malformed ciphertext of {0} bytes")]
    MalformedCiphertext(usize),
}
