use std::pin::Pin;
use std::task::{Context, Poll, ready};

use aead::stream::EncryptorLE31;
use aes_gcm::Aes256Gcm;
use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use pin_project_lite::pin_project;

use crate::{CryptoError, MediaEncryptionParameters, SEGMENT_LEN, output_size};

pin_project! {
    /// Pull-driven encrypting adapter over a plaintext byte stream.
    ///
    /// Each poll reads from the source only until one segment is buffered,
    /// seals it and yields the ciphertext, so memory stays bounded by one
    /// segment plus one source chunk regardless of object size.
    ///
    /// The adapter enforces the declared plaintext length: a source that
    /// overruns or ends early, or a ciphertext total that drifts from
    /// [`output_size`], yields an error and terminates the stream. Feeding
    /// this into an HTTP request body therefore aborts the upload instead
    /// of storing a short or padded object.
    pub struct EncryptedBody<S> {
        #[pin]
        source: S,
        encryptor: Option<EncryptorLE31<Aes256Gcm>>,
        buffer: BytesMut,
        expected_plaintext: u64,
        consumed: u64,
        expected_ciphertext: u64,
        emitted: u64,
        source_done: bool,
    }
}

impl<S> EncryptedBody<S> {
    /// Wraps `source`, which must yield exactly `plaintext_len` bytes.
    ///
    /// Takes the parameters by value; they are dropped (and zeroized) once
    /// the cipher state has been derived.
    pub fn new(params: MediaEncryptionParameters, source: S, plaintext_len: u64) -> Self {
        Self {
            source,
            encryptor: Some(params.encryptor()),
            buffer: BytesMut::with_capacity(SEGMENT_LEN),
            expected_plaintext: plaintext_len,
            consumed: 0,
            expected_ciphertext: output_size(plaintext_len),
            emitted: 0,
            source_done: false,
        }
    }

    /// Total ciphertext bytes this stream will yield on success.
    pub fn encrypted_len(&self) -> u64 {
        self.expected_ciphertext
    }
}

impl<S, E> Stream for EncryptedBody<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = Result<Bytes, CryptoError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            // Finished or failed: nothing more to yield.
            let Some(encryptor) = this.encryptor.as_mut() else {
                return Poll::Ready(None);
            };

            // The final segment is always shorter than SEGMENT_LEN, so any
            // full segment can be sealed as a non-final one.
            if this.buffer.len() >= SEGMENT_LEN {
                let segment = this.buffer.split_to(SEGMENT_LEN);
                let item = match encryptor.encrypt_next(&segment[..]) {
                    Ok(ciphertext) => {
                        *this.emitted += ciphertext.len() as u64;
                        Ok(Bytes::from(ciphertext))
                    }
                    Err(_) => {
                        *this.encryptor = None;
                        Err(CryptoError::Encrypt)
                    }
                };
                return Poll::Ready(Some(item));
            }

            if *this.source_done {
                let Some(encryptor) = this.encryptor.take() else {
                    return Poll::Ready(None);
                };
                let remainder = this.buffer.split();
                let ciphertext = match encryptor.encrypt_last(&remainder[..]) {
                    Ok(ciphertext) => ciphertext,
                    Err(_) => return Poll::Ready(Some(Err(CryptoError::Encrypt))),
                };
                *this.emitted += ciphertext.len() as u64;

                if *this.emitted != *this.expected_ciphertext {
                    return Poll::Ready(Some(Err(CryptoError::CiphertextLength {
                        expected: *this.expected_ciphertext,
                        actual: *this.emitted,
                    })));
                }
                return Poll::Ready(Some(Ok(Bytes::from(ciphertext))));
            }

            match ready!(this.source.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    *this.consumed += chunk.len() as u64;
                    if *this.consumed > *this.expected_plaintext {
                        *this.encryptor = None;
                        return Poll::Ready(Some(Err(CryptoError::SourceOverrun {
                            expected: *this.expected_plaintext,
                            actual: *this.consumed,
                        })));
                    }
                    this.buffer.extend_from_slice(&chunk);
                }
                Some(Err(e)) => {
                    *this.encryptor = None;
                    return Poll::Ready(Some(Err(CryptoError::Source(Box::new(e)))));
                }
                None => {
                    if *this.consumed < *this.expected_plaintext {
                        *this.encryptor = None;
                        return Poll::Ready(Some(Err(CryptoError::SourceTruncated {
                            expected: *this.expected_plaintext,
                            actual: *this.consumed,
                        })));
                    }
                    *this.source_done = true;
                }
            }
        }
    }
}
