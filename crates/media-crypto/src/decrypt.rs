use crate::{CryptoError, MediaEncryptionParameters, SEGMENT_LEN, TAG_LEN};

/// Decrypts a complete media ciphertext produced by [`crate::EncryptedBody`].
///
/// Intended for reading back stored objects; holds the whole plaintext in
/// memory.
pub fn decrypt_media(
    params: &MediaEncryptionParameters,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    const SEALED_SEGMENT: usize = SEGMENT_LEN + TAG_LEN;

    let mut decryptor = params.decryptor();
    let mut plaintext = Vec::with_capacity(ciphertext.len());
    let mut rest = ciphertext;

    // A sealed final segment is always shorter than a full one.
    while rest.len() >= SEALED_SEGMENT {
        let (segment, tail) = rest.split_at(SEALED_SEGMENT);
        let block = decryptor
            .decrypt_next(segment)
            .map_err(|_| CryptoError::Decrypt)?;
        plaintext.extend_from_slice(&block);
        rest = tail;
    }

    if rest.len() < TAG_LEN {
        return Err(CryptoError::MalformedCiphertext(ciphertext.len()));
    }

    let block = decryptor
        .decrypt_last(rest)
        .map_err(|_| CryptoError::Decrypt)?;
    plaintext.extend_from_slice(&block);

    Ok(plaintext)
}
