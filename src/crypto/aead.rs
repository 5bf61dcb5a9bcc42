use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::error::AppError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A decrypted blob's nonce and ciphertext, split out of the wire format for
/// callers that need to re-encrypt under a different key (key rotation).
pub struct EncryptedBlob {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `key` and return the wire format
/// `nonce(12) || tag(16) || ciphertext` (spec.md §4.4).
///
/// The `aes-gcm` crate's own `encrypt` appends the tag to the end of the
/// ciphertext; the wire format here puts the tag right after the nonce, so
/// the tag is split off and moved up front.
pub fn encrypt_blob(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, AppError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut ciphertext_and_tag = cipher.encrypt(nonce, plaintext).map_err(|_| AppError::Integrity)?;
    if ciphertext_and_tag.len() < TAG_LEN {
        return Err(AppError::Integrity);
    }
    let tag = ciphertext_and_tag.split_off(ciphertext_and_tag.len() - TAG_LEN);
    let ciphertext = ciphertext_and_tag;

    let mut out = Vec::with_capacity(NONCE_LEN + TAG_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&tag);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `nonce || tag || ciphertext` blob under `key`. Any tampering
/// with any of the three segments surfaces as `AppError::Integrity`
/// (spec.md §4.6 restore integrity check) — never a partial or garbage
/// plaintext.
pub fn decrypt_blob(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>, AppError> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(AppError::Integrity);
    }
    let (nonce_bytes, rest) = blob.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let mut ciphertext_and_tag = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    ciphertext_and_tag.extend_from_slice(ciphertext);
    ciphertext_and_tag.extend_from_slice(tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext_and_tag.as_ref())
        .map_err(|_| AppError::Integrity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> [u8; 32] {
        [7u8; 32]
    }

    #[test]
    fn round_trip() {
        let plaintext = b"classified payload".to_vec();
        let blob = encrypt_blob(&key(), &plaintext).unwrap();
        assert_eq!(blob.len(), NONCE_LEN + TAG_LEN + plaintext.len());
        let decrypted = decrypt_blob(&key(), &blob).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails_integrity() {
        let plaintext = b"classified payload".to_vec();
        let mut blob = encrypt_blob(&key(), &plaintext).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        let err = decrypt_blob(&key(), &blob).unwrap_err();
        assert!(matches!(err, AppError::Integrity));
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let plaintext = b"classified payload".to_vec();
        let blob = encrypt_blob(&key(), &plaintext).unwrap();
        let err = decrypt_blob(&[9u8; 32], &blob).unwrap_err();
        assert!(matches!(err, AppError::Integrity));
    }

    #[test]
    fn truncated_blob_fails_integrity() {
        let err = decrypt_blob(&key(), &[0u8; 4]).unwrap_err();
        assert!(matches!(err, AppError::Integrity));
    }

    #[test]
    fn nonces_are_not_reused() {
        let plaintext = b"same plaintext twice".to_vec();
        let blob1 = encrypt_blob(&key(), &plaintext).unwrap();
        let blob2 = encrypt_blob(&key(), &plaintext).unwrap();
        assert_ne!(&blob1[..NONCE_LEN], &blob2[..NONCE_LEN]);
    }
}
