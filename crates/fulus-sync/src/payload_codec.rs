//! C4: Payload codec.
//!
//! Encrypts structured offline-transaction metadata (category, memo, device
//! fingerprint, etc.) at rest on the device and in transit. PoC profile
//! derives the key from the user's phone and PIN; production profile takes
//! an opaque KMS-scoped key and is otherwise identical.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce as AesNonce};
use fulus_types::hexbytes::Base64Blob;
use rand::RngCore;
use sha2::{Digest, Sha256};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum PayloadCodecError {
    #[error("ciphertext too short to contain an IV and tag")]
    Truncated,
    #[error("malformed base64 envelope")]
    Malformed,
    #[error("decryption failed: authentication tag mismatch")]
    TagMismatch,
}

/// Derives the PoC-profile encryption key: `SHA256(phone || ":" || pin)`.
pub fn derive_payload_key(phone: &str, pin: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(phone.as_bytes());
    hasher.update(b":");
    hasher.update(pin.as_bytes());
    hasher.finalize().into()
}

/// Encrypts `plaintext` under `key`, returning `base64(IV || ciphertext || tag)`.
pub fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<Base64Blob, PayloadCodecError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut iv_bytes = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv_bytes);
    let iv = AesNonce::from_slice(&iv_bytes);
    let ciphertext_and_tag = cipher
        .encrypt(
            iv,
            Payload {
                msg: plaintext,
                aad: &[],
            },
        )
        .map_err(|_| PayloadCodecError::Malformed)?;
    let mut envelope = Vec::with_capacity(IV_LEN + ciphertext_and_tag.len());
    envelope.extend_from_slice(&iv_bytes);
    envelope.extend_from_slice(&ciphertext_and_tag);
    Ok(Base64Blob::encode(envelope))
}

/// Decrypts an `encrypt`-produced envelope, failing closed on any tag
/// mismatch or malformed input.
pub fn decrypt(envelope: &Base64Blob, key: &[u8; 32]) -> Result<Vec<u8>, PayloadCodecError> {
    let raw = envelope.decode().map_err(|_| PayloadCodecError::Malformed)?;
    if raw.len() < IV_LEN + TAG_LEN {
        return Err(PayloadCodecError::Truncated);
    }
    let (iv_bytes, ciphertext_and_tag) = raw.split_at(IV_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let iv = AesNonce::from_slice(iv_bytes);
    cipher
        .decrypt(
            iv,
            Payload {
                msg: ciphertext_and_tag,
                aad: &[],
            },
        )
        .map_err(|_| PayloadCodecError::TagMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let key = derive_payload_key("+2348000000001", "1234");
        let plaintext = br#"{"category":"groceries","memo":"market run"}"#;
        let envelope = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&envelope, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn fresh_iv_each_call() {
        let key = derive_payload_key("+2348000000001", "1234");
        let a = encrypt(b"same plaintext", &key).unwrap();
        let b = encrypt(b"same plaintext", &key).unwrap();
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn tampered_tag_fails_closed() {
        let key = derive_payload_key("+2348000000001", "1234");
        let envelope = encrypt(b"hello", &key).unwrap();
        let mut raw = envelope.decode().unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = Base64Blob::encode(raw);
        assert!(matches!(decrypt(&tampered, &key), Err(PayloadCodecError::TagMismatch)));
    }

    #[test]
    fn wrong_key_fails_closed() {
        let key = derive_payload_key("+2348000000001", "1234");
        let other_key = derive_payload_key("+2348000000002", "1234");
        let envelope = encrypt(b"hello", &key).unwrap();
        assert!(matches!(decrypt(&envelope, &other_key), Err(PayloadCodecError::TagMismatch)));
    }

    #[test]
    fn truncated_envelope_is_rejected() {
        let key = derive_payload_key("+2348000000001", "1234");
        let short = Base64Blob::encode(vec![0u8; 4]);
        assert!(matches!(decrypt(&short, &key), Err(PayloadCodecError::Truncated)));
    }
}
