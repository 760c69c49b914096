//! C2: Signature primitives.
//!
//! Signatures cover the hex-encoded `txHash`. Two profiles are supported,
//! selected per-user by a [`SignerKey`] descriptor: a PoC profile using
//! HMAC-SHA256 with a key derived from the user's phone and PIN digest, and
//! a production profile using RSA-PKCS1v1.5-SHA256 against the user's
//! registered public key. The wire format is base64 in both cases.

use fulus_types::hexbytes::{Base64Blob, HexHash};
use hmac::{Hmac, Mac};
use rsa::pkcs1v15::{Signature as RsaSignature, SigningKey, VerifyingKey};
use rsa::sha2::Sha256 as RsaSha256;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("signature does not verify")]
    Mismatch,
    #[error("malformed signature encoding")]
    Malformed,
    #[error("HMAC key of invalid length")]
    InvalidKey,
}

/// Derives the PoC-profile HMAC key: `SHA256(phone || ":" || storedPinDigest)`.
pub fn derive_hmac_key(phone: &str, stored_pin_digest: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(phone.as_bytes());
    hasher.update(b":");
    hasher.update(stored_pin_digest.as_bytes());
    hasher.finalize().into()
}

/// A per-user key descriptor selecting which signature profile to verify
/// against.
pub enum SignerKey {
    /// PoC profile: shared HMAC secret.
    Hmac { key: [u8; 32] },
    /// Production profile: RSA public key.
    Rsa { public_key: RsaPublicKey },
}

/// Signs `tx_hash`'s hex representation with the PoC HMAC profile.
pub fn sign_hmac(tx_hash: &HexHash, key: &[u8; 32]) -> Result<Base64Blob, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(tx_hash.as_str().as_bytes());
    let tag = mac.finalize().into_bytes();
    Ok(Base64Blob::encode(tag))
}

/// Signs `tx_hash`'s hex representation with an RSA private key
/// (production profile).
pub fn sign_rsa(tx_hash: &HexHash, private_key: &RsaPrivateKey) -> Result<Base64Blob, SignatureError> {
    let signing_key = SigningKey::<RsaSha256>::new(private_key.clone());
    let signature = signing_key.sign(tx_hash.as_str().as_bytes());
    Ok(Base64Blob::encode(signature.to_bytes()))
}

/// Verifies `signature` over `tx_hash` under the selected `key` profile.
pub fn verify_signature(
    tx_hash: &HexHash,
    signature: &Base64Blob,
    key: &SignerKey,
) -> Result<(), SignatureError> {
    let raw = signature.decode().map_err(|_| SignatureError::Malformed)?;
    match key {
        SignerKey::Hmac { key } => {
            let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidKey)?;
            mac.update(tx_hash.as_str().as_bytes());
            mac.verify_slice(&raw).map_err(|_| SignatureError::Mismatch)
        }
        SignerKey::Rsa { public_key } => {
            let verifying_key = VerifyingKey::<RsaSha256>::new(public_key.clone());
            let rsa_signature =
                RsaSignature::try_from(raw.as_slice()).map_err(|_| SignatureError::Malformed)?;
            verifying_key
                .verify(tx_hash.as_str().as_bytes(), &rsa_signature)
                .map_err(|_| SignatureError::Mismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_round_trips() {
        let key = derive_hmac_key("+2348000000001", "pin-digest");
        let hash = HexHash::genesis();
        let sig = sign_hmac(&hash, &key).unwrap();
        assert!(verify_signature(&hash, &sig, &SignerKey::Hmac { key }).is_ok());
    }

    #[test]
    fn hmac_rejects_tampered_hash() {
        let key = derive_hmac_key("+2348000000001", "pin-digest");
        let hash = HexHash::genesis();
        let sig = sign_hmac(&hash, &key).unwrap();
        let other_hash = HexHash::parse("1".repeat(64)).unwrap();
        assert!(verify_signature(&other_hash, &sig, &SignerKey::Hmac { key }).is_err());
    }

    #[test]
    fn rsa_round_trips() {
        // `rsa`'s key generation is bound to `rand_core` 0.6's `CryptoRngCore`,
        // which predates the `rand` 0.9 used elsewhere in this workspace.
        let mut rng = rand_core::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let hash = HexHash::genesis();
        let sig = sign_rsa(&hash, &private_key).unwrap();
        assert!(verify_signature(&hash, &sig, &SignerKey::Rsa { public_key }).is_ok());
    }
}
