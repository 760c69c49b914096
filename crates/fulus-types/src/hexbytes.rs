//! Hex and base64 wrapper types for hashes, signatures, and ciphertext blobs.
//!
//! Mirrors the wrapper-type idiom used throughout this codebase's wire layer:
//! a thin newtype with explicit `encode`/`decode`, rather than passing raw
//! `String`/`Vec<u8>` around.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

/// The genesis `previousHash` value: 64 '0' hex characters.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";
const _ASSERT_GENESIS_LEN: () = assert!(GENESIS_HASH.len() == 64);

/// A 32-byte hash rendered as 64 lowercase hex characters (e.g. a `txHash`
/// or `previousHash`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexHash(String);

/// Errors constructing a [`HexHash`] from an untrusted string.
#[derive(Debug, thiserror::Error)]
pub enum HexHashError {
    #[error("hash must be exactly 64 hex characters, got {0}")]
    WrongLength(usize),
    #[error("hash contains non-hex characters")]
    NotHex,
}

impl HexHash {
    /// Constructs a `HexHash` from 32 raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        HexHash(hex::encode(bytes))
    }

    /// Parses and validates a hex string into a `HexHash`.
    pub fn parse(s: impl Into<String>) -> Result<Self, HexHashError> {
        let s = s.into();
        if s.len() != 64 {
            return Err(HexHashError::WrongLength(s.len()));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HexHashError::NotHex);
        }
        Ok(HexHash(s.to_ascii_lowercase()))
    }

    /// The genesis hash constant, used as `previousHash` for a user's first
    /// ever transaction.
    pub fn genesis() -> Self {
        HexHash(GENESIS_HASH.to_string())
    }

    pub fn is_genesis(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> Result<[u8; 32], hex::FromHexError> {
        let decoded = hex::decode(&self.0)?;
        decoded
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)
    }
}

impl Display for HexHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for HexHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for HexHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HexHash::parse(s).map_err(serde::de::Error::custom)
    }
}

/// A nonce: 32-64 hex characters, globally unique across accepted offline
/// transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

#[derive(Debug, thiserror::Error)]
pub enum NonceError {
    #[error("nonce must be 32-64 hex characters, got {0}")]
    WrongLength(usize),
    #[error("nonce contains non-hex characters")]
    NotHex,
}

impl Nonce {
    pub fn parse(s: impl Into<String>) -> Result<Self, NonceError> {
        let s = s.into();
        if !(32..=64).contains(&s.len()) {
            return Err(NonceError::WrongLength(s.len()));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(NonceError::NotHex);
        }
        Ok(Nonce(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Nonce {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A base64-encoded opaque byte blob (ciphertext payload or signature).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Blob(Cow<'static, str>);

impl Base64Blob {
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(input.as_ref());
        Base64Blob(Cow::Owned(encoded))
    }

    pub fn from_encoded(s: impl Into<String>) -> Self {
        Base64Blob(Cow::Owned(s.into()))
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.decode(self.0.as_ref())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Base64Blob {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Base64Blob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Base64Blob {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Base64Blob(Cow::Owned(s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_hash_is_64_zero_chars() {
        let genesis = HexHash::genesis();
        assert_eq!(genesis.as_str().len(), 64);
        assert!(genesis.is_genesis());
    }

    #[test]
    fn hex_hash_rejects_wrong_length() {
        assert!(HexHash::parse("abcd").is_err());
    }

    #[test]
    fn hex_hash_rejects_non_hex() {
        let bad = "g".repeat(64);
        assert!(HexHash::parse(bad).is_err());
    }

    #[test]
    fn nonce_accepts_boundary_lengths() {
        assert!(Nonce::parse("a".repeat(32)).is_ok());
        assert!(Nonce::parse("a".repeat(64)).is_ok());
        assert!(Nonce::parse("a".repeat(31)).is_err());
        assert!(Nonce::parse("a".repeat(65)).is_err());
    }

    #[test]
    fn base64_blob_roundtrip() {
        let blob = Base64Blob::encode(b"hello world");
        assert_eq!(blob.decode().unwrap(), b"hello world");
    }
}
