use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content-addressed identifier for a stored object.
///
/// Server-computed ids are the BLAKE3 hash of the object's serialized
/// payload, hex-encoded (64 characters). Ids supplied by clients are
/// honored verbatim without re-verification -- a trust boundary, not a
/// cryptographic integrity check -- so the type accepts any non-empty
/// hex string up to 64 characters.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

/// Maximum accepted id width (full BLAKE3 hex digest).
pub const MAX_ID_LEN: usize = 64;

impl ObjectId {
    /// Compute an id by digesting raw payload bytes.
    ///
    /// Identical byte sequences always produce the same id, which is what
    /// makes objects deduplicatable and existence checks cheap.
    pub fn from_data(data: &[u8]) -> Self {
        Self(hex::encode(blake3::hash(data).as_bytes()))
    }

    /// Parse a client-supplied or wire-format id.
    ///
    /// Accepts lowercase/uppercase hex (normalized to lowercase). Rejects
    /// empty strings, non-hex characters, and over-long values.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() {
            return Err(TypeError::InvalidObjectId("empty".into()));
        }
        if s.len() > MAX_ID_LEN {
            return Err(TypeError::InvalidObjectId(format!(
                "too long ({} > {MAX_ID_LEN})",
                s.len()
            )));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidObjectId(format!("not hex: {s:?}")));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The id as a hex string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 8 characters) for log output.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }

    /// Consume into the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_data_is_deterministic() {
        let id1 = ObjectId::from_data(b"hello world");
        let id2 = ObjectId::from_data(b"hello world");
        assert_eq!(id1, id2);
    }

    #[test]
    fn different_data_produces_different_ids() {
        assert_ne!(ObjectId::from_data(b"hello"), ObjectId::from_data(b"world"));
    }

    #[test]
    fn computed_id_is_64_hex_chars() {
        let id = ObjectId::from_data(b"test");
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn parse_accepts_short_client_ids() {
        // md5-width ids from older clients are honored verbatim
        let id = ObjectId::parse("79eb41764cc2c065c9d0a01a4e5b1cd4").unwrap();
        assert_eq!(id.as_str().len(), 32);
    }

    #[test]
    fn parse_normalizes_case() {
        let id = ObjectId::parse("ABCDEF01").unwrap();
        assert_eq!(id.as_str(), "abcdef01");
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(ObjectId::parse("").is_err());
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert!(ObjectId::parse("not-hex!").is_err());
    }

    #[test]
    fn parse_rejects_overlong() {
        let long = "a".repeat(65);
        assert!(ObjectId::parse(&long).is_err());
    }

    #[test]
    fn short_is_8_chars() {
        let id = ObjectId::from_data(b"test");
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn display_is_full_hex() {
        let id = ObjectId::from_data(b"test");
        assert_eq!(format!("{id}"), id.as_str());
    }

    #[test]
    fn serde_is_transparent() {
        let id = ObjectId::from_data(b"serde test");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_str()));
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = ObjectId::parse("0a").unwrap();
        let b = ObjectId::parse("0b").unwrap();
        assert!(a < b);
    }
}
