//! Opaque pagination cursors.
//!
//! A cursor describes where the next page resumes relative to the current
//! ordering: the order-by field, the strict comparison to apply, the last
//! seen value of that field, and (when not ordering by id) the last seen
//! id for tuple-comparison tie-breaking. Cursors are minted server-side
//! and base64-encoded so clients treat them as opaque tokens; raw row
//! identifiers are never exposed as pagination state.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_types::ObjectId;

use crate::error::{QueryError, QueryResult};
use crate::predicate::Operator;

/// Keyset pagination state for the filtered child query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorToken {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
    #[serde(rename = "lastSeenId", skip_serializing_if = "Option::is_none")]
    pub last_seen_id: Option<ObjectId>,
}

impl CursorToken {
    /// Encode to the opaque wire form.
    pub fn encode(&self) -> QueryResult<String> {
        let json =
            serde_json::to_vec(self).map_err(|e| QueryError::InvalidCursor(e.to_string()))?;
        Ok(BASE64.encode(json))
    }

    /// Decode a client-supplied token. Clients never generate these, so any
    /// malformed input is a user error.
    pub fn decode(token: &str) -> QueryResult<Self> {
        let bytes = BASE64
            .decode(token)
            .map_err(|e| QueryError::InvalidCursor(format!("not base64: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| QueryError::InvalidCursor(format!("malformed token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roundtrip() {
        let token = CursorToken {
            field: "height".into(),
            operator: Operator::Gt,
            value: json!(12.5),
            last_seen_id: Some(ObjectId::from_data(b"row")),
        };
        let encoded = token.encode().unwrap();
        let decoded = CursorToken::decode(&encoded).unwrap();
        assert_eq!(token, decoded);
    }

    #[test]
    fn token_is_opaque_base64() {
        let token = CursorToken {
            field: "id".into(),
            operator: Operator::Gt,
            value: json!("abc"),
            last_seen_id: None,
        };
        let encoded = token.encode().unwrap();
        assert!(!encoded.contains('{')); // no raw JSON on the wire
        assert!(BASE64.decode(&encoded).is_ok());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(CursorToken::decode("!!!not-base64!!!").is_err());
        // valid base64 but not a token
        let bogus = BASE64.encode(b"[1,2,3]");
        assert!(CursorToken::decode(&bogus).is_err());
    }

    #[test]
    fn decode_rejects_unlisted_operator() {
        // a hand-forged token trying to smuggle an operator outside the
        // whitelist is rejected at decode time
        let forged = BASE64.encode(br#"{"field":"id","operator":"LIKE","value":"x"}"#);
        assert!(CursorToken::decode(&forged).is_err());
    }
}
