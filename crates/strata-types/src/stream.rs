use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Tenant partition identifier (a stream, also called a project).
///
/// Every object-store and closure-index operation is implicitly scoped to
/// one stream; cross-stream references are impossible by construction.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Parse and validate a stream id.
    ///
    /// Stream ids are short opaque tokens minted by the platform layer;
    /// here we only reject values that cannot be a path segment.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() {
            return Err(TypeError::InvalidStreamId("empty".into()));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(TypeError::InvalidStreamId(format!("invalid characters: {s:?}")));
        }
        Ok(Self(s.to_owned()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
