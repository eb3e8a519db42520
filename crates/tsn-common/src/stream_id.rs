//! TSN stream identifiers
//!
//! Stream ids are the network's addressing unit for time series. They
//! are 32 characters: the literal prefix `st` followed by 30 lowercase
//! hex characters derived from the stream's human-readable name, so the
//! same name always maps to the same stream.

use crate::error::{Result, TsnError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Number of hash characters kept after the `st` prefix
const STREAM_ID_HASH_LEN: usize = 30;

#[allow(clippy::unwrap_used)]
fn stream_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Compiled once; the literal is a valid pattern.
    PATTERN.get_or_init(|| Regex::new(r"^st[0-9a-f]{30}$").unwrap())
}

/// A validated TSN stream identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamId(String);

impl StreamId {
    /// Parse and validate an existing stream id
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if stream_id_pattern().is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(TsnError::InvalidStreamId(s.to_string()))
        }
    }

    /// Derive a stream id deterministically from a stream name
    ///
    /// The name is lowercased and trimmed before hashing, so
    /// `"My Stream"` and `"my stream "` map to the same id.
    pub fn generate(name: &str) -> Self {
        let canonical = name.trim().to_lowercase();
        let digest = Sha256::digest(canonical.as_bytes());
        let hash = hex::encode(digest);
        Self(format!("st{}", &hash[..STREAM_ID_HASH_LEN]))
    }

    /// The stream id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for StreamId {
    type Error = TsnError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<StreamId> for String {
    fn from(id: StreamId) -> Self {
        id.0
    }
}

impl std::str::FromStr for StreamId {
    type Err = TsnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
