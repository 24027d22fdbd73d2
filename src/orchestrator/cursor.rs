//! Opaque continuation tokens for streamed results.
//!
//! A cursor records which source produced a result, the result's position
//! in that source's answer, and when it was issued. It is serialised as
//! compact JSON and encoded with URL-safe, unpadded base64 so callers can
//! pass it around as a plain string.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::Source;

/// Position of one streamed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCursor {
    #[serde(rename = "s")]
    pub source: Source,
    #[serde(rename = "i")]
    pub index: usize,
    /// Issue time, milliseconds since the Unix epoch.
    #[serde(rename = "t")]
    pub timestamp_ms: i64,
}

impl StreamCursor {
    /// A cursor for the result at `index` from `source`, stamped now.
    pub fn new(source: Source, index: usize) -> Self {
        Self {
            source,
            index,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn encode(&self) -> String {
        // Serialising a struct of plain scalars cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a token produced by [`StreamCursor::encode`].
    pub fn decode(token: &str) -> Result<Self, SearchError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| SearchError::InvalidCursor(format!("not base64: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SearchError::InvalidCursor(format!("malformed cursor: {e}")))
    }
}
