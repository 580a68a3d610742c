//! Version snapshots
//!
//! The record a persistence layer saves and hands back: title, storage text and a timestamp
//! (milliseconds since the Unix epoch). The core never looks inside it beyond these fields.

use crate::error::FormatError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    pub title: String,
    pub storage_text: String,
    pub timestamp: u64,
}

impl VersionSnapshot {
    /// Snapshot stamped with the current time
    pub fn new(title: impl Into<String>, storage_text: impl Into<String>) -> Self {
        VersionSnapshot {
            title: title.into(),
            storage_text: storage_text.into(),
            timestamp: now_millis(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn to_json(&self) -> Result<String, FormatError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FormatError::SerializationError(format!("Snapshot serialization failed: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self, FormatError> {
        serde_json::from_str(json)
            .map_err(|e| FormatError::ParseError(format!("Invalid snapshot: {e}")))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
