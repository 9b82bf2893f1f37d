//! Timestamp canonicalization.
//!
//! The write endpoints only accept `YYYY-MM-DDTHH:MM:SSZ`, while reads hand
//! back full RFC 3339 values or `{ "date": ..., "highlight": ... }` wrappers.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

/// strftime pattern for canonical UTC timestamps.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Substituted when a timestamp cannot be interpreted at all.
pub const FALLBACK_TIMESTAMP: &str = "2024-12-15T10:30:00Z";

/// Format a UTC datetime in the canonical pattern.
pub fn canonical(dt: &DateTime<Utc>) -> String {
    dt.format(CANONICAL_FORMAT).to_string()
}

/// Whether `s` is already in the canonical pattern.
pub fn is_canonical(s: &str) -> bool {
    s.len() == 20 && NaiveDateTime::parse_from_str(s, CANONICAL_FORMAT).is_ok()
}

/// A timestamp as it may arrive from the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseTimestamp {
    /// Any RFC 3339 string lands here, whatever its offset.
    Native(DateTime<Utc>),
    Text(String),
    Nested { date: Box<LooseTimestamp> },
    Other(serde_json::Value),
}

impl LooseTimestamp {
    /// Render in the canonical pattern, falling back to [`FALLBACK_TIMESTAMP`].
    pub fn to_canonical(&self) -> String {
        match self {
            LooseTimestamp::Native(dt) => canonical(dt),
            LooseTimestamp::Text(text) => parse_text(text)
                .map(|dt| canonical(&dt))
                .unwrap_or_else(|| FALLBACK_TIMESTAMP.to_string()),
            LooseTimestamp::Nested { date } => date.to_canonical(),
            LooseTimestamp::Other(_) => FALLBACK_TIMESTAMP.to_string(),
        }
    }
}

impl From<DateTime<Utc>> for LooseTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        LooseTimestamp::Native(dt)
    }
}

impl From<&str> for LooseTimestamp {
    fn from(s: &str) -> Self {
        LooseTimestamp::Text(s.to_string())
    }
}

fn parse_text(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // No offset: assume UTC
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}
