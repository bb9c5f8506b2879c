//! Data models for stored data.

use serde::Serialize;
use time::OffsetDateTime;

use sensorkit_types::Checkpoint;

/// A checkpoint row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAnchor {
    /// Full backend key, `<prefix>.<sensor id>.<device product type>`.
    pub key: String,
    /// The stored checkpoint.
    pub checkpoint: Checkpoint,
    /// Last time the row was written.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl StoredAnchor {
    /// The part of the key after `prefix.`, if the key starts with it.
    #[must_use]
    pub fn suffix<'a>(&'a self, prefix: &str) -> Option<&'a str> {
        self.key.strip_prefix(prefix)?.strip_prefix('.')
    }
}
