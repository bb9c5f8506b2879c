//! Checkpoint values and the persistence seam behind them.
//!
//! A checkpoint marks how far the anchored fetcher has processed one
//! sensor/device pair. The backing key-value store is abstracted by
//! [`CheckpointBackend`] so it can live in SQLite, in memory, or wherever the
//! embedding application keeps its preferences.

use core::fmt;
use std::error::Error as StdError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::sensor::Sensor;

/// Progress marker for one sensor/device pair.
///
/// `DistantPast` orders before every concrete instant, so comparisons with
/// `<`/`>` give the expected "has it advanced" semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Checkpoint {
    /// Nothing has been processed yet.
    #[default]
    DistantPast,
    /// Everything strictly before this instant has been processed.
    At(OffsetDateTime),
}

impl Checkpoint {
    /// The concrete instant, if any.
    #[must_use]
    pub fn instant(self) -> Option<OffsetDateTime> {
        match self {
            Checkpoint::DistantPast => None,
            Checkpoint::At(instant) => Some(instant),
        }
    }

    #[must_use]
    pub fn is_distant_past(self) -> bool {
        matches!(self, Checkpoint::DistantPast)
    }

    /// Encode as nanoseconds since the Unix epoch, `None` for the distant past.
    ///
    /// Instants outside the `i64` nanosecond range saturate.
    #[must_use]
    pub fn to_unix_nanos(self) -> Option<i64> {
        self.instant().map(|instant| {
            let nanos = instant.unix_timestamp_nanos();
            i64::try_from(nanos).unwrap_or(if nanos < 0 { i64::MIN } else { i64::MAX })
        })
    }

    /// Decode the value produced by [`Checkpoint::to_unix_nanos`].
    ///
    /// Returns `None` if the timestamp cannot be represented.
    #[must_use]
    pub fn from_unix_nanos(nanos: Option<i64>) -> Option<Self> {
        match nanos {
            None => Some(Checkpoint::DistantPast),
            Some(nanos) => OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
                .ok()
                .map(Checkpoint::At),
        }
    }
}

impl From<OffsetDateTime> for Checkpoint {
    fn from(instant: OffsetDateTime) -> Self {
        Checkpoint::At(instant)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkpoint::DistantPast => f.write_str("distant past"),
            Checkpoint::At(instant) => match instant
                .format(&time::format_description::well_known::Rfc3339)
            {
                Ok(text) => f.write_str(&text),
                Err(_) => write!(f, "{}", instant.unix_timestamp()),
            },
        }
    }
}

/// Identifies one checkpoint: a sensor on a device product type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CheckpointKey {
    pub sensor: Sensor,
    pub device_product_type: String,
}

impl CheckpointKey {
    pub fn new(sensor: Sensor, device_product_type: impl Into<String>) -> Self {
        Self {
            sensor,
            device_product_type: device_product_type.into(),
        }
    }

    /// The key under which this checkpoint is persisted:
    /// `"{prefix}.{sensor id}.{product type}"`.
    ///
    /// ```
    /// use sensorkit_types::{CheckpointKey, Sensor};
    ///
    /// let key = CheckpointKey::new(Sensor::HeartRate, "Watch6,1");
    /// assert_eq!(key.storage_key("app.anchor"), "app.anchor.heartRate.Watch6,1");
    /// ```
    #[must_use]
    pub fn storage_key(&self, prefix: &str) -> String {
        format!(
            "{prefix}.{}.{}",
            self.sensor.id(),
            self.device_product_type
        )
    }

    /// Prefix shared by every persisted key of `sensor`.
    #[must_use]
    pub fn sensor_prefix(prefix: &str, sensor: Sensor) -> String {
        format!("{prefix}.{}.", sensor.id())
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.sensor, self.device_product_type)
    }
}

/// Failure reported by a checkpoint backend.
#[derive(Debug, thiserror::Error)]
#[error("checkpoint storage failed: {message}")]
pub struct StorageError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl StorageError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Persistent string-keyed storage for checkpoints.
///
/// Implementations must be safe to call from any thread; writes to a single
/// key must be atomic with respect to reads of that key.
pub trait CheckpointBackend: Send + Sync {
    /// Load the checkpoint stored under `key`, or `None` if absent.
    fn load(&self, key: &str) -> Result<Option<Checkpoint>, StorageError>;

    /// Durably store `checkpoint` under `key`, replacing any previous value.
    fn store(&self, key: &str, checkpoint: Checkpoint) -> Result<(), StorageError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key starting with `prefix`, returning how many were removed.
    fn delete_matching(&self, prefix: &str) -> Result<usize, StorageError>;
}
