//! Error types for value parsing in sensorkit-types.

use thiserror::Error;

/// Errors that can occur when parsing or constructing sensorkit values.
///
/// Host and storage failures belong in sensorkit-core; this type only covers
/// values that can be validated without talking to the host.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The identifier does not name a sensor in the catalog.
    #[error("Unknown sensor identifier: {0}")]
    UnknownSensor(String),

    /// A time range whose start lies after its end.
    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidTimeRange {
        /// Requested start (RFC 3339 where formatting succeeded).
        start: String,
        /// Requested end.
        end: String,
    },

    /// A batch policy that can never make progress.
    #[error("Invalid batch policy: {0}")]
    InvalidBatchPolicy(String),

    /// Malformed value that does not fit the other variants.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias using sensorkit-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
