//! Error types for sensorkit-core.
//!
//! Every fallible operation in this crate returns [`Error`]. The host's own
//! error type, [`HostError`](crate::host::HostError), is wrapped together with
//! the sensor and operation it came from so callers can tell what failed.
//!
//! # Classification
//!
//! | Error | Cause | Anchor effect |
//! |-------|-------|---------------|
//! | [`Error::AuthorizationDenied`] | The user denied access to the sensor | unchanged |
//! | [`Error::Host`] | Any other failure reported by the host | unchanged |
//! | [`Error::Processing`] | Raw samples could not be turned into safe values | unchanged for that batch |
//! | [`Error::Storage`] | The checkpoint backend failed to persist | unchanged for that batch |
//! | [`Error::Unavailable`] | The host data store does not exist on this device | n/a |
//!
//! The core never retries on its own. An anchored fetch that fails stops; calling
//! `fetch_anchored` again resumes from the last delivered batch.

use core::fmt;

use thiserror::Error;

use sensorkit_types::{ParseError, Sensor, StorageError};

use crate::host::HostError;
use crate::processor::ProcessingError;

/// The host operation an error relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchDevices,
    Fetch,
    StartRecording,
    StopRecording,
    RequestAuthorization,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::FetchDevices => "fetch devices",
            Operation::Fetch => "fetch",
            Operation::StartRecording => "start recording",
            Operation::StopRecording => "stop recording",
            Operation::RequestAuthorization => "request authorization",
        };
        f.write_str(name)
    }
}

/// Errors that can occur when accessing the sensor data store.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The host sensor data store is not present on this device.
    #[error("Sensor data store is unavailable on this device")]
    Unavailable,

    /// The user has not granted access to the sensor.
    #[error("Authorization denied for {sensor} ({operation})")]
    AuthorizationDenied {
        /// The sensor that was accessed.
        sensor: Sensor,
        /// The operation that was refused.
        operation: Operation,
    },

    /// Any other failure reported by the host.
    #[error("Host error for {sensor} ({operation}): {source}")]
    Host {
        /// The sensor that was accessed.
        sensor: Sensor,
        /// The failed operation.
        operation: Operation,
        /// The error reported by the host.
        #[source]
        source: HostError,
    },

    /// A sample processor rejected the data.
    #[error("Failed to process {sensor} samples: {source}")]
    Processing {
        /// The sensor whose samples were processed.
        sensor: Sensor,
        /// The processor's error.
        #[source]
        source: ProcessingError,
    },

    /// The checkpoint backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The identifier does not name a known sensor.
    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create an authorization error.
    pub fn authorization_denied(sensor: Sensor, operation: Operation) -> Self {
        Self::AuthorizationDenied { sensor, operation }
    }

    /// Create a host error with sensor and operation context.
    pub fn host(sensor: Sensor, operation: Operation, source: HostError) -> Self {
        Self::Host {
            sensor,
            operation,
            source,
        }
    }

    /// Create a processing error.
    pub fn processing(sensor: Sensor, source: ProcessingError) -> Self {
        Self::Processing { sensor, source }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error means the user denied access.
    #[must_use]
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::AuthorizationDenied { .. })
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnknownSensor(id) => Error::UnknownSensor(id),
            other => Error::InvalidConfig(other.to_string()),
        }
    }
}

/// Result type alias using sensorkit-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
