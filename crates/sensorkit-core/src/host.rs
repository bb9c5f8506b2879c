//! Interfaces to the host sensor data store.
//!
//! The host is callback-driven: every operation takes a completion that the
//! host invokes exactly once, on its own delivery thread. Fetches additionally
//! stream zero or more results to a [`FetchDelegate`] before completing.
//!
//! The rest of the crate never talks to a concrete host. Production embeds
//! implement these traits over the platform API; tests and the CLI use
//! [`MockHost`](crate::mock::MockHost).

use core::fmt;
use std::sync::Arc;

use thiserror::Error;

use sensorkit_types::{Device, RawBatch, Sensor, TimeRange};

/// Completion callback for one host operation.
///
/// Invoked exactly once, on the host's delivery thread.
pub type Reply<T> = Box<dyn FnOnce(Result<T, HostError>) + Send + 'static>;

/// Authorization state of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    NotDetermined,
    Authorized,
    Denied,
}

impl AuthorizationStatus {
    /// Whether the user has already answered for this sensor.
    #[must_use]
    pub fn is_decided(self) -> bool {
        !matches!(self, AuthorizationStatus::NotDetermined)
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationStatus::NotDetermined => f.write_str("not determined"),
            AuthorizationStatus::Authorized => f.write_str("authorized"),
            AuthorizationStatus::Denied => f.write_str("denied"),
        }
    }
}

/// Error category reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum HostErrorCode {
    AuthorizationDenied,
    /// Returned when requesting authorization for sensors already decided.
    AlreadyAuthorized,
    InvalidRequest,
    FetchFailed,
    RecordingFailed,
    Other,
}

impl fmt::Display for HostErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            HostErrorCode::AuthorizationDenied => "authorization denied",
            HostErrorCode::AlreadyAuthorized => "already authorized",
            HostErrorCode::InvalidRequest => "invalid request",
            HostErrorCode::FetchFailed => "fetch failed",
            HostErrorCode::RecordingFailed => "recording failed",
            HostErrorCode::Other => "host error",
        };
        f.write_str(text)
    }
}

/// An error reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct HostError {
    pub code: HostErrorCode,
    pub message: String,
}

impl HostError {
    pub fn new(code: HostErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// One bounded fetch: a device and a half-open time range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub device: Device,
    pub range: TimeRange,
}

impl FetchRequest {
    pub fn new(device: Device, range: TimeRange) -> Self {
        Self { device, range }
    }
}

/// Receives the results of one fetch.
///
/// The host calls [`did_fetch`](Self::did_fetch) zero or more times and then
/// exactly one of [`did_complete`](Self::did_complete) or
/// [`did_fail`](Self::did_fail). All calls happen on the host's delivery
/// thread; implementations must not block on async work from there.
pub trait FetchDelegate: Send + Sync {
    /// One result. The borrowed batch is only valid during this call.
    ///
    /// Return `false` to ask the host to stop delivering.
    fn did_fetch(&self, request: &FetchRequest, batch: RawBatch<'_>) -> bool;

    /// The host delivered every result for the request.
    fn did_complete(&self, request: &FetchRequest);

    /// The fetch failed; results already delivered are incomplete.
    fn did_fail(&self, request: &FetchRequest, error: HostError);
}

/// Per-sensor handle into the host.
pub trait ReaderHost: Send + Sync {
    /// The sensor this reader serves.
    fn sensor(&self) -> Sensor;

    /// List devices that recorded this sensor.
    fn fetch_devices(&self, reply: Reply<Vec<Device>>);

    fn start_recording(&self, reply: Reply<()>);

    fn stop_recording(&self, reply: Reply<()>);

    /// Start a fetch; results go to `delegate`.
    fn fetch(&self, request: FetchRequest, delegate: Arc<dyn FetchDelegate>);
}

/// The host sensor data store.
pub trait SensorHost: Send + Sync {
    /// Whether the data store exists on this device at all.
    fn is_available(&self) -> bool;

    fn authorization_status(&self, sensor: Sensor) -> AuthorizationStatus;

    /// Prompt the user for access to `sensors`.
    fn request_authorization(&self, sensors: &[Sensor], reply: Reply<()>);

    /// Obtain the reader for `sensor`.
    fn reader(&self, sensor: Sensor) -> Arc<dyn ReaderHost>;
}
