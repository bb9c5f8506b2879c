//! Mock host implementation for testing.
//!
//! This module provides an in-process sensor data store that can be used for
//! unit testing and demos without a platform host.
//!
//! The [`MockHost`] implements [`SensorHost`], and its readers implement
//! [`ReaderHost`], so it can be handed to
//! [`SensorModule`](crate::SensorModule) like a real host. Like a real host,
//! every callback runs on a separate delivery thread.
//!
//! # Features
//!
//! - **Scripted data**: devices and raw results per sensor
//! - **Authorization**: per-sensor status, denial, request errors
//! - **Failure injection**: fail device listing, recording, or the next N
//!   fetches (optionally after delivering some results)
//! - **Out-of-order delivery**: shuffle results with a fixed seed
//! - **Accounting**: request log, in-flight and peak in-flight fetches, and
//!   fetches stopped early by the consumer

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use sensorkit_types::{Device, RawBatch, RawFetchResult, Sensor, TimeRange};

use crate::host::{
    AuthorizationStatus, FetchDelegate, FetchRequest, HostError, HostErrorCode, ReaderHost, Reply,
    SensorHost,
};

/// One fetch observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    pub sensor: Sensor,
    pub product_type: String,
    pub range: TimeRange,
}

#[derive(Debug)]
struct FetchFailure {
    error: HostError,
    /// Results delivered before failing.
    after: usize,
}

#[derive(Debug, Default)]
struct MockState {
    available: AtomicBool,
    grant_on_request: AtomicBool,
    statuses: RwLock<HashMap<Sensor, AuthorizationStatus>>,
    authorization_requests: RwLock<Vec<Vec<Sensor>>>,
    authorization_error: RwLock<Option<HostError>>,
    devices: RwLock<HashMap<Sensor, Vec<Device>>>,
    device_error: RwLock<Option<HostError>>,
    data: RwLock<HashMap<(Sensor, String), Vec<RawFetchResult>>>,
    recording: RwLock<HashSet<Sensor>>,
    recording_error: RwLock<Option<HostError>>,
    fetch_failure: RwLock<Option<FetchFailure>>,
    remaining_fetch_failures: AtomicU32,
    shuffle_seed: RwLock<Option<u64>>,
    delivery_delay: RwLock<Duration>,
    fetch_log: RwLock<Vec<FetchRecord>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    stopped_early: AtomicUsize,
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl MockState {
    fn status(&self, sensor: Sensor) -> AuthorizationStatus {
        read(&self.statuses)
            .get(&sensor)
            .copied()
            .unwrap_or(AuthorizationStatus::NotDetermined)
    }

    /// The error a denied sensor produces. The code is deliberately generic so
    /// callers have to consult the authorization status.
    fn denial(&self, sensor: Sensor) -> Option<HostError> {
        (self.status(sensor) == AuthorizationStatus::Denied)
            .then(|| HostError::new(HostErrorCode::Other, "operation not permitted"))
    }

    fn take_fetch_failure(&self) -> Option<(HostError, usize)> {
        let remaining = self.remaining_fetch_failures.load(Ordering::SeqCst);
        if remaining == 0 {
            return None;
        }
        self.remaining_fetch_failures
            .store(remaining - 1, Ordering::SeqCst);
        read(&self.fetch_failure)
            .as_ref()
            .map(|failure| (failure.error.clone(), failure.after))
    }

    fn results_for(&self, sensor: Sensor, request: &FetchRequest) -> Vec<RawFetchResult> {
        let mut results: Vec<RawFetchResult> = read(&self.data)
            .get(&(sensor, request.device.product_type.clone()))
            .map(|results| {
                results
                    .iter()
                    .filter(|result| request.range.contains(result.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(seed) = *read(&self.shuffle_seed) {
            results.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        results
    }

    /// Runs on the delivery thread.
    fn deliver(&self, sensor: Sensor, request: FetchRequest, delegate: Arc<dyn FetchDelegate>) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        write(&self.fetch_log).push(FetchRecord {
            sensor,
            product_type: request.device.product_type.clone(),
            range: request.range,
        });

        let delay = *read(&self.delivery_delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        if let Some(error) = self.denial(sensor) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            delegate.did_fail(&request, error);
            return;
        }

        let failure = self.take_fetch_failure();
        let results = self.results_for(sensor, &request);
        debug!(%sensor, device = %request.device.product_type, range = %request.range, results = results.len(), "Mock delivering fetch");

        for (index, result) in results.iter().enumerate() {
            if let Some((error, after)) = &failure
                && index == *after
            {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                delegate.did_fail(&request, error.clone());
                return;
            }
            if !delegate.did_fetch(&request, RawBatch::from(result)) {
                self.stopped_early.fetch_add(1, Ordering::SeqCst);
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                return;
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match failure {
            Some((error, _)) => delegate.did_fail(&request, error),
            None => delegate.did_complete(&request),
        }
    }
}

/// Spawn `work` on a fresh delivery thread.
fn on_delivery_thread(work: impl FnOnce() + Send + 'static) {
    std::thread::spawn(work);
}

/// A scriptable in-process host.
///
/// Cloning yields another handle to the same state.
///
/// # Example
///
/// ```
/// use sensorkit_core::{MockHost, SensorHost};
/// use sensorkit_core::host::AuthorizationStatus;
/// use sensorkit_types::{Device, Sensor};
///
/// let host = MockHost::builder()
///     .authorized(Sensor::HeartRate)
///     .device(Sensor::HeartRate, Device::builder().product_type("Watch6,1").build())
///     .build();
/// assert!(host.is_available());
/// assert_eq!(host.authorization_status(Sensor::HeartRate), AuthorizationStatus::Authorized);
/// ```
#[derive(Debug, Clone)]
pub struct MockHost {
    state: Arc<MockState>,
}

impl Default for MockHost {
    fn default() -> Self {
        MockHostBuilder::default().build()
    }
}

impl MockHost {
    /// Create a builder.
    pub fn builder() -> MockHostBuilder {
        MockHostBuilder::default()
    }

    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    pub fn set_status(&self, sensor: Sensor, status: AuthorizationStatus) {
        write(&self.state.statuses).insert(sensor, status);
    }

    /// Whether pending sensors become `Authorized` (or `Denied`) on request.
    pub fn set_grant_on_request(&self, grant: bool) {
        self.state.grant_on_request.store(grant, Ordering::SeqCst);
    }

    /// Make authorization requests fail with `error`.
    pub fn set_authorization_error(&self, error: Option<HostError>) {
        *write(&self.state.authorization_error) = error;
    }

    /// Every sensor list passed to `request_authorization`.
    #[must_use]
    pub fn authorization_requests(&self) -> Vec<Vec<Sensor>> {
        read(&self.state.authorization_requests).clone()
    }

    pub fn add_device(&self, sensor: Sensor, device: Device) {
        write(&self.state.devices)
            .entry(sensor)
            .or_default()
            .push(device);
    }

    /// Make device listing fail with `error`.
    pub fn set_device_error(&self, error: Option<HostError>) {
        *write(&self.state.device_error) = error;
    }

    /// Append raw results for a sensor on a device product type.
    pub fn add_results(
        &self,
        sensor: Sensor,
        product_type: &str,
        results: impl IntoIterator<Item = RawFetchResult>,
    ) {
        write(&self.state.data)
            .entry((sensor, product_type.to_string()))
            .or_default()
            .extend(results);
    }

    /// Make recording calls fail with `error`.
    pub fn set_recording_error(&self, error: Option<HostError>) {
        *write(&self.state.recording_error) = error;
    }

    #[must_use]
    pub fn is_recording(&self, sensor: Sensor) -> bool {
        read(&self.state.recording).contains(&sensor)
    }

    /// Fail the next `count` fetches with `error` after delivering up to
    /// `after` results.
    ///
    /// ```
    /// use sensorkit_core::MockHost;
    /// use sensorkit_core::host::{HostError, HostErrorCode};
    ///
    /// let host = MockHost::default();
    /// // The next two fetches deliver one result, then fail.
    /// host.fail_fetches(2, HostError::new(HostErrorCode::FetchFailed, "daemon crashed"), 1);
    /// ```
    pub fn fail_fetches(&self, count: u32, error: HostError, after: usize) {
        *write(&self.state.fetch_failure) = Some(FetchFailure { error, after });
        self.state
            .remaining_fetch_failures
            .store(count, Ordering::SeqCst);
    }

    /// Number of injected fetch failures not yet consumed.
    #[must_use]
    pub fn remaining_fetch_failures(&self) -> u32 {
        self.state.remaining_fetch_failures.load(Ordering::SeqCst)
    }

    /// Shuffle each fetch's results with a fixed seed, or deliver in order.
    pub fn set_shuffle_seed(&self, seed: Option<u64>) {
        *write(&self.state.shuffle_seed) = seed;
    }

    /// Delay before each fetch starts delivering.
    pub fn set_delivery_delay(&self, delay: Duration) {
        *write(&self.state.delivery_delay) = delay;
    }

    /// Every fetch the host has started, in order.
    #[must_use]
    pub fn fetch_log(&self) -> Vec<FetchRecord> {
        read(&self.state.fetch_log).clone()
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        read(&self.state.fetch_log).len()
    }

    /// Fetches currently delivering.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of fetches ever delivering at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Fetches whose delegate asked to stop before completion.
    #[must_use]
    pub fn stopped_early(&self) -> usize {
        self.state.stopped_early.load(Ordering::SeqCst)
    }
}

impl SensorHost for MockHost {
    fn is_available(&self) -> bool {
        self.state.available.load(Ordering::SeqCst)
    }

    fn authorization_status(&self, sensor: Sensor) -> AuthorizationStatus {
        self.state.status(sensor)
    }

    fn request_authorization(&self, sensors: &[Sensor], reply: Reply<()>) {
        let state = Arc::clone(&self.state);
        let sensors = sensors.to_vec();
        on_delivery_thread(move || {
            write(&state.authorization_requests).push(sensors.clone());
            if let Some(error) = read(&state.authorization_error).clone() {
                reply(Err(error));
                return;
            }
            let pending: Vec<Sensor> = sensors
                .into_iter()
                .filter(|sensor| !state.status(*sensor).is_decided())
                .collect();
            if pending.is_empty() {
                reply(Err(HostError::new(
                    HostErrorCode::AlreadyAuthorized,
                    "authorization already decided",
                )));
                return;
            }
            let outcome = if state.grant_on_request.load(Ordering::SeqCst) {
                AuthorizationStatus::Authorized
            } else {
                AuthorizationStatus::Denied
            };
            let mut statuses = write(&state.statuses);
            for sensor in pending {
                statuses.insert(sensor, outcome);
            }
            drop(statuses);
            reply(Ok(()));
        });
    }

    fn reader(&self, sensor: Sensor) -> Arc<dyn ReaderHost> {
        Arc::new(MockReader {
            sensor,
            state: Arc::clone(&self.state),
        })
    }
}

/// Reader handed out by [`MockHost`].
#[derive(Debug)]
struct MockReader {
    sensor: Sensor,
    state: Arc<MockState>,
}

impl MockReader {
    fn set_recording(&self, on: bool, reply: Reply<()>) {
        let state = Arc::clone(&self.state);
        let sensor = self.sensor;
        on_delivery_thread(move || {
            if let Some(error) = state.denial(sensor) {
                reply(Err(error));
                return;
            }
            if let Some(error) = read(&state.recording_error).clone() {
                reply(Err(error));
                return;
            }
            let mut recording = write(&state.recording);
            if on {
                recording.insert(sensor);
            } else {
                recording.remove(&sensor);
            }
            drop(recording);
            reply(Ok(()));
        });
    }
}

impl ReaderHost for MockReader {
    fn sensor(&self) -> Sensor {
        self.sensor
    }

    fn fetch_devices(&self, reply: Reply<Vec<Device>>) {
        let state = Arc::clone(&self.state);
        let sensor = self.sensor;
        on_delivery_thread(move || {
            if let Some(error) = state.denial(sensor) {
                reply(Err(error));
                return;
            }
            if let Some(error) = read(&state.device_error).clone() {
                reply(Err(error));
                return;
            }
            let devices = read(&state.devices)
                .get(&sensor)
                .cloned()
                .unwrap_or_default();
            reply(Ok(devices));
        });
    }

    fn start_recording(&self, reply: Reply<()>) {
        self.set_recording(true, reply);
    }

    fn stop_recording(&self, reply: Reply<()>) {
        self.set_recording(false, reply);
    }

    fn fetch(&self, request: FetchRequest, delegate: Arc<dyn FetchDelegate>) {
        let state = Arc::clone(&self.state);
        let sensor = self.sensor;
        on_delivery_thread(move || state.deliver(sensor, request, delegate));
    }
}

/// Builder for creating mock hosts with custom settings.
#[derive(Debug)]
#[must_use]
pub struct MockHostBuilder {
    available: bool,
    grant_on_request: bool,
    statuses: HashMap<Sensor, AuthorizationStatus>,
    devices: HashMap<Sensor, Vec<Device>>,
    data: HashMap<(Sensor, String), Vec<RawFetchResult>>,
    shuffle_seed: Option<u64>,
    delivery_delay: Duration,
}

impl Default for MockHostBuilder {
    fn default() -> Self {
        Self {
            available: true,
            grant_on_request: true,
            statuses: HashMap::new(),
            devices: HashMap::new(),
            data: HashMap::new(),
            shuffle_seed: None,
            delivery_delay: Duration::ZERO,
        }
    }
}

impl MockHostBuilder {
    /// Set whether the data store exists.
    pub fn available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn status(mut self, sensor: Sensor, status: AuthorizationStatus) -> Self {
        self.statuses.insert(sensor, status);
        self
    }

    pub fn authorized(self, sensor: Sensor) -> Self {
        self.status(sensor, AuthorizationStatus::Authorized)
    }

    pub fn denied(self, sensor: Sensor) -> Self {
        self.status(sensor, AuthorizationStatus::Denied)
    }

    /// Mark every catalog sensor as authorized.
    pub fn authorize_all(mut self) -> Self {
        for sensor in Sensor::ALL {
            self.statuses
                .insert(sensor, AuthorizationStatus::Authorized);
        }
        self
    }

    /// Whether authorization requests grant or deny pending sensors.
    pub fn grant_on_request(mut self, grant: bool) -> Self {
        self.grant_on_request = grant;
        self
    }

    pub fn device(mut self, sensor: Sensor, device: Device) -> Self {
        self.devices.entry(sensor).or_default().push(device);
        self
    }

    pub fn results(
        mut self,
        sensor: Sensor,
        product_type: &str,
        results: impl IntoIterator<Item = RawFetchResult>,
    ) -> Self {
        self.data
            .entry((sensor, product_type.to_string()))
            .or_default()
            .extend(results);
        self
    }

    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn delivery_delay(mut self, delay: Duration) -> Self {
        self.delivery_delay = delay;
        self
    }

    /// Build the mock host.
    #[must_use]
    pub fn build(self) -> MockHost {
        let state = MockState {
            available: AtomicBool::new(self.available),
            grant_on_request: AtomicBool::new(self.grant_on_request),
            statuses: RwLock::new(self.statuses),
            devices: RwLock::new(self.devices),
            data: RwLock::new(self.data),
            shuffle_seed: RwLock::new(self.shuffle_seed),
            delivery_delay: RwLock::new(self.delivery_delay),
            ..MockState::default()
        };
        MockHost {
            state: Arc::new(state),
        }
    }
}
