//! The public entry point.
//!
//! [`SensorModule`] ties a host, a checkpoint backend and a clock together
//! and exposes every sensor operation. Readers are created lazily, one per
//! sensor, and cached so that all operations on a sensor share one FIFO
//! lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use sensorkit_types::{
    BatchPolicy, CheckpointBackend, Device, RawFetchResult, Sensor, TimeRange,
};

use crate::anchored::{AnchoredFetch, FetchContext};
use crate::checkpoint::CheckpointStore;
use crate::clock::{Clock, SystemClock};
use crate::config::ModuleConfig;
use crate::error::{Error, Operation, Result};
use crate::host::{AuthorizationStatus, HostErrorCode, SensorHost};
use crate::processor::Processors;
use crate::reader::SensorReader;

/// Typed access to the host sensor data store.
pub struct SensorModule {
    host: Arc<dyn SensorHost>,
    store: Arc<CheckpointStore>,
    clock: Arc<dyn Clock>,
    config: ModuleConfig,
    processors: Processors,
    readers: Mutex<HashMap<Sensor, SensorReader>>,
}

impl SensorModule {
    /// Create a builder.
    pub fn builder(
        host: Arc<dyn SensorHost>,
        backend: Arc<dyn CheckpointBackend>,
    ) -> SensorModuleBuilder {
        SensorModuleBuilder {
            host,
            backend,
            clock: Arc::new(SystemClock),
            config: ModuleConfig::default(),
            processors: Processors::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    #[must_use]
    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.store
    }

    /// Look up a sensor by its identifier.
    pub fn sensor(&self, id: &str) -> Result<Sensor> {
        Ok(id.parse::<Sensor>()?)
    }

    /// Instant before which data for `sensor` is queryable, as of now.
    #[must_use]
    pub fn quarantine_cutoff(&self, sensor: Sensor) -> OffsetDateTime {
        sensor.descriptor().quarantine_cutoff_at(self.clock.now())
    }

    #[must_use]
    pub fn authorization_status(&self, sensor: Sensor) -> AuthorizationStatus {
        self.host.authorization_status(sensor)
    }

    /// Ask the user for access to `sensors`.
    ///
    /// Sensors whose status is already decided are skipped, and a host
    /// "already authorized" reply counts as success.
    pub async fn request_authorization(&self, sensors: &[Sensor]) -> Result<()> {
        let pending: Vec<Sensor> = sensors
            .iter()
            .copied()
            .filter(|sensor| !self.host.authorization_status(*sensor).is_decided())
            .collect();
        let Some(&first) = pending.first() else {
            debug!("All requested sensors already have a decided status");
            return Ok(());
        };

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.host.request_authorization(
            &pending,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        match rx.await {
            Ok(Ok(())) => {
                info!(sensors = pending.len(), "Authorization request finished");
                Ok(())
            }
            Ok(Err(error)) if error.code == HostErrorCode::AlreadyAuthorized => {
                debug!(%error, "Ignoring already-authorized reply");
                Ok(())
            }
            Ok(Err(error)) if error.code == HostErrorCode::AuthorizationDenied => Err(
                Error::authorization_denied(first, Operation::RequestAuthorization),
            ),
            Ok(Err(error)) => Err(Error::host(first, Operation::RequestAuthorization, error)),
            Err(_) => Err(Error::Cancelled),
        }
    }

    /// The cached reader for `sensor`.
    pub fn reader(&self, sensor: Sensor) -> SensorReader {
        let mut readers = self.readers.lock().unwrap_or_else(PoisonError::into_inner);
        readers
            .entry(sensor)
            .or_insert_with(|| SensorReader::new(Arc::clone(&self.host), self.host.reader(sensor)))
            .clone()
    }

    /// Devices that recorded `sensor`.
    pub async fn fetch_devices(&self, sensor: Sensor) -> Result<Vec<Device>> {
        self.reader(sensor).fetch_devices().await
    }

    /// Start recording every sensor in `sensors`, stopping at the first failure.
    pub async fn start_recording(&self, sensors: &[Sensor]) -> Result<()> {
        for &sensor in sensors {
            self.reader(sensor).start_recording().await?;
            info!(%sensor, "Recording started");
        }
        Ok(())
    }

    /// Stop recording every sensor in `sensors`, stopping at the first failure.
    pub async fn stop_recording(&self, sensors: &[Sensor]) -> Result<()> {
        for &sensor in sensors {
            self.reader(sensor).stop_recording().await?;
            info!(%sensor, "Recording stopped");
        }
        Ok(())
    }

    /// Fetch raw results for `range`, with the end clamped to the quarantine
    /// cutoff. A range entirely inside the quarantine returns nothing without
    /// contacting the host.
    pub async fn fetch(
        &self,
        sensor: Sensor,
        device: &Device,
        range: TimeRange,
    ) -> Result<Vec<RawFetchResult>> {
        let clamped = range.clamp_end(self.quarantine_cutoff(sensor));
        if clamped.is_empty() {
            debug!(%sensor, %range, "Requested range lies inside the quarantine window");
            return Ok(Vec::new());
        }
        self.reader(sensor).fetch(device, clamped).await
    }

    /// Fetch the `duration` of data that ends at the quarantine cutoff.
    ///
    /// A duration longer than representable time fetches everything before
    /// the cutoff.
    pub async fn fetch_most_recent(
        &self,
        sensor: Sensor,
        device: &Device,
        duration: Duration,
    ) -> Result<Vec<RawFetchResult>> {
        let cutoff = self.quarantine_cutoff(sensor);
        let range = TimeRange::new(cutoff.saturating_sub(duration), cutoff)?;
        self.fetch(sensor, device, range).await
    }

    /// Start a resumable, checkpointed batch fetch for `sensor`.
    ///
    /// `policy` overrides both the configured and the catalog batch policy.
    pub fn fetch_anchored(
        &self,
        sensor: Sensor,
        policy: Option<BatchPolicy>,
    ) -> Result<AnchoredFetch> {
        let policy = policy.unwrap_or_else(|| self.config.policy_for(sensor));
        policy.validate()?;
        Ok(AnchoredFetch::new(FetchContext {
            sensor,
            reader: self.reader(sensor),
            store: CheckpointStore::clone(&self.store),
            processor: self.processors.get(sensor),
            clock: Arc::clone(&self.clock),
            backfill: self.config.backfill,
            policy,
        }))
    }

    /// Forget every checkpoint for `sensor`. Returns how many were removed.
    pub fn reset_query_anchors(&self, sensor: Sensor) -> Result<usize> {
        self.store.reset_sensor(sensor)
    }

    /// Forget every checkpoint under the configured prefix.
    pub fn reset_all_query_anchors(&self) -> Result<usize> {
        self.store.reset_all()
    }
}

impl std::fmt::Debug for SensorModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorModule")
            .field("config", &self.config)
            .field("processors", &self.processors)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SensorModule`].
#[must_use]
pub struct SensorModuleBuilder {
    host: Arc<dyn SensorHost>,
    backend: Arc<dyn CheckpointBackend>,
    clock: Arc<dyn Clock>,
    config: ModuleConfig,
    processors: Processors,
}

impl SensorModuleBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: ModuleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn processors(mut self, processors: Processors) -> Self {
        self.processors = processors;
        self
    }

    /// Validate the configuration and check that the host data store exists.
    pub fn build(self) -> Result<SensorModule> {
        self.config.validate()?;
        if !self.host.is_available() {
            return Err(Error::Unavailable);
        }
        let store = CheckpointStore::new(self.backend, self.config.anchor_prefix.clone());
        Ok(SensorModule {
            host: self.host,
            store: Arc::new(store),
            clock: self.clock,
            config: self.config,
            processors: self.processors,
            readers: Mutex::new(HashMap::new()),
        })
    }
}
