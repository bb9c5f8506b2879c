//! Anchored, checkpointed access to an on-device sensor data store.
//!
//! The host operating system records sensor data on its own and serves it
//! through a callback API. This crate wraps that API in typed async
//! operations and adds a resumable batch fetcher on top.
//!
//! # Features
//!
//! - **Authorization**: query and request access per sensor
//! - **Device enumeration**: list the devices that recorded a sensor
//! - **Raw fetches**: collected or streamed, one operation at a time per sensor
//! - **Safe samples**: raw records turned into immutable `Send + Sync` values,
//!   including electrocardiogram session reconstruction
//! - **Anchored fetches**: bounded batches with durable per-device checkpoints
//!   that respect the sensor's quarantine window
//! - **Mock host**: a scriptable in-process host for tests and demos
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use sensorkit_core::{MemoryBackend, MockHost, SensorModule};
//! use sensorkit_types::Sensor;
//!
//! # async fn example() -> sensorkit_core::Result<()> {
//! let host = MockHost::builder().authorize_all().build();
//! let module = SensorModule::builder(Arc::new(host), Arc::new(MemoryBackend::new())).build()?;
//!
//! let mut batches = module.fetch_anchored(Sensor::HeartRate, None)?;
//! while let Some(batch) = batches.next().await {
//!     let batch = batch?;
//!     println!("{}: {} samples", batch.info.range, batch.samples.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Checkpoints
//!
//! Progress is stored per (sensor, device product type) through a
//! [`CheckpointBackend`](sensorkit_types::CheckpointBackend).
//! [`MemoryBackend`] keeps them in memory; the `sensorkit-store` crate
//! persists them in SQLite.

pub mod anchored;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod error;
pub mod host;
pub mod mock;
pub mod module;
pub mod processor;
pub mod reader;
pub mod results;

// Core exports
pub use anchored::{AnchoredFetch, Batch, BatchInfo, SampleSpan};
pub use checkpoint::{Anchor, CheckpointStore, DEFAULT_ANCHOR_PREFIX, MemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_BACKFILL, ModuleConfig};
pub use error::{Error, Operation, Result};
pub use host::{
    AuthorizationStatus, FetchDelegate, FetchRequest, HostError, HostErrorCode, ReaderHost, Reply,
    SensorHost,
};
pub use mock::{FetchRecord, MockHost, MockHostBuilder};
pub use module::{SensorModule, SensorModuleBuilder};
pub use processor::{
    EcgSessionProcessor, PassThroughProcessor, ProcessingError, Processors, SampleProcessor,
    WrapProcessor,
};
pub use reader::{FetchStream, SensorReader};
pub use results::FetchResults;

// Re-export from sensorkit-types
pub use sensorkit_types::{
    BatchPolicy, Checkpoint, CheckpointKey, Device, RawFetchResult, RawSample, SafeSample, Sensor,
    TimeRange,
};
