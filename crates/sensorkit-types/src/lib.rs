//! Platform-agnostic types for the sensorkit sensor data access layer.
//!
//! This crate holds the values shared by the core engine, the checkpoint
//! store and the command-line harness. Nothing here talks to the host.
//!
//! # Features
//!
//! - The static sensor catalog ([`Sensor`], [`SensorDescriptor`])
//! - Device descriptions and half-open time ranges
//! - Checkpoints, checkpoint keys and the [`CheckpointBackend`] seam
//! - Raw samples as copied from the host, and their safe representations
//!
//! # Example
//!
//! ```
//! use sensorkit_types::{BatchPolicy, Sensor};
//!
//! let sensor: Sensor = "heartRate".parse().unwrap();
//! assert_eq!(sensor.descriptor().batch_policy, BatchPolicy::EVERY_TWO_HOURS);
//! ```

pub mod checkpoint;
pub mod device;
pub mod error;
pub mod range;
pub mod safe;
pub mod sample;
pub mod sensor;

pub use checkpoint::{Checkpoint, CheckpointBackend, CheckpointKey, StorageError};
pub use device::{Device, DeviceBuilder};
pub use error::{ParseError, ParseResult};
pub use range::TimeRange;
pub use safe::{EcgBatch, EcgSession, SafeSample, SampleTime, TimestampedSample};
pub use sample::{
    AmbientLightSample, DeviceUsageSample, EcgFragment, EcgStage, EcgVoltageBatch,
    HeartRateSample, LightPlacement, MotionSample, OnWristSample, PedometerSample,
    PressureSample, RawBatch, RawFetchResult, RawSample, Scalar, VisitCategory, VisitSample,
};
pub use sensor::{
    BatchPolicy, DEFAULT_QUARANTINE, Processing, ResultShape, SampleKind, Sensor,
    SensorDescriptor,
};
