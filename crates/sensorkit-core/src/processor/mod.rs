//! Transformation of raw samples into safe representations.
//!
//! Each sensor is bound to a [`SampleProcessor`]. The default binding comes from
//! the catalog's [`Processing`] strategy; callers may override any sensor via
//! [`Processors::with`].

mod ecg;
mod wrap;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use sensorkit_types::{Processing, RawSample, SafeSample, SampleKind, Sensor};

pub use ecg::EcgSessionProcessor;
pub use wrap::{PassThroughProcessor, WrapProcessor};

/// Errors raised while processing raw samples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProcessingError {
    /// A sample of the wrong kind for the sensor.
    #[error("unexpected {found:?} sample, expected {expected:?}")]
    UnexpectedSample {
        expected: SampleKind,
        found: SampleKind,
    },

    /// Fragments of one session disagree on a property that must be shared.
    #[error("session {session} has inconsistent {field}")]
    InconsistentSession { session: Uuid, field: &'static str },

    /// Session data is not in strictly increasing time order.
    #[error("session {session} has out-of-order data at {at}")]
    OutOfOrder { session: Uuid, at: OffsetDateTime },
}

/// Turns one fetch's worth of `(framework timestamp, raw sample)` pairs into
/// safe samples.
///
/// Processors are shared across tasks and must not keep per-call state.
pub trait SampleProcessor: Send + Sync {
    fn process(
        &self,
        sensor: Sensor,
        samples: &mut dyn Iterator<Item = (OffsetDateTime, RawSample)>,
    ) -> Result<Vec<SafeSample>, ProcessingError>;
}

/// The processor implementing a built-in strategy.
#[must_use]
pub fn builtin(processing: Processing) -> Arc<dyn SampleProcessor> {
    match processing {
        Processing::Wrap => Arc::new(WrapProcessor),
        Processing::PassThrough => Arc::new(PassThroughProcessor),
        Processing::EcgSession => Arc::new(EcgSessionProcessor),
    }
}

/// Check that `sample` belongs to `sensor`.
pub(crate) fn expect_kind(sensor: Sensor, sample: &RawSample) -> Result<(), ProcessingError> {
    let expected = sensor.descriptor().sample_kind;
    let found = sample.kind();
    if expected == found {
        Ok(())
    } else {
        Err(ProcessingError::UnexpectedSample { expected, found })
    }
}

/// Per-sensor processor registry.
#[derive(Clone, Default)]
pub struct Processors {
    overrides: HashMap<Sensor, Arc<dyn SampleProcessor>>,
}

impl Processors {
    /// Registry using the catalog defaults for every sensor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the processor for one sensor.
    #[must_use]
    pub fn with(mut self, sensor: Sensor, processor: Arc<dyn SampleProcessor>) -> Self {
        self.overrides.insert(sensor, processor);
        self
    }

    /// The processor bound to `sensor`.
    #[must_use]
    pub fn get(&self, sensor: Sensor) -> Arc<dyn SampleProcessor> {
        match self.overrides.get(&sensor) {
            Some(processor) => Arc::clone(processor),
            None => builtin(sensor.descriptor().processing),
        }
    }

    #[must_use]
    pub fn is_overridden(&self, sensor: Sensor) -> bool {
        self.overrides.contains_key(&sensor)
    }
}

impl std::fmt::Debug for Processors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processors")
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}
