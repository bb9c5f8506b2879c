//! Safe representations handed to callers.
//!
//! Every value here is immutable, `Eq + Hash` and `Send + Sync`, so processed
//! batches can cross threads and be deduplicated freely.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::range::TimeRange;
use crate::sample::{
    AmbientLightSample, DeviceUsageSample, HeartRateSample, MotionSample, OnWristSample,
    PedometerSample, PressureSample, RawSample, Scalar, VisitSample,
};

/// A raw sample paired with the framework timestamp of its result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimestampedSample {
    timestamp: OffsetDateTime,
    sample: RawSample,
}

impl TimestampedSample {
    pub fn new(timestamp: OffsetDateTime, sample: RawSample) -> Self {
        Self { timestamp, sample }
    }

    #[must_use]
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    #[must_use]
    pub fn sample(&self) -> &RawSample {
        &self.sample
    }

    #[must_use]
    pub fn ambient_light(&self) -> Option<&AmbientLightSample> {
        match &self.sample {
            RawSample::AmbientLight(sample) => Some(sample),
            _ => None,
        }
    }

    #[must_use]
    pub fn motion(&self) -> Option<&MotionSample> {
        match &self.sample {
            RawSample::Motion(sample) => Some(sample),
            _ => None,
        }
    }

    #[must_use]
    pub fn pressure(&self) -> Option<&PressureSample> {
        match &self.sample {
            RawSample::Pressure(sample) => Some(sample),
            _ => None,
        }
    }

    #[must_use]
    pub fn heart_rate(&self) -> Option<&HeartRateSample> {
        match &self.sample {
            RawSample::HeartRate(sample) => Some(sample),
            _ => None,
        }
    }

    #[must_use]
    pub fn on_wrist(&self) -> Option<&OnWristSample> {
        match &self.sample {
            RawSample::OnWrist(sample) => Some(sample),
            _ => None,
        }
    }
}

/// Voltages at a fixed offset from the session start.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EcgBatch {
    pub offset: Duration,
    pub voltages: Vec<Scalar>,
}

/// A reassembled electrocardiogram recording.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EcgSession {
    pub id: Uuid,
    pub start: OffsetDateTime,
    /// Timestamp of the end fragment, if the host delivered one.
    pub end: Option<OffsetDateTime>,
    /// Sampling frequency in Hz.
    pub frequency: Scalar,
    pub lead: u8,
    /// Batches in strictly increasing offset order.
    pub batches: Vec<EcgBatch>,
}

impl EcgSession {
    /// Total number of voltage values across all batches.
    #[must_use]
    pub fn voltage_count(&self) -> usize {
        self.batches.iter().map(|batch| batch.voltages.len()).sum()
    }
}

/// When a safe sample happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleTime {
    Instant(OffsetDateTime),
    Span(TimeRange),
}

impl SampleTime {
    /// The instant the sample starts at.
    #[must_use]
    pub fn start(self) -> OffsetDateTime {
        match self {
            SampleTime::Instant(instant) => instant,
            SampleTime::Span(span) => span.start(),
        }
    }
}

/// A processed sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum SafeSample {
    Timestamped(TimestampedSample),
    Pedometer(PedometerSample),
    DeviceUsage(DeviceUsageSample),
    Visit(VisitSample),
    EcgSession(EcgSession),
}

impl SafeSample {
    /// Timing carried by the sample.
    #[must_use]
    pub fn time(&self) -> SampleTime {
        match self {
            SafeSample::Timestamped(sample) => SampleTime::Instant(sample.timestamp()),
            SafeSample::Pedometer(sample) => SampleTime::Span(sample.span),
            SafeSample::DeviceUsage(sample) => SampleTime::Span(sample.span),
            SafeSample::Visit(sample) => SampleTime::Span(sample.span),
            SafeSample::EcgSession(session) => session
                .end
                .and_then(|end| TimeRange::new(session.start, end).ok())
                .map_or(SampleTime::Instant(session.start), SampleTime::Span),
        }
    }

    /// Start instant of the sample; used to compute batch sample spans.
    #[must_use]
    pub fn start(&self) -> OffsetDateTime {
        self.time().start()
    }
}
