//! Raw sensor samples as copied out of host callbacks.
//!
//! The host hands out borrowed views that are only valid for the duration of
//! a callback. [`RawBatch`] models that borrow; [`RawBatch::to_fetch_result`] is the
//! copy the fetch operation makes before returning from the callback.

use core::fmt;
use core::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::range::TimeRange;
use crate::sensor::SampleKind;

/// A floating-point measurement with bitwise equality and hashing.
///
/// Sensor values are never NaN in practice; comparing bit patterns keeps the
/// safe representations `Eq + Hash` without pulling in an ordered-float crate.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Scalar(pub f64);

impl Scalar {
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar(value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Where the light sensor sits relative to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LightPlacement {
    Unknown,
    FrontTop,
    FrontBottom,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AmbientLightSample {
    pub lux: Scalar,
    pub placement: LightPlacement,
    /// CIE 1931 chromaticity `(x, y)`.
    pub chromaticity: (Scalar, Scalar),
}

/// Three-axis motion reading (acceleration in g or rotation in rad/s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotionSample {
    pub x: Scalar,
    pub y: Scalar,
    pub z: Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PressureSample {
    /// Pressure in hPa.
    pub pressure: Scalar,
    /// Temperature in degrees Celsius.
    pub temperature: Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeartRateSample {
    pub beats_per_minute: Scalar,
    pub confidence: Scalar,
}

/// Step counts over a time span; carries its own timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PedometerSample {
    pub span: TimeRange,
    pub steps: u64,
    /// Distance in meters.
    pub distance: Scalar,
    pub floors_ascended: u32,
    pub floors_descended: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OnWristSample {
    pub on_wrist: bool,
    pub wrist_detection_enabled: bool,
}

/// Aggregated device usage over a reporting span; carries its own timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceUsageSample {
    pub span: TimeRange,
    pub unlocks: u32,
    pub screen_wakes: u32,
    pub total_screen_time: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VisitCategory {
    Unknown,
    Home,
    Work,
    School,
    Gym,
}

/// A visit to a significant location; carries its own timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VisitSample {
    pub id: Uuid,
    pub span: TimeRange,
    /// Distance from home in meters.
    pub distance_from_home: Scalar,
    pub category: VisitCategory,
}

/// Position of an electrocardiogram fragment within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EcgStage {
    Begin,
    Active,
    End,
}

/// Voltages recorded at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EcgVoltageBatch {
    pub timestamp: OffsetDateTime,
    /// Microvolts.
    pub voltages: Vec<Scalar>,
}

/// One fragment of an electrocardiogram session.
///
/// A session arrives as a `Begin` fragment, one or more `Active` fragments
/// carrying voltage batches, and optionally an `End` fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EcgFragment {
    pub session_id: Uuid,
    pub stage: EcgStage,
    /// Sampling frequency in Hz.
    pub frequency: Scalar,
    /// Lead identifier.
    pub lead: u8,
    pub batches: Vec<EcgVoltageBatch>,
}

/// A single raw sample as copied from a host result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "value"))]
pub enum RawSample {
    AmbientLight(AmbientLightSample),
    Motion(MotionSample),
    Pressure(PressureSample),
    HeartRate(HeartRateSample),
    Pedometer(PedometerSample),
    OnWrist(OnWristSample),
    DeviceUsage(DeviceUsageSample),
    Visit(VisitSample),
    EcgFragment(EcgFragment),
}

impl RawSample {
    /// The catalog kind this sample belongs to.
    #[must_use]
    pub fn kind(&self) -> SampleKind {
        match self {
            RawSample::AmbientLight(_) => SampleKind::AmbientLight,
            RawSample::Motion(_) => SampleKind::Motion,
            RawSample::Pressure(_) => SampleKind::Pressure,
            RawSample::HeartRate(_) => SampleKind::HeartRate,
            RawSample::Pedometer(_) => SampleKind::Pedometer,
            RawSample::OnWrist(_) => SampleKind::OnWrist,
            RawSample::DeviceUsage(_) => SampleKind::DeviceUsage,
            RawSample::Visit(_) => SampleKind::Visit,
            RawSample::EcgFragment(_) => SampleKind::EcgFragment,
        }
    }

    /// The time span carried by the sample itself, for kinds that have one.
    #[must_use]
    pub fn own_span(&self) -> Option<TimeRange> {
        match self {
            RawSample::Pedometer(sample) => Some(sample.span),
            RawSample::DeviceUsage(sample) => Some(sample.span),
            RawSample::Visit(sample) => Some(sample.span),
            _ => None,
        }
    }
}

/// One host result unit, owned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawFetchResult {
    /// Framework timestamp assigned by the host.
    pub timestamp: OffsetDateTime,
    /// One sample for single-shaped sensors, zero or more for array-shaped.
    pub samples: Vec<RawSample>,
}

impl RawFetchResult {
    pub fn new(timestamp: OffsetDateTime, samples: Vec<RawSample>) -> Self {
        Self { timestamp, samples }
    }

    pub fn single(timestamp: OffsetDateTime, sample: RawSample) -> Self {
        Self {
            timestamp,
            samples: vec![sample],
        }
    }
}

/// Borrowed view of one host result, valid only during a delegate callback.
#[derive(Debug, Clone, Copy)]
pub struct RawBatch<'a> {
    pub timestamp: OffsetDateTime,
    pub samples: &'a [RawSample],
}

impl<'a> RawBatch<'a> {
    pub fn new(timestamp: OffsetDateTime, samples: &'a [RawSample]) -> Self {
        Self { timestamp, samples }
    }

    /// Copy the view into an owned result.
    #[must_use]
    pub fn to_fetch_result(&self) -> RawFetchResult {
        RawFetchResult {
            timestamp: self.timestamp,
            samples: self.samples.to_vec(),
        }
    }
}

impl<'a> From<&'a RawFetchResult> for RawBatch<'a> {
    fn from(result: &'a RawFetchResult) -> Self {
        RawBatch::new(result.timestamp, &result.samples)
    }
}
