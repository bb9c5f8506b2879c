//! Static sensor catalog.
//!
//! Every sensor the host data store can serve is a variant of the closed
//! [`Sensor`] enum. Its [`SensorDescriptor`] is a compile-time constant, so the
//! catalog cannot be extended or mutated at runtime.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::{ParseError, ParseResult};

/// How the anchored fetcher slices history into batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BatchPolicy {
    /// Emit a batch once at least this many raw samples are pending.
    ByCount(usize),
    /// Emit one batch per fixed span of time.
    ByTime(Duration),
}

impl BatchPolicy {
    /// One batch per two hours of data (the catalog default).
    pub const EVERY_TWO_HOURS: Self = Self::ByTime(Duration::hours(2));

    /// One batch per day of data.
    pub const DAILY: Self = Self::ByTime(Duration::days(1));

    /// Reject policies that could never advance the anchor.
    ///
    /// ```
    /// use sensorkit_types::BatchPolicy;
    /// use time::Duration;
    ///
    /// assert!(BatchPolicy::ByCount(100).validate().is_ok());
    /// assert!(BatchPolicy::ByCount(0).validate().is_err());
    /// assert!(BatchPolicy::ByTime(Duration::ZERO).validate().is_err());
    /// ```
    pub fn validate(&self) -> ParseResult<()> {
        match self {
            BatchPolicy::ByCount(0) => Err(ParseError::InvalidBatchPolicy(
                "sample count must be at least 1".to_string(),
            )),
            BatchPolicy::ByTime(span) if !span.is_positive() => Err(
                ParseError::InvalidBatchPolicy(format!("interval must be positive, got {span}")),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for BatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchPolicy::ByCount(count) => write!(f, "every {count} samples"),
            BatchPolicy::ByTime(span) => write!(f, "every {span}"),
        }
    }
}

/// Whether one host result unit carries a single sample or an array of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResultShape {
    /// One sample per result.
    Single,
    /// A variable-length array of samples per result.
    Array,
}

/// The raw sample variant a sensor produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum SampleKind {
    AmbientLight,
    Motion,
    Pressure,
    HeartRate,
    Pedometer,
    OnWrist,
    DeviceUsage,
    Visit,
    EcgFragment,
}

/// Built-in strategy used to turn raw samples into safe representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Processing {
    /// Pair each sample with its framework timestamp.
    Wrap,
    /// The sample already carries its own time span and is kept as-is.
    PassThrough,
    /// Reassemble multi-fragment electrocardiogram sessions.
    EcgSession,
}

/// Sensors known to the catalog.
///
/// This enum is the only way to name a sensor; descriptors are looked up with
/// [`Sensor::descriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Sensor {
    #[cfg_attr(feature = "serde", serde(rename = "ambientLightSensor"))]
    AmbientLight,
    #[cfg_attr(feature = "serde", serde(rename = "accelerometer"))]
    Accelerometer,
    #[cfg_attr(feature = "serde", serde(rename = "rotationRate"))]
    RotationRate,
    #[cfg_attr(feature = "serde", serde(rename = "ambientPressure"))]
    AmbientPressure,
    #[cfg_attr(feature = "serde", serde(rename = "heartRate"))]
    HeartRate,
    #[cfg_attr(feature = "serde", serde(rename = "pedometerData"))]
    Pedometer,
    #[cfg_attr(feature = "serde", serde(rename = "onWristState"))]
    OnWristState,
    #[cfg_attr(feature = "serde", serde(rename = "deviceUsageReport"))]
    DeviceUsage,
    #[cfg_attr(feature = "serde", serde(rename = "visits"))]
    Visits,
    #[cfg_attr(feature = "serde", serde(rename = "electrocardiogram"))]
    Electrocardiogram,
}

/// Immutable description of one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDescriptor {
    /// The sensor this descriptor belongs to.
    pub sensor: Sensor,
    /// Stable identifier, also used in checkpoint keys.
    pub id: &'static str,
    /// Human-readable name.
    pub display_name: &'static str,
    /// Trailing window during which the host withholds data.
    pub quarantine: Duration,
    /// Suggested batching for anchored fetches.
    pub batch_policy: BatchPolicy,
    /// Samples per host result unit.
    pub result_shape: ResultShape,
    /// Raw sample variant produced by this sensor.
    pub sample_kind: SampleKind,
    /// Built-in processing strategy.
    pub processing: Processing,
}

/// Quarantine applied by the host to every sensor in the catalog.
pub const DEFAULT_QUARANTINE: Duration = Duration::hours(24);

const fn entry(
    sensor: Sensor,
    id: &'static str,
    display_name: &'static str,
    batch_policy: BatchPolicy,
    result_shape: ResultShape,
    sample_kind: SampleKind,
    processing: Processing,
) -> SensorDescriptor {
    SensorDescriptor {
        sensor,
        id,
        display_name,
        quarantine: DEFAULT_QUARANTINE,
        batch_policy,
        result_shape,
        sample_kind,
        processing,
    }
}

// Indexed by `Sensor as usize`; the order must match the enum.
static CATALOG: [SensorDescriptor; Sensor::COUNT] = [
    entry(
        Sensor::AmbientLight,
        "ambientLightSensor",
        "Ambient Light",
        BatchPolicy::EVERY_TWO_HOURS,
        ResultShape::Single,
        SampleKind::AmbientLight,
        Processing::Wrap,
    ),
    entry(
        Sensor::Accelerometer,
        "accelerometer",
        "Accelerometer",
        BatchPolicy::EVERY_TWO_HOURS,
        ResultShape::Array,
        SampleKind::Motion,
        Processing::Wrap,
    ),
    entry(
        Sensor::RotationRate,
        "rotationRate",
        "Rotation Rate",
        BatchPolicy::EVERY_TWO_HOURS,
        ResultShape::Array,
        SampleKind::Motion,
        Processing::Wrap,
    ),
    entry(
        Sensor::AmbientPressure,
        "ambientPressure",
        "Ambient Pressure",
        BatchPolicy::EVERY_TWO_HOURS,
        ResultShape::Array,
        SampleKind::Pressure,
        Processing::Wrap,
    ),
    entry(
        Sensor::HeartRate,
        "heartRate",
        "Heart Rate",
        BatchPolicy::EVERY_TWO_HOURS,
        ResultShape::Single,
        SampleKind::HeartRate,
        Processing::Wrap,
    ),
    entry(
        Sensor::Pedometer,
        "pedometerData",
        "Pedometer",
        BatchPolicy::EVERY_TWO_HOURS,
        ResultShape::Single,
        SampleKind::Pedometer,
        Processing::PassThrough,
    ),
    entry(
        Sensor::OnWristState,
        "onWristState",
        "On-Wrist State",
        BatchPolicy::DAILY,
        ResultShape::Single,
        SampleKind::OnWrist,
        Processing::Wrap,
    ),
    entry(
        Sensor::DeviceUsage,
        "deviceUsageReport",
        "Device Usage",
        BatchPolicy::DAILY,
        ResultShape::Single,
        SampleKind::DeviceUsage,
        Processing::PassThrough,
    ),
    entry(
        Sensor::Visits,
        "visits",
        "Visits",
        BatchPolicy::DAILY,
        ResultShape::Single,
        SampleKind::Visit,
        Processing::PassThrough,
    ),
    entry(
        Sensor::Electrocardiogram,
        "electrocardiogram",
        "Electrocardiogram",
        BatchPolicy::DAILY,
        ResultShape::Single,
        SampleKind::EcgFragment,
        Processing::EcgSession,
    ),
];

impl Sensor {
    /// Number of sensors in the catalog.
    pub const COUNT: usize = 10;

    /// Every sensor, in catalog order.
    pub const ALL: [Sensor; Sensor::COUNT] = [
        Sensor::AmbientLight,
        Sensor::Accelerometer,
        Sensor::RotationRate,
        Sensor::AmbientPressure,
        Sensor::HeartRate,
        Sensor::Pedometer,
        Sensor::OnWristState,
        Sensor::DeviceUsage,
        Sensor::Visits,
        Sensor::Electrocardiogram,
    ];

    /// The static descriptor for this sensor.
    #[must_use]
    pub fn descriptor(self) -> &'static SensorDescriptor {
        &CATALOG[self as usize]
    }

    /// Stable identifier.
    #[must_use]
    pub fn id(self) -> &'static str {
        self.descriptor().id
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        self.descriptor().display_name
    }

    /// Look a sensor up by its stable identifier.
    ///
    /// ```
    /// use sensorkit_types::Sensor;
    ///
    /// assert_eq!(Sensor::from_id("heartRate"), Some(Sensor::HeartRate));
    /// assert_eq!(Sensor::from_id("HeartRate"), None);
    /// ```
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sensor| sensor.id() == id)
    }
}

impl FromStr for Sensor {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s.trim()).ok_or_else(|| ParseError::UnknownSensor(s.to_string()))
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl SensorDescriptor {
    /// The newest instant the host will serve data for, as of `now`.
    #[must_use]
    pub fn quarantine_cutoff_at(&self, now: OffsetDateTime) -> OffsetDateTime {
        now.saturating_sub(self.quarantine)
    }

    /// The newest instant the host will serve data for, right now.
    ///
    /// The boundary moves with the wall clock, so it is recomputed on every
    /// call rather than cached.
    #[must_use]
    pub fn quarantine_cutoff(&self) -> OffsetDateTime {
        self.quarantine_cutoff_at(OffsetDateTime::now_utc())
    }
}
