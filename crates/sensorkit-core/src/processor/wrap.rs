use time::OffsetDateTime;

use sensorkit_types::{RawSample, SafeSample, Sensor, TimestampedSample};

use super::{ProcessingError, SampleProcessor, expect_kind};

/// Pairs every sample with its framework timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct WrapProcessor;

impl SampleProcessor for WrapProcessor {
    fn process(
        &self,
        sensor: Sensor,
        samples: &mut dyn Iterator<Item = (OffsetDateTime, RawSample)>,
    ) -> Result<Vec<SafeSample>, ProcessingError> {
        samples
            .map(|(timestamp, sample)| {
                expect_kind(sensor, &sample)?;
                Ok(SafeSample::Timestamped(TimestampedSample::new(
                    timestamp, sample,
                )))
            })
            .collect()
    }
}

/// Keeps samples that already carry their own time span.
///
/// The framework timestamp is discarded; the sample's span is authoritative.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughProcessor;

impl SampleProcessor for PassThroughProcessor {
    fn process(
        &self,
        sensor: Sensor,
        samples: &mut dyn Iterator<Item = (OffsetDateTime, RawSample)>,
    ) -> Result<Vec<SafeSample>, ProcessingError> {
        samples
            .map(|(_, sample)| {
                expect_kind(sensor, &sample)?;
                match sample {
                    RawSample::Pedometer(sample) => Ok(SafeSample::Pedometer(sample)),
                    RawSample::DeviceUsage(sample) => Ok(SafeSample::DeviceUsage(sample)),
                    RawSample::Visit(sample) => Ok(SafeSample::Visit(sample)),
                    other => Err(ProcessingError::UnexpectedSample {
                        expected: sensor.descriptor().sample_kind,
                        found: other.kind(),
                    }),
                }
            })
            .collect()
    }
}
