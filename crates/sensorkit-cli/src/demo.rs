//! Simulated sensor host.
//!
//! Sample values are derived from the configured seed and each sample's
//! timestamp, so separate invocations see the same history.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use sensorkit_core::MockHost;
use sensorkit_types::{
    AmbientLightSample, DeviceUsageSample, EcgFragment, EcgStage, EcgVoltageBatch,
    HeartRateSample, LightPlacement, MotionSample, OnWristSample, PedometerSample,
    PressureSample, RawFetchResult, RawSample, Scalar, VisitCategory, VisitSample,
};
use sensorkit_types::{Device, Sensor, TimeRange};

use crate::config::DemoConfig;

/// Product type of the simulated watch.
pub const WATCH: &str = "Watch6,1";
/// Product type of the simulated phone.
pub const PHONE: &str = "iPhone14,2";

fn watch() -> Device {
    Device::builder()
        .model("Apple Watch")
        .name("Demo Watch")
        .system_name("watchOS")
        .system_version("11.0")
        .product_type(WATCH)
        .build()
}

fn phone() -> Device {
    Device::builder()
        .model("iPhone")
        .name("Demo Phone")
        .system_name("iOS")
        .system_version("18.0")
        .product_type(PHONE)
        .build()
}

/// Devices that record `sensor` in the simulation.
pub fn devices_for(sensor: Sensor) -> Vec<Device> {
    match sensor {
        Sensor::AmbientLight
        | Sensor::RotationRate
        | Sensor::HeartRate
        | Sensor::OnWristState
        | Sensor::Electrocardiogram => vec![watch()],
        Sensor::Accelerometer | Sensor::AmbientPressure | Sensor::Pedometer => {
            vec![watch(), phone()]
        }
        Sensor::DeviceUsage | Sensor::Visits => vec![phone()],
    }
}

/// Build a host holding `config.days` of generated history ending at `now`.
pub fn simulated_host(config: &DemoConfig, now: OffsetDateTime) -> Result<MockHost> {
    let mut builder = MockHost::builder().grant_on_request(true);

    for id in &config.denied {
        let sensor: Sensor = id
            .parse()
            .with_context(|| format!("Invalid [demo] denied entry '{id}'"))?;
        builder = builder.denied(sensor);
    }

    let start = now
        .checked_sub(Duration::days(config.days.into()))
        .with_context(|| format!("[demo] days = {} reaches past representable time", config.days))?;
    let history = History {
        seed: config.seed,
        start,
        end: now,
    };
    for sensor in Sensor::ALL {
        for device in devices_for(sensor) {
            let results = history.generate(sensor, &device.product_type)?;
            builder = builder
                .results(sensor, &device.product_type, results)
                .device(sensor, device);
        }
    }

    if config.shuffle {
        builder = builder.shuffle_seed(config.seed);
    }
    Ok(builder.build())
}

struct History {
    seed: u64,
    start: OffsetDateTime,
    end: OffsetDateTime,
}

impl History {
    /// Instants `offset + k * step` inside `[start, end)`.
    fn grid(&self, step: Duration, offset: Duration) -> impl Iterator<Item = OffsetDateTime> {
        let step_seconds = step.whole_seconds();
        let first = (self.start - offset).unix_timestamp().div_euclid(step_seconds) + 1;
        let first = OffsetDateTime::UNIX_EPOCH + Duration::seconds(first * step_seconds) + offset;
        let end = self.end;
        std::iter::successors(Some(first), move |at| Some(*at + step))
            .take_while(move |at| *at < end)
    }

    fn rng(&self, sensor: Sensor, product_type: &str, at: OffsetDateTime) -> StdRng {
        let stream = product_type
            .bytes()
            .fold(sensor as u64 + 1, |acc, b| {
                acc.wrapping_mul(31).wrapping_add(u64::from(b))
            });
        StdRng::seed_from_u64(self.seed ^ stream.rotate_left(32) ^ at.unix_timestamp() as u64)
    }

    fn each<F>(
        &self,
        sensor: Sensor,
        product_type: &str,
        step: Duration,
        offset: Duration,
        mut make: F,
    ) -> Result<Vec<RawFetchResult>>
    where
        F: FnMut(OffsetDateTime, &mut StdRng) -> Result<Vec<RawFetchResult>>,
    {
        let mut results = Vec::new();
        for at in self.grid(step, offset) {
            let mut rng = self.rng(sensor, product_type, at);
            results.extend(make(at, &mut rng)?);
        }
        Ok(results)
    }

    fn generate(&self, sensor: Sensor, product_type: &str) -> Result<Vec<RawFetchResult>> {
        let none = Duration::ZERO;
        match sensor {
            Sensor::AmbientLight => {
                self.each(sensor, product_type, Duration::minutes(15), none, |at, rng| {
                    let sample = AmbientLightSample {
                        lux: Scalar(rng.random_range(0.0..1500.0)),
                        placement: LightPlacement::FrontTop,
                        chromaticity: (
                            Scalar(rng.random_range(0.28..0.36)),
                            Scalar(rng.random_range(0.29..0.37)),
                        ),
                    };
                    Ok(vec![RawFetchResult::single(at, RawSample::AmbientLight(sample))])
                })
            }
            Sensor::Accelerometer | Sensor::RotationRate => {
                self.each(sensor, product_type, Duration::minutes(10), none, |at, rng| {
                    let samples = (0..5)
                        .map(|_| {
                            RawSample::Motion(MotionSample {
                                x: Scalar(rng.random_range(-1.0..1.0)),
                                y: Scalar(rng.random_range(-1.0..1.0)),
                                z: Scalar(rng.random_range(-1.0..1.0)),
                            })
                        })
                        .collect();
                    Ok(vec![RawFetchResult::new(at, samples)])
                })
            }
            Sensor::AmbientPressure => {
                self.each(sensor, product_type, Duration::minutes(10), none, |at, rng| {
                    let samples = (0..5)
                        .map(|_| {
                            RawSample::Pressure(PressureSample {
                                pressure: Scalar(rng.random_range(990.0..1030.0)),
                                temperature: Scalar(rng.random_range(15.0..30.0)),
                            })
                        })
                        .collect();
                    Ok(vec![RawFetchResult::new(at, samples)])
                })
            }
            Sensor::HeartRate => {
                self.each(sensor, product_type, Duration::minutes(15), none, |at, rng| {
                    let sample = HeartRateSample {
                        beats_per_minute: Scalar(rng.random_range(55.0..110.0)),
                        confidence: Scalar(rng.random_range(0.5..1.0)),
                    };
                    Ok(vec![RawFetchResult::single(at, RawSample::HeartRate(sample))])
                })
            }
            Sensor::Pedometer => self.each(sensor, product_type, Duration::hours(1), none, |at, rng| {
                let steps = rng.random_range(0..2500);
                let sample = PedometerSample {
                    span: TimeRange::starting_at(at, Duration::hours(1))?,
                    steps,
                    distance: Scalar(steps as f64 * 0.75),
                    floors_ascended: rng.random_range(0..5),
                    floors_descended: rng.random_range(0..5),
                };
                Ok(vec![RawFetchResult::single(at, RawSample::Pedometer(sample))])
            }),
            Sensor::OnWristState => {
                self.each(sensor, product_type, Duration::hours(1), none, |at, rng| {
                    let sample = OnWristSample {
                        on_wrist: rng.random_bool(0.8),
                        wrist_detection_enabled: true,
                    };
                    Ok(vec![RawFetchResult::single(at, RawSample::OnWrist(sample))])
                })
            }
            Sensor::DeviceUsage => {
                self.each(sensor, product_type, Duration::hours(6), none, |at, rng| {
                    let sample = DeviceUsageSample {
                        span: TimeRange::starting_at(at, Duration::hours(6))?,
                        unlocks: rng.random_range(0..40),
                        screen_wakes: rng.random_range(0..80),
                        total_screen_time: Duration::minutes(rng.random_range(5..180)),
                    };
                    Ok(vec![RawFetchResult::single(at, RawSample::DeviceUsage(sample))])
                })
            }
            Sensor::Visits => self.each(
                sensor,
                product_type,
                Duration::hours(12),
                Duration::hours(8),
                |at, rng| {
                    let category = match rng.random_range(0..4) {
                        0 => VisitCategory::Home,
                        1 => VisitCategory::Work,
                        2 => VisitCategory::Gym,
                        _ => VisitCategory::Unknown,
                    };
                    let sample = VisitSample {
                        id: Uuid::from_u64_pair(rng.random(), rng.random()),
                        span: TimeRange::starting_at(at, Duration::minutes(rng.random_range(20..240)))?,
                        distance_from_home: Scalar(rng.random_range(0.0..25_000.0)),
                        category,
                    };
                    Ok(vec![RawFetchResult::single(at, RawSample::Visit(sample))])
                },
            ),
            Sensor::Electrocardiogram => self.each(
                sensor,
                product_type,
                Duration::days(1),
                Duration::hours(9),
                |at, rng| Ok(ecg_session(at, rng)),
            ),
        }
    }
}

/// One thirty-second recording: a begin fragment, two active fragments
/// carrying voltages, and an end fragment.
fn ecg_session(start: OffsetDateTime, rng: &mut StdRng) -> Vec<RawFetchResult> {
    let session_id = Uuid::from_u64_pair(rng.random(), rng.random());
    let mut fragment = |stage: EcgStage, batch_ms: &[i64]| {
        RawSample::EcgFragment(EcgFragment {
            session_id,
            stage,
            frequency: Scalar(512.0),
            lead: 1,
            batches: batch_ms
                .iter()
                .map(|&ms| EcgVoltageBatch {
                    timestamp: start + Duration::milliseconds(ms),
                    voltages: (0..4).map(|_| Scalar(rng.random_range(-500.0..500.0))).collect(),
                })
                .collect(),
        })
    };

    vec![
        RawFetchResult::single(start, fragment(EcgStage::Begin, &[])),
        RawFetchResult::single(
            start + Duration::seconds(10),
            fragment(EcgStage::Active, &[0, 250, 500, 750]),
        ),
        RawFetchResult::single(
            start + Duration::seconds(20),
            fragment(EcgStage::Active, &[1000, 1250, 1500]),
        ),
        RawFetchResult::single(start + Duration::seconds(30), fragment(EcgStage::End, &[])),
    ]
}
