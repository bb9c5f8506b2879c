//! Output formatting for text and JSON output.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use sensorkit_core::{Batch, BatchInfo, SampleSpan};
use sensorkit_store::StoredAnchor;
use sensorkit_types::{Checkpoint, Device, RawSample, SafeSample, Sensor, TimeRange};

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    /// Bold heading, or plain text when colors are off.
    pub fn heading(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.bold().to_string()
        }
    }

    /// Dimmed secondary text.
    pub fn dim(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.dimmed().to_string()
        }
    }

    /// Highlighted count.
    pub fn count(&self, value: usize) -> String {
        if self.no_color {
            value.to_string()
        } else {
            value.green().to_string()
        }
    }
}

/// Pretty-print a JSON value, with a trailing newline.
pub fn to_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)? + "\n")
}

pub fn instant(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

pub fn range(range: &TimeRange) -> String {
    format!("{} .. {}", instant(range.start()), instant(range.end()))
}

pub fn checkpoint_json(checkpoint: Checkpoint) -> Value {
    match checkpoint.instant() {
        Some(at) => json!(instant(at)),
        None => Value::Null,
    }
}

pub fn range_json(range: &TimeRange) -> Value {
    json!({ "start": instant(range.start()), "end": instant(range.end()) })
}

fn span_json(span: &SampleSpan) -> Value {
    json!({ "earliest": instant(span.earliest), "latest": instant(span.latest) })
}

pub fn device_json(device: &Device) -> Value {
    json!({
        "product_type": device.product_type,
        "name": device.name,
        "model": device.model,
        "system_name": device.system_name,
        "system_version": device.system_version,
    })
}

pub fn batch_info_json(info: &BatchInfo, samples: usize) -> Value {
    json!({
        "device": info.device.product_type,
        "range": range_json(&info.range),
        "samples_span": info.samples_span.as_ref().map(span_json),
        "policy": info.policy.to_string(),
        "samples": samples,
    })
}

pub fn batch_text(batch: &Batch, opts: &FormatOptions) -> String {
    let span = batch
        .info
        .samples_span
        .as_ref()
        .map_or_else(
            || "no samples".to_string(),
            |span| format!("{} ..= {}", instant(span.earliest), instant(span.latest)),
        );
    format!(
        "{}  {}  {} samples  {}",
        batch.info.device.product_type,
        range(&batch.info.range),
        opts.count(batch.samples.len()),
        opts.dim(&format!("[{span}]")),
    )
}

pub fn anchor_json(anchor: &StoredAnchor, prefix: &str) -> Value {
    json!({
        "key": anchor.key,
        "suffix": anchor.suffix(prefix),
        "checkpoint": checkpoint_json(anchor.checkpoint),
        "updated_at": instant(anchor.updated_at),
    })
}

/// One-line summary of a raw sample.
pub fn raw_sample_text(sample: &RawSample) -> String {
    match sample {
        RawSample::AmbientLight(s) => format!("{:.1} lux", s.lux.value()),
        RawSample::Motion(s) => format!(
            "x={:+.3} y={:+.3} z={:+.3}",
            s.x.value(),
            s.y.value(),
            s.z.value()
        ),
        RawSample::Pressure(s) => format!(
            "{:.1} hPa, {:.1} °C",
            s.pressure.value(),
            s.temperature.value()
        ),
        RawSample::HeartRate(s) => format!(
            "{:.0} bpm (confidence {:.2})",
            s.beats_per_minute.value(),
            s.confidence.value()
        ),
        RawSample::Pedometer(s) => format!("{} steps over {}", s.steps, range(&s.span)),
        RawSample::OnWrist(s) => {
            if s.on_wrist {
                "on wrist".to_string()
            } else {
                "off wrist".to_string()
            }
        }
        RawSample::DeviceUsage(s) => format!(
            "{} unlocks, {} wakes, screen time {}",
            s.unlocks, s.screen_wakes, s.total_screen_time
        ),
        RawSample::Visit(s) => format!(
            "{:?} visit, {:.0} m from home",
            s.category,
            s.distance_from_home.value()
        ),
        RawSample::EcgFragment(s) => format!(
            "ECG {:?} fragment of {}, {} voltage batches",
            s.stage,
            s.session_id,
            s.batches.len()
        ),
    }
}

/// One-line summary of a processed sample.
pub fn safe_sample_text(sample: &SafeSample) -> String {
    match sample {
        SafeSample::Timestamped(s) => {
            format!("{}  {}", instant(s.timestamp()), raw_sample_text(s.sample()))
        }
        SafeSample::Pedometer(s) => raw_sample_text(&RawSample::Pedometer(*s)),
        SafeSample::DeviceUsage(s) => format!(
            "{}  {}",
            range(&s.span),
            raw_sample_text(&RawSample::DeviceUsage(*s))
        ),
        SafeSample::Visit(s) => format!(
            "{}  {}",
            range(&s.span),
            raw_sample_text(&RawSample::Visit(*s))
        ),
        SafeSample::EcgSession(s) => format!(
            "{}  ECG session {} ({} voltages at {} Hz)",
            instant(s.start),
            s.id,
            s.voltage_count(),
            s.frequency
        ),
    }
}

pub fn sensor_json(sensor: Sensor, policy: String, cutoff: OffsetDateTime) -> Value {
    let descriptor = sensor.descriptor();
    json!({
        "id": descriptor.id,
        "name": descriptor.display_name,
        "shape": format!("{:?}", descriptor.result_shape),
        "processing": format!("{:?}", descriptor.processing),
        "batch_policy": policy,
        "quarantine_hours": descriptor.quarantine.whole_hours(),
        "cutoff": instant(cutoff),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorkit_types::{HeartRateSample, OnWristSample, Scalar};
    use time::macros::datetime;

    #[test]
    fn test_instant_is_rfc3339() {
        assert_eq!(
            instant(datetime!(2025-03-01 12:30:00 UTC)),
            "2025-03-01T12:30:00Z"
        );
    }

    #[test]
    fn test_checkpoint_json() {
        assert_eq!(checkpoint_json(Checkpoint::DistantPast), Value::Null);
        assert_eq!(
            checkpoint_json(Checkpoint::At(datetime!(2025-03-01 00:00:00 UTC))),
            json!("2025-03-01T00:00:00Z")
        );
    }

    #[test]
    fn test_raw_sample_text() {
        let heart = RawSample::HeartRate(HeartRateSample {
            beats_per_minute: Scalar(72.4),
            confidence: Scalar(0.9),
        });
        assert_eq!(raw_sample_text(&heart), "72 bpm (confidence 0.90)");

        let wrist = RawSample::OnWrist(OnWristSample {
            on_wrist: false,
            wrist_detection_enabled: true,
        });
        assert_eq!(raw_sample_text(&wrist), "off wrist");
    }

    #[test]
    fn test_no_color_is_plain() {
        let opts = FormatOptions::new(true);
        assert_eq!(opts.heading("Sensors"), "Sensors");
        assert_eq!(opts.count(3), "3");
    }

    #[test]
    fn test_sensor_json() {
        let value = sensor_json(
            Sensor::HeartRate,
            "every 2h".to_string(),
            datetime!(2025-03-01 00:00:00 UTC),
        );
        assert_eq!(value["id"], "heartRate");
        assert_eq!(value["quarantine_hours"], 24);
    }
}
