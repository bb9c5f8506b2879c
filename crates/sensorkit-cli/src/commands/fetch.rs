//! Fetch command - read the most recent window of raw samples.

use anyhow::{Context as _, Result, bail};
use serde_json::{Value, json};
use time::Duration;

use sensorkit_core::FetchResults;

use super::Context;
use crate::cli::FetchArgs;
use crate::format;

pub async fn cmd_fetch(ctx: &Context, args: FetchArgs) -> Result<()> {
    let sensor = ctx.sensor(&args.sensor)?;
    let devices = ctx.module.fetch_devices(sensor).await?;
    let device = match &args.device {
        Some(product_type) => devices
            .into_iter()
            .find(|device| &device.product_type == product_type),
        None => devices.into_iter().next(),
    };
    let Some(device) = device else {
        bail!(
            "No device {} recorded {sensor}",
            args.device.as_deref().unwrap_or("at all")
        );
    };

    let window = Duration::hours(args.last.into());
    let results = ctx
        .module
        .fetch_most_recent(sensor, &device, window)
        .await
        .with_context(|| format!("Failed to fetch {sensor} from {device}"))?;
    let result_count = results.len();
    let samples: Vec<_> = FetchResults::new(results).collect();

    if ctx.json() {
        let samples: Vec<Value> = samples
            .iter()
            .map(|(timestamp, sample)| {
                json!({
                    "timestamp": format::instant(*timestamp),
                    "sample": serde_json::to_value(sample).unwrap_or(Value::Null),
                })
            })
            .collect();
        let output = json!({
            "sensor": sensor.id(),
            "device": device.product_type,
            "results": result_count,
            "samples": samples,
        });
        print!("{}", format::to_json(&output)?);
        return Ok(());
    }

    if !ctx.quiet {
        println!(
            "{}",
            ctx.opts.heading(&format!(
                "{sensor} from {device}: {result_count} results, {} samples",
                samples.len()
            ))
        );
    }
    for (timestamp, sample) in &samples {
        println!(
            "  {}  {}",
            format::instant(*timestamp),
            format::raw_sample_text(sample)
        );
    }
    Ok(())
}
