//! Sync command - run one anchored pass over a sensor's history.

use anyhow::{Context as _, Result};
use futures::StreamExt;
use serde_json::{Map, Value, json};
use time::Duration;
use tracing::info;

use sensorkit_types::{BatchPolicy, CheckpointKey};

use super::Context;
use crate::cli::SyncArgs;
use crate::format;

fn policy_override(args: &SyncArgs) -> Option<BatchPolicy> {
    match (args.count, args.every_minutes) {
        (Some(count), _) => Some(BatchPolicy::ByCount(count)),
        (None, Some(minutes)) => Some(BatchPolicy::ByTime(Duration::minutes(minutes.into()))),
        (None, None) => None,
    }
}

/// Execute the sync command.
pub async fn cmd_sync(ctx: &Context, args: SyncArgs) -> Result<()> {
    let sensor = ctx.sensor(&args.sensor)?;

    ctx.module
        .request_authorization(&[sensor])
        .await
        .with_context(|| format!("Failed to authorize {sensor}"))?;

    let fetch = ctx
        .module
        .fetch_anchored(sensor, policy_override(&args))
        .context("Invalid batch policy")?;
    let policy = fetch.policy();
    info!(%sensor, %policy, "Syncing");

    if !ctx.json() && !ctx.quiet {
        println!(
            "{}",
            ctx.opts.heading(&format!("Syncing {sensor} ({policy})"))
        );
    }

    let mut reports = Vec::new();
    let mut total_samples = 0;
    let mut batches = Box::pin(
        fetch
            .into_stream()
            .take(args.limit.unwrap_or(usize::MAX)),
    );
    while let Some(batch) = batches.next().await {
        let batch = batch.with_context(|| format!("Sync of {sensor} stopped"))?;
        total_samples += batch.samples.len();
        if ctx.json() {
            reports.push(format::batch_info_json(&batch.info, batch.samples.len()));
        } else {
            println!("  {}", format::batch_text(&batch, &ctx.opts));
            if ctx.quiet {
                continue;
            }
            for sample in batch.samples.iter().take(3) {
                println!("      {}", ctx.opts.dim(&format::safe_sample_text(sample)));
            }
            if batch.samples.len() > 3 {
                println!(
                    "      {}",
                    ctx.opts.dim(&format!("... {} more", batch.samples.len() - 3))
                );
            }
        }
    }
    // A count-based stream stopped by the limit still holds the reader.
    drop(batches);

    let store = ctx.module.checkpoints();
    let mut checkpoints = Map::new();
    for device in ctx.module.fetch_devices(sensor).await? {
        let checkpoint = store.get(&CheckpointKey::new(sensor, device.product_type.clone()));
        checkpoints.insert(device.product_type, format::checkpoint_json(checkpoint));
    }

    if ctx.json() {
        let output = json!({
            "sensor": sensor.id(),
            "policy": policy.to_string(),
            "batches": reports,
            "samples": total_samples,
            "checkpoints": Value::Object(checkpoints),
        });
        print!("{}", format::to_json(&output)?);
    } else if !ctx.quiet {
        println!(
            "Synced {} samples; checkpoints now {}",
            ctx.opts.count(total_samples),
            Value::Object(checkpoints)
        );
    }
    Ok(())
}
