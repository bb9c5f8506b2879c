//! Anchors command - list stored query anchors.

use anyhow::{Context as _, Result};
use serde_json::Value;

use sensorkit_store::AnchorQuery;
use sensorkit_types::CheckpointKey;

use super::Context;
use crate::format;

pub fn cmd_anchors(ctx: &Context, sensor: Option<&str>) -> Result<()> {
    let prefix = ctx.module.checkpoints().prefix();
    let filter = match sensor {
        Some(id) => CheckpointKey::sensor_prefix(prefix, ctx.sensor(id)?),
        None => format!("{prefix}."),
    };
    let anchors = ctx
        .store
        .query_anchors(&AnchorQuery::new().prefix(&filter))
        .context("Failed to query anchors")?;

    if ctx.json() {
        let anchors: Vec<Value> = anchors
            .iter()
            .map(|anchor| format::anchor_json(anchor, prefix))
            .collect();
        print!("{}", format::to_json(&Value::Array(anchors))?);
        return Ok(());
    }

    if anchors.is_empty() {
        if !ctx.quiet {
            println!("No anchors stored under {prefix}");
        }
        return Ok(());
    }

    if !ctx.quiet {
        println!("{}", ctx.opts.heading("Anchors"));
    }
    for anchor in &anchors {
        println!(
            "  {:<32} {:<32} {}",
            anchor.suffix(prefix).unwrap_or(&anchor.key),
            anchor.checkpoint.to_string(),
            ctx.opts.dim(&format!("written {}", format::instant(anchor.updated_at))),
        );
    }
    Ok(())
}
