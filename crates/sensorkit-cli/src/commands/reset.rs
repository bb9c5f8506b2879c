//! Reset command - forget query anchors.

use anyhow::{Context as _, Result};
use serde_json::json;

use super::Context;
use crate::format;

pub fn cmd_reset(ctx: &Context, sensor: Option<&str>, all: bool) -> Result<()> {
    let (scope, removed) = match sensor {
        Some(id) if !all => {
            let sensor = ctx.sensor(id)?;
            let removed = ctx
                .module
                .reset_query_anchors(sensor)
                .with_context(|| format!("Failed to reset anchors for {sensor}"))?;
            (sensor.id().to_string(), removed)
        }
        _ => {
            let removed = ctx
                .module
                .reset_all_query_anchors()
                .context("Failed to reset anchors")?;
            ("all".to_string(), removed)
        }
    };

    if ctx.json() {
        print!(
            "{}",
            format::to_json(&json!({ "reset": scope, "removed": removed }))?
        );
    } else if !ctx.quiet {
        println!("Removed {} anchors ({scope})", ctx.opts.count(removed));
    }
    Ok(())
}
