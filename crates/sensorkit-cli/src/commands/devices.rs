//! Devices command - list the devices that recorded a sensor.

use anyhow::{Context as _, Result};
use serde_json::Value;

use super::Context;
use crate::format;

pub async fn cmd_devices(ctx: &Context, sensor: &str) -> Result<()> {
    let sensor = ctx.sensor(sensor)?;
    let devices = ctx
        .module
        .fetch_devices(sensor)
        .await
        .with_context(|| format!("Failed to list devices for {sensor}"))?;

    if ctx.json() {
        let devices: Vec<Value> = devices.iter().map(format::device_json).collect();
        print!("{}", format::to_json(&Value::Array(devices))?);
        return Ok(());
    }

    if devices.is_empty() {
        if !ctx.quiet {
            println!("No devices recorded {sensor}");
        }
        return Ok(());
    }

    if !ctx.quiet {
        println!("{}", ctx.opts.heading(&format!("Devices for {sensor}")));
    }
    for device in &devices {
        println!(
            "  {:<12} {} {}",
            device.product_type,
            device.name,
            ctx.opts.dim(&format!(
                "({} {} {})",
                device.model, device.system_name, device.system_version
            )),
        );
    }
    Ok(())
}
