//! Sensors command - list the catalog.

use anyhow::Result;
use serde_json::Value;

use sensorkit_types::Sensor;

use super::Context;
use crate::format;

pub fn cmd_sensors(ctx: &Context) -> Result<()> {
    let config = ctx.module.config();

    if ctx.json() {
        let sensors: Vec<Value> = Sensor::ALL
            .iter()
            .map(|&sensor| {
                format::sensor_json(
                    sensor,
                    config.policy_for(sensor).to_string(),
                    ctx.module.quarantine_cutoff(sensor),
                )
            })
            .collect();
        print!("{}", format::to_json(&Value::Array(sensors))?);
        return Ok(());
    }

    if !ctx.quiet {
        println!("{}", ctx.opts.heading("Sensors"));
    }
    for sensor in Sensor::ALL {
        let descriptor = sensor.descriptor();
        println!(
            "  {:<20} {:<18} {:<8} {:<16} {}",
            descriptor.id,
            descriptor.display_name,
            format!("{:?}", descriptor.result_shape),
            config.policy_for(sensor).to_string(),
            ctx.opts.dim(&format!(
                "({})",
                ctx.module.authorization_status(sensor)
            )),
        );
    }
    Ok(())
}
