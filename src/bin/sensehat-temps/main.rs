mod args;

use std::{process::ExitCode, time::Duration};

use anyhow::{Context as _, Result};
use args::Args;
use chrono::Utc;
use clap::Parser as _;
use sensehat_mqtt::{
    display::{DEFAULT_SCROLL_SPEED, Display, Rgb, SenseFramebuffer},
    logging,
    metrics::{Aggregator, round_to},
    sensehat::{CpuSource, EnvironmentSensor, IioEnvironment},
    shutdown,
};
use tokio::time::{MissedTickBehavior, interval};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let sensor = IioEnvironment::open().context("failed to open environmental sensors")?;
    let cpu = CpuSource::new(args.thermal_zone);

    let now = Utc::now().with_timezone(&args.timezone).fixed_offset();
    let reading = Aggregator::new(args.cpu_factor)
        .read(&sensor, &cpu, now)
        .await
        .context("failed to read sensors")?;
    println!("{}", reading.to_json().context("failed to encode reading")?);

    let Some(seconds) = args.display_every else {
        return Ok(());
    };
    show_temperature(&sensor, Duration::from_secs(seconds)).await
}

async fn show_temperature(sensor: &IioEnvironment, period: Duration) -> Result<()> {
    let shutdown = shutdown::signal_received().context("failed to install signal handlers")?;
    tokio::pin!(shutdown);

    let matrix = SenseFramebuffer::open().context("failed to open LED matrix")?;
    let mut display = Display::new(matrix);
    display
        .show_message("Hi", Rgb::WHITE, Rgb::OFF, DEFAULT_SCROLL_SPEED)
        .await
        .context("failed to write to LED matrix")?;

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let temperature = match sensor.temperature_from_humidity().await {
                    Ok(t) => round_to(t, 1),
                    Err(e) => {
                        tracing::warn!("failed to read temperature: {:#}", anyhow::Error::from(e));
                        continue;
                    }
                };
                display
                    .show_message(&format!("{temperature:.1}"), Rgb::WHITE, Rgb::OFF, DEFAULT_SCROLL_SPEED)
                    .await
                    .context("failed to write to LED matrix")?;
            }
            _ = &mut shutdown => return Ok(()),
        }
    }
}
