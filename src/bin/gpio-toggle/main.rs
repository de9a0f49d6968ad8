mod args;

use std::{process::ExitCode, time::Duration};

use anyhow::{Context as _, Result, bail};
use args::Args;
use clap::Parser as _;
use rppal::gpio::Gpio;
use sensehat_mqtt::{gpio::toggle, logging, shutdown};

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

    let interval = Duration::try_from_secs_f64(args.interval)
        .with_context(|| format!("invalid interval: {}", args.interval))?;
    if interval.is_zero() {
        bail!("interval must be positive");
    }

    let mut pin = Gpio::new()
        .context("failed to access GPIO")?
        .get(args.pin)
        .with_context(|| format!("failed to get pin {}", args.pin))?
        .into_output_low();
    let shutdown = shutdown::signal_received().context("failed to install signal handlers")?;

    tracing::info!(pin = args.pin, ?interval, "toggling");
    let cycles = toggle(&mut pin, interval, shutdown)
        .await
        .with_context(|| format!("failed to drive pin {}", args.pin))?;

    tracing::info!(cycles, "stopped");
    Ok(())
}
