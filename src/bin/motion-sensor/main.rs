mod args;

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use args::Args;
use clap::Parser as _;
use rppal::gpio::Gpio;
use sensehat_mqtt::{
    display::{Display, Rgb, SenseFramebuffer},
    logging,
    motion::{MotionMonitor, POLL_INTERVAL},
    shutdown,
};

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

    let gpio = Gpio::new().context("failed to access GPIO")?;
    let input = gpio
        .get(args.input_pin)
        .with_context(|| format!("failed to get input pin {}", args.input_pin))?
        .into_input();
    let output = gpio
        .get(args.output_pin)
        .with_context(|| format!("failed to get output pin {}", args.output_pin))?
        .into_output_low();

    let matrix = SenseFramebuffer::open().context("failed to open LED matrix")?;
    let shutdown = shutdown::signal_received().context("failed to install signal handlers")?;

    tracing::info!(
        input_pin = args.input_pin,
        output_pin = args.output_pin,
        "watching for motion"
    );

    // Dropping the monitor drives the output low and clears the matrix; rppal
    // resets both pins when they are dropped.
    let mut monitor = MotionMonitor::new(input, output, Display::new(matrix), Rgb::RED);
    monitor
        .run(POLL_INTERVAL, shutdown)
        .await
        .context("motion monitor failed")?;

    tracing::info!(count = monitor.detector().count(), "stopped");
    Ok(())
}
