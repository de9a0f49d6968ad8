mod args;

use std::{process::ExitCode, time::Duration};

use anyhow::{Context as _, Result, anyhow};
use args::Args;
use clap::Parser as _;
use rand::{SeedableRng as _, rngs::StdRng};
use sensehat_mqtt::{
    demo::Demo,
    display::{Display, Rotation, SenseFramebuffer},
    joystick::{Action, Direction, Joystick, JoystickEvent},
    logging,
    sensehat::{IioEnvironment, IioImu},
    shutdown,
};
use tokio::{
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};

const SHAKE_POLL_INTERVAL: Duration = Duration::from_millis(100);

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

    let rotation = Rotation::from_degrees(args.rotation)
        .ok_or_else(|| anyhow!("rotation must be 0, 90, 180 or 270, got {}", args.rotation))?;

    let matrix = SenseFramebuffer::open().context("failed to open LED matrix")?;
    let mut display = Display::new(matrix);
    display
        .set_rotation(rotation)
        .context("failed to rotate LED matrix")?;

    let sensor = IioEnvironment::open().context("failed to open environmental sensors")?;
    let imu = IioImu::open().context("failed to open IMU")?;
    let joystick = Joystick::open().await.context("failed to open joystick")?;
    let shutdown = shutdown::signal_received().context("failed to install signal handlers")?;
    tokio::pin!(shutdown);

    // Reads run in their own task; a partial read must not be cancelled.
    let (tx, mut presses) = mpsc::channel(16);
    let reader = tokio::spawn(forward_presses(joystick, tx));

    let mut demo = Demo::new(display, sensor, imu, StdRng::from_os_rng());
    let mut ticker = interval(SHAKE_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("use the joystick, or shake the Pi");
    loop {
        tokio::select! {
            Some(direction) = presses.recv() => {
                if let Err(e) = demo.handle(direction).await {
                    tracing::warn!(?direction, "demo failed: {:#}", anyhow::Error::from(e));
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = demo.check_shake().await {
                    tracing::warn!("failed to check for shaking: {:#}", anyhow::Error::from(e));
                }
            }
            _ = &mut shutdown => break,
        }
    }

    reader.abort();
    Ok(())
}

async fn forward_presses(mut joystick: Joystick, presses: mpsc::Sender<Direction>) {
    loop {
        match joystick.next_event().await {
            Ok(JoystickEvent {
                direction,
                action: Action::Pressed,
            }) => {
                if presses.send(direction).await.is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("stopped reading joystick: {:#}", anyhow::Error::from(e));
                return;
            }
        }
    }
}
