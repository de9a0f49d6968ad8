mod args;

use std::{process::ExitCode, time::Duration};

use anyhow::{Context as _, Result};
use args::Args;
use clap::Parser as _;
use sensehat_mqtt::{
    config::Config,
    logging,
    metrics::Aggregator,
    mqtt::{self, Coordinator, Session, mqtt_options},
    sensehat::{CpuSource, IioEnvironment},
    shutdown,
};

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

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

    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    let options = mqtt_options(&config).context("failed to build MQTT client options")?;

    let sensor = IioEnvironment::open().context("failed to open environmental sensors")?;
    let cpu = CpuSource::new(args.thermal_zone);
    let shutdown = shutdown::signal_received().context("failed to install signal handlers")?;

    tracing::info!(
        host = %config.broker.host,
        port = config.broker.port,
        interval = ?config.interval(),
        "starting"
    );

    let mut session = Session::start(options);
    let interval = config.interval();
    let mut coordinator = Coordinator::new(
        config,
        session.client.clone(),
        sensor,
        cpu,
        args.timezone,
    )
    .with_aggregator(Aggregator::new(args.cpu_factor));

    let result = mqtt::run(&mut coordinator, &mut session.events, interval, shutdown).await;
    session.join(DISCONNECT_TIMEOUT).await;

    result.context("sensor service stopped")
}
