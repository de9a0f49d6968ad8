use clap::Parser;

/// Toggles one GPIO output until interrupted.
#[derive(Debug, Parser)]
pub struct Args {
    /// BCM pin number.
    pub pin: u8,

    /// Seconds spent in each level.
    pub interval: f64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
