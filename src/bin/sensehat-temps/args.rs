use std::path::PathBuf;

use chrono_tz::Tz;
use clap::Parser;
use sensehat_mqtt::metrics::DEFAULT_CPU_FACTOR;

/// Prints one SenseHat reading as JSON.
#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "TZ", default_value = "UTC")]
    pub timezone: Tz,

    #[arg(long, default_value_t = DEFAULT_CPU_FACTOR)]
    pub cpu_factor: f64,

    /// Read the CPU temperature from this thermal zone instead of `vcgencmd`.
    #[arg(long)]
    pub thermal_zone: Option<PathBuf>,

    /// Afterwards, keep showing the temperature on the LED matrix every N
    /// seconds until interrupted.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub display_every: Option<u64>,

    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}
