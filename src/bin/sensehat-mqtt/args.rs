use std::path::PathBuf;

use chrono_tz::Tz;
use clap::Parser;
use sensehat_mqtt::metrics::DEFAULT_CPU_FACTOR;

/// Publishes SenseHat readings to an MQTT broker with Home Assistant discovery.
#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "SENSEHAT_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    #[arg(long, env = "TZ", default_value = "UTC")]
    pub timezone: Tz,

    /// Divisor applied to the CPU heat when compensating the room temperature.
    #[arg(long, default_value_t = DEFAULT_CPU_FACTOR)]
    pub cpu_factor: f64,

    /// Read the CPU temperature from this thermal zone instead of `vcgencmd`.
    #[arg(long)]
    pub thermal_zone: Option<PathBuf>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
