use clap::Parser;

/// Joystick and shake demos on the SenseHat LED matrix.
#[derive(Debug, Parser)]
pub struct Args {
    /// Display rotation in degrees: 0, 90, 180 or 270.
    #[arg(long, default_value_t = 0)]
    pub rotation: u16,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
