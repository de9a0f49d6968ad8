use clap::Parser;

/// Counts PIR motion episodes, mirroring them on an output pin and the LED
/// matrix.
#[derive(Debug, Parser)]
pub struct Args {
    /// BCM number of the sensor input.
    #[arg(long, env = "MOTION_INPUT_PIN", default_value_t = 17)]
    pub input_pin: u8,

    /// BCM number of the output driven while motion lasts.
    #[arg(long, env = "MOTION_OUTPUT_PIN", default_value_t = 5)]
    pub output_pin: u8,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
