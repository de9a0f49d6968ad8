pub mod config;
pub mod demo;
pub mod discovery;
pub mod display;
pub mod error;
pub mod gpio;
pub mod joystick;
pub mod logging;
pub mod metrics;
pub mod motion;
pub mod mqtt;
pub mod retry;
pub mod sensehat;
pub mod shutdown;

pub use error::{Disposition, Error};
