use std::{fmt::Debug, future::Future, time::Duration};

use embedded_hal::digital::OutputPin;
use tokio::time::sleep;

/// An `embedded-hal` pin error, flattened so it can cross thread and crate
/// boundaries.
#[derive(Debug, thiserror::Error)]
#[error("GPIO pin error: {0}")]
pub struct PinError(pub String);

impl PinError {
    pub fn from_debug(e: impl Debug) -> Self {
        Self(format!("{e:?}"))
    }
}

/// Drives `pin` high and low for `interval` each until `shutdown` resolves,
/// then leaves it low. Returns the number of completed high phases.
pub async fn toggle<O: OutputPin>(
    pin: &mut O,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<u64, PinError> {
    tokio::pin!(shutdown);
    let mut cycles = 0;

    let result = loop {
        if let Err(e) = pin.set_high() {
            break Err(PinError::from_debug(e));
        }
        tokio::select! {
            _ = sleep(interval) => {}
            _ = &mut shutdown => break Ok(cycles),
        }
        cycles += 1;

        if let Err(e) = pin.set_low() {
            break Err(PinError::from_debug(e));
        }
        tokio::select! {
            _ = sleep(interval) => {}
            _ = &mut shutdown => break Ok(cycles),
        }
    };

    let cleanup = pin.set_low().map_err(PinError::from_debug);
    match (result, cleanup) {
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Err(cleanup)) => {
            tracing::warn!("failed to leave pin low: {cleanup}");
            Err(e)
        }
        (result, Ok(())) => result,
    }
}
