use std::{future::Future, io};

use tokio::signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};

/// Resolves on the first SIGINT or SIGTERM. Handlers are installed before
/// returning, so a signal that arrives early is not lost.
pub fn signal_received() -> io::Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(async move {
        let name = tokio::select! {
            result = ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!("failed to listen for SIGINT: {e}");
                }
                "SIGINT"
            }
            _ = sigterm.recv() => "SIGTERM",
        };
        tracing::info!(signal = name, "received shutdown signal");
    })
}
