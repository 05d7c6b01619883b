//! OS signal handling.
//!
//! SIGTERM and SIGINT are translated into a shutdown trigger naming the
//! signal. The bridge itself is registered work and exits on the stop signal.

use tokio::signal::unix::{signal, SignalKind};

use crate::error::{SidecarError, SidecarResult};
use crate::lifecycle::Shutdown;

/// Install the signal bridge.
pub fn install(shutdown: &Shutdown) -> SidecarResult<()> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| SidecarError::io("failed to install SIGTERM handler", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| SidecarError::io("failed to install SIGINT handler", e))?;

    let guard = shutdown.register();
    let shutdown = shutdown.clone();
    let mut stop = shutdown.stop_signal();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                shutdown.trigger("received SIGTERM");
            }
            _ = sigint.recv() => {
                shutdown.trigger("received SIGINT");
            }
            _ = stop.stopped() => {}
        }
        guard.complete();
    });

    Ok(())
}
