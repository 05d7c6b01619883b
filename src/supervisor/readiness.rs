//! Waiting for a supervised process's control socket.

use std::path::Path;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::net::UnixStream;

use crate::config::SupervisorConfig;
use crate::error::{SidecarError, SidecarResult};
use crate::lifecycle::Shutdown;

/// Polling bounds for readiness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl From<&SupervisorConfig> for ReadinessPolicy {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.readiness_timeout_ms),
            base_delay: Duration::from_millis(config.readiness_base_delay_ms),
            max_delay: Duration::from_millis(config.readiness_max_delay_ms),
        }
    }
}

/// Shortest pause between attempts, whatever the configured base.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Exponential backoff with up to 10% jitter, capped at `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(attempt - 1);
    let capped = base.saturating_mul(factor).min(max).max(MIN_DELAY);

    let jitter_range = capped.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    capped + Duration::from_millis(jitter)
}

/// Wait until a Unix socket at `path` accepts connections.
///
/// Gives up early if shutdown is triggered while waiting.
pub async fn wait_for_socket(
    path: &Path,
    policy: ReadinessPolicy,
    shutdown: &Shutdown,
) -> SidecarResult<()> {
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        if UnixStream::connect(path).await.is_ok() {
            tracing::info!(path = %path.display(), waited = ?started.elapsed(), "Socket ready");
            return Ok(());
        }
        if let Some(reason) = shutdown.reason() {
            return Err(if shutdown.is_fault() {
                SidecarError::ProcessExited { reason }
            } else {
                SidecarError::Stopped { reason }
            });
        }
        if started.elapsed() >= policy.timeout {
            return Err(SidecarError::NotReady {
                path: path.to_path_buf(),
                waited: started.elapsed(),
            });
        }

        attempt += 1;
        let delay = backoff_delay(attempt, policy.base_delay, policy.max_delay);
        tracing::trace!(path = %path.display(), attempt, ?delay, "Socket not ready");
        tokio::time::sleep(delay).await;
    }
}
