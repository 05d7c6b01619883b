//! Subprocess supervision.
//!
//! # Data Flow
//! ```text
//! launch(spec)
//!     → register pending work → spawn (own process group)
//!     → exit watcher:  wait() → mark exited → Trigger("<bin> exited") → complete
//!     → stop watcher:  stop signal → exited? nothing : SIGTERM to the group (once)
//! ```
//!
//! # Design Decisions
//! - Any exit of a supervised process, clean or not, stops the sidecar
//! - Termination is cooperative: one SIGTERM, no escalation
//! - The pending unit completes only after the process has been reaped

pub mod args;
pub mod logs;
pub mod readiness;

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::process::Command;

use crate::error::{SidecarError, SidecarResult};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// A supervised process exiting stops the whole sidecar.
pub const EXIT_IS_FATAL: bool = true;

/// Signal sent to a supervised process group on shutdown.
pub const TERMINATION_SIGNAL: libc::c_int = libc::SIGTERM;

/// What to run and how to watch it.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Tag for forwarded output lines.
    pub log_prefix: String,
    /// Forward stdout/stderr into the sidecar's logs; otherwise discard.
    pub attach_logs: bool,
    /// Trigger shutdown when the process exits.
    pub fatal_on_exit: bool,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let program = program.into();
        Self {
            log_prefix: binary_name(&program),
            program,
            args,
            attach_logs: false,
            fatal_on_exit: EXIT_IS_FATAL,
        }
    }

    pub fn log_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_prefix = prefix.into();
        self
    }

    pub fn attach_logs(mut self, attach: bool) -> Self {
        self.attach_logs = attach;
        self
    }

    pub fn fatal_on_exit(mut self, fatal: bool) -> Self {
        self.fatal_on_exit = fatal;
        self
    }
}

/// Handle to a launched process.
#[derive(Debug, Clone)]
pub struct SupervisedProcess {
    name: String,
    pid: u32,
    exited: Arc<AtomicBool>,
    signaled: Arc<AtomicBool>,
}

impl SupervisedProcess {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the process has exited and been reaped.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Whether the termination signal was delivered.
    pub fn was_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }

    fn terminate(&self) {
        if self.signaled.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(process = %self.name, pid = self.pid, signal = TERMINATION_SIGNAL, "Terminating process");
        metrics::record_process_signal(&self.name);

        // Negative pid addresses the process group the child leads.
        let pgid = -(self.pid as libc::pid_t);
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pgid, TERMINATION_SIGNAL) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            tracing::warn!(process = %self.name, pid = self.pid, error = %err, "Failed to signal process");
        }
    }
}

/// Launch a process and tie its lifetime to `shutdown`.
///
/// Must be called inside a Tokio runtime.
pub fn launch(shutdown: &Shutdown, spec: LaunchSpec) -> SidecarResult<SupervisedProcess> {
    let name = binary_name(&spec.program);
    let guard = shutdown.register();

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args).stdin(Stdio::null()).process_group(0);
    if spec.attach_logs {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let mut child = cmd.spawn().map_err(|source| SidecarError::Launch {
        binary: name.clone(),
        source,
    })?;
    let Some(pid) = child.id() else {
        return Err(SidecarError::Launch {
            binary: name,
            source: io::Error::other("process could not be started"),
        });
    };

    if spec.attach_logs {
        logs::attach(&spec.log_prefix, child.stdout.take(), child.stderr.take());
    }

    tracing::info!(process = %name, pid, args = ?spec.args, "Process started");

    let process = SupervisedProcess {
        name,
        pid,
        exited: Arc::new(AtomicBool::new(false)),
        signaled: Arc::new(AtomicBool::new(false)),
    };

    {
        let process = process.clone();
        let shutdown = shutdown.clone();
        let fatal = spec.fatal_on_exit;
        tokio::spawn(async move {
            let status = child.wait().await;
            process.exited.store(true, Ordering::SeqCst);
            metrics::record_process_exit(&process.name);
            match status {
                Ok(status) if status.success() => {
                    tracing::error!(process = %process.name, pid = process.pid, "Process exited");
                }
                Ok(status) => {
                    tracing::error!(process = %process.name, pid = process.pid, status = %status, "Process exited with error");
                }
                Err(e) => {
                    tracing::error!(process = %process.name, pid = process.pid, error = %e, "Failed to wait for process");
                }
            }
            if fatal {
                shutdown.trigger_fault(format!("{} exited", process.name));
            }
            guard.complete();
        });
    }

    {
        let process = process.clone();
        let mut stop = shutdown.stop_signal();
        tokio::spawn(async move {
            stop.stopped().await;
            if process.has_exited() {
                return;
            }
            process.terminate();
        });
    }

    Ok(process)
}

fn binary_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}
