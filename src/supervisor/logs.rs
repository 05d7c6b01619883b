//! Forwarding of subprocess output into the sidecar's logs.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};

/// Spawn one pump per stream. Pumps end when the pipe closes.
pub fn attach(prefix: &str, stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) {
    if let Some(out) = stdout {
        tokio::spawn(pump(prefix.to_string(), "stdout", out));
    }
    if let Some(err) = stderr {
        tokio::spawn(pump(prefix.to_string(), "stderr", err));
    }
}

async fn pump<R>(prefix: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::info!(target: "connect_sidecar::subprocess", process = %prefix, stream, "{line}");
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(process = %prefix, stream, error = %e, "Output pipe failed");
                break;
            }
        }
    }
}
