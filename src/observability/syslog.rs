//! Receiver for the proxy's request log datagrams.
//!
//! The proxy sends RFC 5424 lines to a Unix datagram socket in the workspace.
//! Each datagram becomes one tracing event.

use std::path::Path;

use tokio::net::UnixDatagram;

use crate::error::{SidecarError, SidecarResult};
use crate::lifecycle::Shutdown;

const MAX_DATAGRAM: usize = 64 * 1024;

/// Bind `path` and forward datagrams until the stop signal.
///
/// Registered with `shutdown`; a bind failure leaves nothing registered.
pub fn start_forwarder(path: &Path, shutdown: &Shutdown) -> SidecarResult<()> {
    let guard = shutdown.register();
    let socket = UnixDatagram::bind(path)
        .map_err(|e| SidecarError::io(format!("failed to bind log socket {}", path.display()), e))?;
    tracing::debug!(path = %path.display(), "Request log socket bound");

    let mut stop = shutdown.stop_signal();
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                _ = stop.stopped() => break,
                received = socket.recv(&mut buf) => match received {
                    Ok(n) => {
                        let line = String::from_utf8_lossy(&buf[..n]);
                        tracing::info!(target: "connect_sidecar::requests", "{}", message(&line));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Request log socket failed");
                        break;
                    }
                }
            }
        }
        guard.complete();
    });
    Ok(())
}

/// The message part of a request log line.
///
/// A full RFC 5424 header (`<PRI>VERSION TIMESTAMP HOST APP PROCID MSGID SD`)
/// is removed. A line that only carries `<PRI>` loses just that, and anything
/// else is returned as is, minus the trailing newline.
fn message(line: &str) -> &str {
    let line = line.trim_end_matches(['\n', '\0']);
    let Some(rest) = strip_priority(line) else {
        return line;
    };
    strip_header(rest).unwrap_or(rest)
}

fn strip_priority(line: &str) -> Option<&str> {
    let (pri, rest) = line.strip_prefix('<')?.split_once('>')?;
    (!pri.is_empty() && pri.bytes().all(|b| b.is_ascii_digit())).then_some(rest)
}

fn strip_header(rest: &str) -> Option<&str> {
    let (version, mut rest) = rest.split_once(' ')?;
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // TIMESTAMP HOSTNAME APP-NAME PROCID MSGID
    for _ in 0..5 {
        rest = rest.split_once(' ')?.1;
    }

    let rest = skip_structured_data(rest)?;
    let msg = rest.strip_prefix(' ').unwrap_or(rest);
    Some(msg.strip_prefix('\u{feff}').unwrap_or(msg))
}

/// Skip the nil value `-` or a run of `[...]` elements with quoted params.
fn skip_structured_data(sd: &str) -> Option<&str> {
    if let Some(rest) = sd.strip_prefix('-') {
        return Some(rest);
    }
    if !sd.starts_with('[') {
        return None;
    }

    let mut in_element = false;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in sd.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' if in_element => quoted = !quoted,
            '[' if !quoted && !in_element => in_element = true,
            ']' if !quoted && in_element => {
                in_element = false;
                if !sd[i + 1..].starts_with('[') {
                    return Some(&sd[i + 1..]);
                }
            }
            _ if !in_element => return None,
            _ => {}
        }
    }
    None
}
