//! Command lines for the proxy and its control API.

use crate::workspace::credentials::ADMIN_USERLIST;
use crate::workspace::WorkspacePaths;

/// Proxy arguments: load the workspace main config.
pub fn proxy_args(paths: &WorkspacePaths) -> Vec<String> {
    vec!["-f".to_string(), paths.main_config.display().to_string()]
}

/// Control-API arguments. Reloads are delivered to the running proxy's master.
pub fn control_api_args(paths: &WorkspacePaths, proxy_bin: &str, proxy_pid: u32) -> Vec<String> {
    [
        "--scheme",
        "unix",
        "--socket-path",
        &paths.control_api_socket.display().to_string(),
        "--haproxy-bin",
        proxy_bin,
        "--config-file",
        &paths.main_config.display().to_string(),
        "--userlist",
        ADMIN_USERLIST,
        "--transaction-dir",
        &paths.control_api_transactions.display().to_string(),
        "--reload-cmd",
        &format!("kill -SIGUSR2 {proxy_pid}"),
        "--reload-delay",
        "1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
