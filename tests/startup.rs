mod common;

use std::fs;
use std::time::Duration;

use connect_sidecar::lifecycle::startup;
use connect_sidecar::SidecarError;
use tokio::net::UnixListener;

use common::{config, eventually, fake_binary, fake_control_api, fake_proxy, workspaces, write_routes};

const RUN_LIMIT: Duration = Duration::from_secs(20);

#[tokio::test]
async fn full_run_applies_routes_and_cleans_up_after_proxy_exit() {
    let bins = tempfile::tempdir().unwrap();
    let base = tempfile::tempdir().unwrap();
    let routes = tempfile::tempdir().unwrap();

    let mut cfg = config(base.path(), &fake_proxy(bins.path()), &fake_control_api(bins.path()));
    cfg.routes.path = Some(write_routes(routes.path()).display().to_string());
    cfg.routes.watch = false;
    cfg.proxy.enable_intentions = true;

    let run = tokio::spawn(startup::run(cfg));

    let ws = eventually(RUN_LIMIT, || workspaces(base.path()).into_iter().next())
        .await
        .expect("workspace was not created");
    let _control_api = eventually(RUN_LIMIT, || {
        ws.join("haproxy.conf")
            .exists()
            .then(|| UnixListener::bind(ws.join("dataplane.sock")).ok())
            .flatten()
    })
    .await
    .expect("control-API socket could not be bound");

    let snapshot = eventually(RUN_LIMIT, || fs::read_to_string(ws.join("state.json")).ok())
        .await
        .expect("state was not applied");
    let snapshot: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(snapshot["generation"], 1);
    assert_eq!(snapshot["state"]["fragments"][0]["frontend"]["name"], "front_downstream");
    assert_eq!(snapshot["state"]["fragments"][1]["backend"]["name"], "back_billing");
    assert_eq!(snapshot["state"]["policy_agent"]["name"], "spoe_back");
    assert!(fs::read_dir(ws.join("certs")).unwrap().count() >= 2);

    let pid: i32 = eventually(RUN_LIMIT, || {
        fs::read_to_string(ws.join("proxy.pid"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    })
    .await
    .expect("proxy did not record its pid");
    // SAFETY: plain signal delivery to a child we started.
    assert_eq!(unsafe { libc::kill(pid, libc::SIGTERM) }, 0);

    let err = tokio::time::timeout(RUN_LIMIT, run)
        .await
        .expect("sidecar did not stop")
        .unwrap()
        .unwrap_err();
    match err {
        SidecarError::ProcessExited { reason } => assert_eq!(reason, "haproxy exited"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!ws.exists(), "workspace survived shutdown");
}

#[tokio::test]
async fn broken_custom_template_fails_startup() {
    let bins = tempfile::tempdir().unwrap();
    let base = tempfile::tempdir().unwrap();
    let template = bins.path().join("haproxy.cfg.tmpl");
    fs::write(&template, "global\n    nbthread {threads\n").unwrap();

    let mut cfg = config(base.path(), &fake_proxy(bins.path()), &fake_control_api(bins.path()));
    cfg.proxy.haproxy_cfg_template = Some(template.display().to_string());

    let err = tokio::time::timeout(RUN_LIMIT, startup::run(cfg))
        .await
        .expect("startup failure did not settle")
        .unwrap_err();

    assert!(matches!(err, SidecarError::Template(_)), "unexpected error: {err}");
    assert!(workspaces(base.path()).is_empty());
}

#[tokio::test]
async fn missing_proxy_binary_fails_and_leaves_nothing_behind() {
    let bins = tempfile::tempdir().unwrap();
    let base = tempfile::tempdir().unwrap();
    let cfg = config(
        base.path(),
        &bins.path().join("no-such-haproxy"),
        &fake_control_api(bins.path()),
    );

    let err = tokio::time::timeout(RUN_LIMIT, startup::run(cfg))
        .await
        .expect("startup failure did not settle")
        .unwrap_err();

    match err {
        SidecarError::Launch { binary, .. } => assert_eq!(binary, "no-such-haproxy"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(workspaces(base.path()).is_empty());
}

#[tokio::test]
async fn proxy_exiting_during_startup_stops_control_api() {
    let bins = tempfile::tempdir().unwrap();
    let base = tempfile::tempdir().unwrap();
    let proxy = fake_binary(bins.path(), "haproxy", "exit 1");
    let cfg = config(base.path(), &proxy, &fake_control_api(bins.path()));

    let err = tokio::time::timeout(RUN_LIMIT, startup::run(cfg))
        .await
        .expect("control API was not stopped")
        .unwrap_err();

    match err {
        SidecarError::ProcessExited { reason } => assert_eq!(reason, "haproxy exited"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(workspaces(base.path()).is_empty());
}

#[tokio::test]
async fn silent_control_api_times_out() {
    let bins = tempfile::tempdir().unwrap();
    let base = tempfile::tempdir().unwrap();
    let mut cfg = config(base.path(), &fake_proxy(bins.path()), &fake_control_api(bins.path()));
    cfg.supervisor.readiness_timeout_ms = 200;

    let err = tokio::time::timeout(RUN_LIMIT, startup::run(cfg))
        .await
        .expect("supervised processes were not stopped")
        .unwrap_err();

    assert!(matches!(err, SidecarError::NotReady { .. }));
    assert!(workspaces(base.path()).is_empty());
}
