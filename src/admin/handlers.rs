use axum::{extract::State, Json};
use serde::Serialize;

use super::AdminState;
use crate::sync::Snapshot;

#[derive(Debug, Serialize)]
pub struct ProcessStatus {
    pub name: String,
    pub pid: u32,
    pub exited: bool,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub stopping: bool,
    pub reason: Option<String>,
    pub pending_work: usize,
    pub generation: u64,
    pub processes: Vec<ProcessStatus>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        stopping: state.shutdown.is_stopped(),
        reason: state.shutdown.reason(),
        pending_work: state.shutdown.pending(),
        generation: state.store.load().generation,
        processes: state
            .processes
            .iter()
            .map(|p| ProcessStatus {
                name: p.name().to_string(),
                pid: p.pid(),
                exited: p.has_exited(),
            })
            .collect(),
    })
}

pub async fn get_state(State(state): State<AdminState>) -> Json<Snapshot> {
    Json(Snapshot::clone(&state.store.load()))
}

#[cfg(test)]
mod tests {
    use super::super::{setup_admin_router, AdminState};
    use crate::lifecycle::Shutdown;
    use crate::state::certs::testing::StaticCertStore;
    use crate::state::testing::{options, route};
    use crate::state::{build_downstream_fragment, Protocol, State};
    use crate::sync::StateStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn admin_state() -> AdminState {
        AdminState {
            api_key: Arc::from("secret"),
            shutdown: Shutdown::new(),
            store: Arc::new(StateStore::new()),
            processes: Arc::from(Vec::new()),
        }
    }

    fn get(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn requests_without_valid_key_are_rejected() {
        let router = setup_admin_router(admin_state());

        let missing = router.clone().oneshot(get("/admin/status", None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = router.oneshot(get("/admin/status", Some("nope"))).await.unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_reports_shutdown_reason() {
        let state = admin_state();
        state.shutdown.trigger("received SIGTERM");
        let router = setup_admin_router(state);

        let response = router.oneshot(get("/admin/status", Some("secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["stopping"], true);
        assert_eq!(body["reason"], "received SIGTERM");
        assert_eq!(body["pending_work"], 0);
    }

    #[tokio::test]
    async fn state_returns_applied_snapshot() {
        let state = admin_state();
        let mut built = State::new();
        build_downstream_fragment(&options(), &StaticCertStore, &route("web", Protocol::Http), &mut built)
            .unwrap();
        state.store.publish(built);
        let router = setup_admin_router(state);

        let response = router.oneshot(get("/admin/state", Some("secret"))).await.unwrap();
        let body = json(response).await;
        assert_eq!(body["generation"], 1);
        assert_eq!(body["state"]["fragments"][0]["backend"]["name"], "back_downstream");
    }
}
