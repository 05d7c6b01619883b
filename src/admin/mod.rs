//! Admin API.
//!
//! # Endpoints
//! - `GET /admin/status`: version, stop state, pending work, supervised processes
//! - `GET /admin/state`: the applied state and its generation
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::{SidecarError, SidecarResult};
use crate::lifecycle::Shutdown;
use crate::supervisor::SupervisedProcess;
use crate::sync::StateStore;

use self::auth::admin_auth_middleware;
use self::handlers::{get_state, get_status};

/// Shared state behind every admin handler.
#[derive(Clone)]
pub struct AdminState {
    pub api_key: Arc<str>,
    pub shutdown: Shutdown,
    pub store: Arc<StateStore>,
    pub processes: Arc<[SupervisedProcess]>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/state", get(get_state))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the admin API until the stop signal.
///
/// Returns the bound address. A bind failure leaves nothing registered.
pub async fn serve(bind_address: &str, state: AdminState) -> SidecarResult<SocketAddr> {
    let shutdown = state.shutdown.clone();
    let guard = shutdown.register();

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(|e| SidecarError::io(format!("failed to bind admin API on {bind_address}"), e))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| SidecarError::io("failed to read admin API address", e))?;

    let router = setup_admin_router(state);
    let mut stop = shutdown.stop_signal();
    tokio::spawn(async move {
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move { stop.stopped().await })
            .await;
        if let Err(e) = served {
            tracing::error!(error = %e, "Admin API failed");
        }
        guard.complete();
    });

    tracing::info!(address = %local_addr, "Admin API listening");
    Ok(local_addr)
}
