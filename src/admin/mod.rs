//! Admin API: the controller's observable outputs.
//!
//! Serves current fleet size and bounds, the backend eligibility set, the
//! last scale action, the perimeter decision log, and a dry-run perimeter
//! evaluation endpoint. Bearer-token authenticated.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::schema::ScaleProfile;
use crate::fleet::instance::FleetRoster;
use crate::lifecycle::Shutdown;
use crate::perimeter::PerimeterSet;
use crate::pool::BackendPool;
use crate::scaler::rules::LastAction;

/// State injected into admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub roster: Arc<FleetRoster>,
    pub pool: Arc<BackendPool>,
    pub perimeters: Arc<PerimeterSet>,
    pub last_action: Arc<ArcSwapOption<LastAction>>,
    pub profile: ScaleProfile,
    pub api_key: String,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .route("/admin/scaling", get(get_last_action))
        .route("/admin/decisions", get(get_decisions))
        .route("/admin/perimeter/evaluate", post(evaluate_perimeter))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the admin API until shutdown.
pub async fn run_admin(
    state: AdminState,
    bind_address: String,
    shutdown: Arc<Shutdown>,
) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Admin API listening");

    let router = setup_admin_router(state);
    let mut rx = shutdown.subscribe();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = rx.recv().await;
        })
        .await
}
