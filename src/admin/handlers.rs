use std::net::IpAddr;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::fleet::instance::{HealthState, InstanceState};
use crate::perimeter::engine::AccessRequest;
use crate::perimeter::rule::{Action, Direction, Protocol};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub fleet_size: u32,
    pub min: u32,
    pub max: u32,
    pub eligible_backends: usize,
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub id: String,
    pub address: String,
    pub state: InstanceState,
    pub health: HealthState,
    pub eligible: bool,
    pub in_flight: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        fleet_size: state.roster.capacity(),
        min: state.profile.min,
        max: state.profile.max,
        eligible_backends: state.pool.eligible().len(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let mut statuses = Vec::new();
    for instance in state.pool.members().iter() {
        statuses.push(BackendStatus {
            id: instance.id.to_string(),
            address: instance.addr.to_string(),
            state: instance.state(),
            health: instance.health(),
            eligible: instance.is_eligible(),
            in_flight: instance.in_flight(),
        });
    }
    Json(statuses)
}

pub async fn get_last_action(State(state): State<AdminState>) -> Json<serde_json::Value> {
    match state.last_action.load_full() {
        Some(action) => Json(serde_json::json!({ "last_action": &*action })),
        None => Json(serde_json::json!({ "last_action": null })),
    }
}

#[derive(Deserialize)]
pub struct DecisionQuery {
    #[serde(default = "default_decision_limit")]
    pub limit: usize,
}

fn default_decision_limit() -> usize {
    50
}

pub async fn get_decisions(
    State(state): State<AdminState>,
    Query(query): Query<DecisionQuery>,
) -> Json<serde_json::Value> {
    let decisions = state.perimeters.recent_decisions(query.limit);
    Json(serde_json::json!({ "decisions": decisions }))
}

/// Dry-run evaluation of one request tuple against a named perimeter.
#[derive(Deserialize)]
pub struct EvaluateRequest {
    pub perimeter: String,
    pub direction: Direction,
    pub protocol: Protocol,
    pub port: u16,
    pub source: IpAddr,
    pub destination: IpAddr,
}

#[derive(Serialize)]
pub struct EvaluateResponse {
    pub action: Action,
}

pub async fn evaluate_perimeter(
    State(state): State<AdminState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, StatusCode> {
    if req.protocol == Protocol::Any {
        // A concrete request carries a concrete protocol.
        return Err(StatusCode::BAD_REQUEST);
    }
    let action = state.perimeters.evaluate(
        &req.perimeter,
        &AccessRequest {
            direction: req.direction,
            protocol: req.protocol,
            port: req.port,
            source: req.source,
            destination: req.destination,
        },
    );
    Ok(Json(EvaluateResponse { action }))
}
