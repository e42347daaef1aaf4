//! Perimeter evaluation through the config surface and the admin API.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use arc_swap::ArcSwapOption;
use fleet_control::admin::{setup_admin_router, AdminState};
use fleet_control::config::schema::{FleetConfig, ScaleProfile};
use fleet_control::config::validation::{validate_config, ValidationError};
use fleet_control::fleet::FleetRoster;
use fleet_control::perimeter::{AccessRequest, Action, Direction, PerimeterSet, Protocol};
use fleet_control::pool::BackendPool;

fn web_fleet_config() -> FleetConfig {
    let raw = r#"
        [provisioner]
        warm_pool = [
            "10.0.1.4:8080", "10.0.1.5:8080", "10.0.1.6:8080",
            "10.0.1.7:8080", "10.0.1.8:8080",
        ]

        [[perimeters]]
        name = "edge"

        [[perimeters.rules]]
        priority = 100
        direction = "inbound"
        action = "allow"
        protocol = "tcp"
        ports = "80"
        source = "*"
        destination = "*"

        [[perimeters.rules]]
        priority = 110
        direction = "inbound"
        action = "allow"
        protocol = "tcp"
        ports = "443"
        source = "*"
        destination = "*"

        [[perimeters.rules]]
        priority = 120
        direction = "inbound"
        action = "allow"
        protocol = "tcp"
        ports = "22"
        source = "10.0.0.0/16"
        destination = "*"

        [[perimeters.rules]]
        priority = 4000
        direction = "inbound"
        action = "deny"
        protocol = "*"
        ports = "*"
        source = "*"
        destination = "*"
    "#;
    toml::from_str(raw).unwrap()
}

fn inbound_tcp(port: u16, source: &str) -> AccessRequest {
    AccessRequest {
        direction: Direction::Inbound,
        protocol: Protocol::Tcp,
        port,
        source: source.parse().unwrap(),
        destination: "10.0.1.4".parse().unwrap(),
    }
}

#[test]
fn web_rule_set_matches_original_deployment_shape() {
    let config = web_fleet_config();
    assert!(validate_config(&config).is_ok());

    let set = PerimeterSet::from_config(&config.perimeters, 64).unwrap();

    // Web ports open to the world.
    assert_eq!(set.evaluate("edge", &inbound_tcp(80, "203.0.113.5")), Action::Allow);
    assert_eq!(set.evaluate("edge", &inbound_tcp(443, "203.0.113.5")), Action::Allow);

    // Management port only from the management prefix.
    assert_eq!(set.evaluate("edge", &inbound_tcp(22, "10.0.44.9")), Action::Allow);
    assert_eq!(set.evaluate("edge", &inbound_tcp(22, "203.0.113.5")), Action::Deny);

    // Forbidden service ports fall to the catch-all.
    for port in [3389, 5432, 3306, 1433, 6379, 27017] {
        assert_eq!(
            set.evaluate("edge", &inbound_tcp(port, "203.0.113.5")),
            Action::Deny,
            "port {} should be denied",
            port
        );
    }

    // Every evaluation was recorded for audit.
    assert_eq!(set.recent_decisions(100).len(), 10);
}

#[test]
fn evaluation_is_deterministic_for_fixed_rule_set() {
    let config = web_fleet_config();
    let set = PerimeterSet::from_config(&config.perimeters, 64).unwrap();

    let request = inbound_tcp(22, "203.0.113.5");
    let first = set.evaluate("edge", &request);
    for _ in 0..50 {
        assert_eq!(set.evaluate("edge", &request), first);
    }
}

#[test]
fn duplicate_priority_fails_validation_before_startup() {
    let mut config = web_fleet_config();
    let mut dup = config.perimeters[0].rules[0].clone();
    dup.priority = 110;
    config.perimeters[0].rules.push(dup);

    let errors = validate_config(&config).unwrap_err();
    assert!(errors.iter().any(|e| matches!(
        e,
        ValidationError::DuplicateRulePriority { priority: 110, .. }
    )));
}

fn admin_state(perimeters: Arc<PerimeterSet>) -> AdminState {
    AdminState {
        roster: Arc::new(FleetRoster::new()),
        pool: Arc::new(BackendPool::new(
            fleet_control::config::schema::StrategyKind::RoundRobin,
        )),
        perimeters,
        last_action: Arc::new(ArcSwapOption::empty()),
        profile: ScaleProfile {
            min: 1,
            default_size: 2,
            max: 5,
        },
        api_key: "test-key".to_string(),
    }
}

#[tokio::test]
async fn admin_api_requires_bearer_token() {
    let config = web_fleet_config();
    let set = Arc::new(PerimeterSet::from_config(&config.perimeters, 64).unwrap());
    let app = setup_admin_router(admin_state(set));

    let unauthenticated = app
        .clone()
        .oneshot(
            Request::get("/admin/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    let authenticated = app
        .oneshot(
            Request::get("/admin/status")
                .header("Authorization", "Bearer test-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(authenticated.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_evaluate_endpoint_judges_requests() {
    let config = web_fleet_config();
    let set = Arc::new(PerimeterSet::from_config(&config.perimeters, 64).unwrap());
    let app = setup_admin_router(admin_state(set));

    let body = serde_json::json!({
        "perimeter": "edge",
        "direction": "inbound",
        "protocol": "tcp",
        "port": 22,
        "source": "203.0.113.5",
        "destination": "10.0.1.4",
    });
    let response = app
        .oneshot(
            Request::post("/admin/perimeter/evaluate")
                .header("Authorization", "Bearer test-key")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["action"], "deny");
}
