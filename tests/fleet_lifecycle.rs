//! Probe-driven eligibility and drain semantics across the pool and the
//! controller.

mod common;

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fleet_control::config::schema::{
    FleetSettings, ProbeConfig, RetryConfig, ScaleDirection, StrategyKind,
};
use fleet_control::fleet::{FleetController, FleetRoster, Instance, InstanceState};
use fleet_control::health::HealthProbe;
use fleet_control::lifecycle::Shutdown;
use fleet_control::pool::BackendPool;
use fleet_control::scaler::rules::ScaleIntent;

use common::{start_status_backend, wait_until, MockProvisioner};

/// A failing instance leaves the eligible set after three missed probes and
/// returns after two good ones.
#[tokio::test(flavor = "multi_thread")]
async fn probe_streaks_drive_pool_eligibility() {
    let status = Arc::new(AtomicU16::new(200));
    let addr = start_status_backend(status.clone()).await;

    let roster = Arc::new(FleetRoster::new());
    let pool = Arc::new(BackendPool::new(StrategyKind::RoundRobin));
    let instance = Arc::new(Instance::new(addr, roster.alloc_seq()));
    instance.set_state(InstanceState::Running);
    roster.add(instance.clone());
    pool.register(instance.clone());

    let shutdown = Arc::new(Shutdown::new());
    let probe = Arc::new(HealthProbe::new(
        roster.clone(),
        ProbeConfig {
            interval_secs: 1,
            timeout_secs: 1,
            unhealthy_threshold: 3,
            healthy_threshold: 2,
            ..ProbeConfig::default()
        },
    ));
    tokio::spawn(probe.run(shutdown.clone()));

    // Two consecutive successes admit the instance.
    assert!(
        wait_until(|| pool.eligible().len() == 1, Duration::from_secs(10)).await,
        "instance never became eligible"
    );

    // Three consecutive failures exclude it; with a one-second interval the
    // exclusion lands within three intervals of the first failure.
    status.store(500, Ordering::Relaxed);
    let failing_since = Instant::now();
    assert!(
        wait_until(|| pool.eligible().is_empty(), Duration::from_secs(10)).await,
        "instance never excluded"
    );
    // Exclusion is streak-driven, never a single-probe knee-jerk.
    assert!(failing_since.elapsed() >= Duration::from_millis(1500));

    // Two consecutive successes re-admit it.
    status.store(200, Ordering::Relaxed);
    assert!(
        wait_until(|| pool.eligible().len() == 1, Duration::from_secs(10)).await,
        "instance never re-included"
    );

    shutdown.trigger();
}

/// One request is still in flight when the drain starts: it finishes, and
/// the instance terminates immediately after, not before.
#[tokio::test(flavor = "multi_thread")]
async fn drain_lets_in_flight_request_finish() {
    let roster = Arc::new(FleetRoster::new());
    let pool = Arc::new(BackendPool::new(StrategyKind::RoundRobin));
    let controller = Arc::new(FleetController::new(
        roster.clone(),
        pool.clone(),
        Arc::new(MockProvisioner::new()),
        &FleetSettings {
            min: 0,
            default_size: 1,
            max: 2,
            bootstrap_timeout_secs: 5,
            drain_timeout_secs: 30,
        },
        RetryConfig::default(),
    ));

    assert_eq!(controller.establish_default().await, 1);
    let instance = roster.running().pop().unwrap();
    // Probe path is exercised elsewhere; mark healthy directly so the pool
    // will route to it.
    instance.mark_success(1);

    let guard = pool.select().expect("no routable backend");

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        drop(guard);
    });

    let started = Instant::now();
    controller
        .execute(ScaleIntent::new(ScaleDirection::ScaleIn, 1, 1, "test"))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(instance.state(), InstanceState::Terminated);
    assert_eq!(instance.in_flight(), 0);
    // Waited for the request, then terminated promptly instead of sitting
    // out the 30s drain timeout.
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_secs(5));
}

/// Redelivered intents are no-ops, and interleaved storms keep the bounds.
#[tokio::test(flavor = "multi_thread")]
async fn redelivered_intent_storm_is_idempotent() {
    let roster = Arc::new(FleetRoster::new());
    let pool = Arc::new(BackendPool::new(StrategyKind::RoundRobin));
    let controller = Arc::new(FleetController::new(
        roster.clone(),
        pool,
        Arc::new(MockProvisioner::new()),
        &FleetSettings {
            min: 1,
            default_size: 2,
            max: 4,
            bootstrap_timeout_secs: 5,
            drain_timeout_secs: 1,
        },
        RetryConfig::default(),
    ));
    controller.establish_default().await;

    let out = ScaleIntent::new(ScaleDirection::ScaleOut, 1, 2, "test");
    assert_eq!(controller.execute(out.clone()).await, 1);
    assert_eq!(roster.capacity(), 3);

    // Redelivery after a simulated crash: applied exactly once.
    for _ in 0..5 {
        assert_eq!(controller.execute(out.clone()).await, 0);
    }
    assert_eq!(roster.capacity(), 3);
}
