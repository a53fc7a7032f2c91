//! Integration tests spawning the real `feedcore-worker` binary as a
//! subprocess, exercising the scenarios the design calls out by name.

use std::path::PathBuf;
use std::time::Duration;

use feedcore_common::frame::FrameLimits;
use feedcore_common::tracing::TraceManager;
use feedcore_manager::manager::PollEvent;
use feedcore_manager::{Manager, ManagerConfig};
use serde_json::json;

/// Binaries in this workspace share one `target/<profile>` directory, so a
/// test in one package can locate another package's binary by walking up
/// from its own executable path.
fn worker_binary_path() -> PathBuf {
    let mut path = std::env::current_exe().expect("current_exe");
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    let mut candidate = path.join("feedcore-worker");
    if cfg!(windows) {
        candidate.set_extension("exe");
    }
    candidate
}

async fn start_manager(pool_size: u32, job_timeout: Option<Duration>) -> Manager {
    let trace = TraceManager::new().get("test-manager");
    let socket_dir = tempfile::tempdir().unwrap().into_path();
    let config = ManagerConfig {
        pool_size,
        job_timeout,
        worker_binary: worker_binary_path(),
        socket_dir,
        limits: FrameLimits::default(),
        log_dir: None,
    };
    let mut manager = Manager::bind(config, trace).unwrap();
    manager.start().await.unwrap();
    manager
}

/// S1: happy path — two workers each complete one `add` call.
#[tokio::test]
async fn happy_path_both_workers_complete() {
    let mut manager = start_manager(2, None).await;

    let w0 = manager.find_idle_worker().unwrap();
    manager
        .dispatch_on(w0, "add", vec![json!(1), json!(2)], Default::default())
        .await
        .unwrap();
    let w1 = manager.find_idle_worker().unwrap();
    assert_ne!(w0, w1);
    manager
        .dispatch_on(w1, "add", vec![json!(3), json!(4)], Default::default())
        .await
        .unwrap();

    assert_eq!(manager.active_workers(), 2);

    let mut seen = Vec::new();
    while seen.len() < 2 {
        for event in manager.poll(Some(Duration::from_secs(5))).await {
            if let PollEvent::Completed { response, .. } = event {
                seen.push(response.ret.unwrap());
            }
        }
    }
    seen.sort_by(|a, b| a.as_f64().partial_cmp(&b.as_f64()).unwrap());
    assert_eq!(seen, vec![json!(3.0), json!(7.0)]);
    assert_eq!(manager.active_workers(), 0);

    manager.close_all(Duration::from_secs(2)).await;
}

/// S2: a timed-out call replies `Timeout`; the same worker is usable after.
#[tokio::test]
async fn slow_call_times_out_then_worker_recovers() {
    let mut manager = start_manager(1, Some(Duration::from_millis(500))).await;

    let w = manager.find_idle_worker().unwrap();
    manager
        .dispatch_on(w, "sleep", vec![json!(5)], Default::default())
        .await
        .unwrap();

    let events = manager.poll(Some(Duration::from_secs(2))).await;
    let response = match &events[0] {
        PollEvent::Completed { response, .. } => response,
        PollEvent::Respawned { .. } => panic!("expected a timeout reply, not a crash"),
    };
    assert_eq!(response.exc.as_deref(), Some("Timeout"));

    let w = manager.find_idle_worker().expect("worker usable again after timeout");
    manager
        .dispatch_on(w, "sleep", vec![json!(0)], Default::default())
        .await
        .unwrap();
    let events = manager.poll(Some(Duration::from_secs(2))).await;
    match &events[0] {
        PollEvent::Completed { response, .. } => assert!(response.is_ok()),
        PollEvent::Respawned { .. } => panic!("worker should not have crashed"),
    }

    manager.close_all(Duration::from_secs(2)).await;
}

/// S3: dispatching an unregistered method yields `NoSuchMethod`.
#[tokio::test]
async fn unknown_method_yields_no_such_method() {
    let mut manager = start_manager(1, None).await;

    let w = manager.find_idle_worker().unwrap();
    manager.dispatch_on(w, "nope", vec![], Default::default()).await.unwrap();

    let events = manager.poll(Some(Duration::from_secs(2))).await;
    match &events[0] {
        PollEvent::Completed { response, .. } => {
            assert_eq!(response.exc.as_deref(), Some("NoSuchMethod"));
        }
        PollEvent::Respawned { .. } => panic!("unknown method should not crash the worker"),
    }

    manager.close_all(Duration::from_secs(2)).await;
}

/// S4: a child crash is observed as EOF, respawned with the same ID, and no
/// completion callback fires for the lost call.
#[tokio::test]
async fn crash_respawns_with_same_id_and_drops_the_callback() {
    let mut manager = start_manager(1, None).await;

    let dead_worker = manager.find_idle_worker().unwrap();
    manager.dispatch_on(dead_worker, "crash", vec![], Default::default()).await.unwrap();

    let events = manager.poll(Some(Duration::from_secs(2))).await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        PollEvent::Respawned { id } => assert_eq!(*id, dead_worker),
        PollEvent::Completed { .. } => panic!("crash() must not produce a completion"),
    }
    assert_eq!(manager.active_workers(), 0);
    assert_eq!(manager.current_workers(), 1);

    let w = manager.find_idle_worker().expect("respawned worker is idle");
    assert_eq!(w, dead_worker);
    manager
        .dispatch_on(w, "add", vec![json!(1), json!(1)], Default::default())
        .await
        .unwrap();
    let events = manager.poll(Some(Duration::from_secs(2))).await;
    match &events[0] {
        PollEvent::Completed { response, .. } => assert_eq!(response.ret, Some(json!(2.0))),
        PollEvent::Respawned { .. } => panic!("respawned worker should answer normally"),
    }

    manager.close_all(Duration::from_secs(2)).await;
}

/// S5: with every worker busy, `find_idle_worker` returns none until a
/// completion frees one.
#[tokio::test]
async fn oversubscription_blocks_until_a_worker_frees_up() {
    let mut manager = start_manager(2, None).await;

    let w0 = manager.find_idle_worker().unwrap();
    manager.dispatch_on(w0, "sleep", vec![json!(0.2)], Default::default()).await.unwrap();
    let w1 = manager.find_idle_worker().unwrap();
    manager.dispatch_on(w1, "sleep", vec![json!(0.2)], Default::default()).await.unwrap();

    assert!(manager.find_idle_worker().is_none());

    let events = manager.poll(Some(Duration::from_secs(2))).await;
    assert!(!events.is_empty());
    assert!(manager.find_idle_worker().is_some());

    manager.close_all(Duration::from_secs(2)).await;
}

/// S6: `close_all` drains an in-flight job before its deadline, and is
/// idempotent.
#[tokio::test]
async fn close_all_drains_in_flight_job_and_is_idempotent() {
    let mut manager = start_manager(1, None).await;

    let w = manager.find_idle_worker().unwrap();
    manager.dispatch_on(w, "sleep", vec![json!(0.2)], Default::default()).await.unwrap();

    manager.close_all(Duration::from_secs(1)).await;
    assert_eq!(manager.active_workers(), 0);

    // Idempotent: a second call finds no busy handles and returns promptly.
    manager.close_all(Duration::from_secs(1)).await;
}
