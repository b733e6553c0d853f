use std::sync::Arc;
use std::time::Duration;

use offline_outbox::{CommandStore, DrainOutcome};

use crate::support::{workspace, Harness, ScriptedEndpoint};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn trigger_storm_runs_one_drain_at_a_time() {
    let h = Arc::new(Harness::with_remote(
        ScriptedEndpoint::new().with_latency(Duration::from_millis(5)),
    ));
    let ws = workspace("store-12");
    let keys: Vec<String> = (0..5).map(|i| format!("sale-{i}")).collect();
    for key in &keys {
        h.enqueue(&ws, "sale.recorded", key);
    }

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let h = Arc::clone(&h);
        let ws = ws.clone();
        tasks.push(tokio::spawn(async move { h.engine.drain(&ws).await.unwrap() }));
    }
    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }

    assert_eq!(h.remote.max_concurrent(), 1);
    assert_eq!(h.remote.keys(), keys);
    assert_eq!(h.remote.applied(), keys);
    assert_eq!(results.iter().map(|r| r.delivered).sum::<usize>(), 5);
    assert!(results
        .iter()
        .any(|r| r.outcome == DrainOutcome::LockUnavailable));
    assert!(!h.engine.lock().is_held(&ws).unwrap());
    assert_eq!(h.engine.store().count(&ws).unwrap(), 0);
}

#[tokio::test]
async fn different_workspaces_drain_in_parallel() {
    let h = Harness::with_remote(ScriptedEndpoint::new().with_latency(Duration::from_millis(20)));
    let north = workspace("north");
    let south = workspace("south");
    h.enqueue(&north, "sale.recorded", "n1");
    h.enqueue(&south, "sale.recorded", "s1");

    let (a, b) = tokio::join!(h.engine.drain(&north), h.engine.drain(&south));
    assert_eq!(a.unwrap().delivered, 1);
    assert_eq!(b.unwrap().delivered, 1);
    assert_eq!(h.remote.max_concurrent(), 2);
}

#[tokio::test]
async fn cancelled_drain_releases_the_lock() {
    let h = Harness::with_remote(ScriptedEndpoint::new().with_latency(Duration::from_secs(60)));
    let ws = workspace("store-12");
    let id = h.enqueue(&ws, "sale.recorded", "sale-1");

    let attempt = tokio::time::timeout(Duration::from_millis(20), h.engine.drain(&ws)).await;
    assert!(attempt.is_err());

    assert!(!h.engine.lock().is_held(&ws).unwrap());
    let stranded = h.engine.store().get(id).unwrap().unwrap();
    assert!(stranded.is_in_flight());
    assert_eq!(h.engine.recover().unwrap(), 1);
    assert!(h.engine.store().get(id).unwrap().unwrap().is_pending());
}
