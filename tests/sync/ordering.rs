use chrono::Duration;
use offline_outbox::{CommandStore, DeliveryError, DrainOutcome, OutboxCommand};
use serde_json::json;

use crate::support::{start_time, workspace, Harness};

#[tokio::test]
async fn delivers_in_enqueue_order_across_types() {
    let h = Harness::new();
    let ws = workspace("store-12");
    let types = [
        "price.overridden",
        "sale.line.added",
        "sale.recorded",
        "drawer.closed",
    ];
    for (i, command_type) in types.iter().enumerate() {
        h.enqueue(&ws, command_type, &format!("k{i}"));
    }

    let result = h.engine.drain(&ws).await.unwrap();
    assert_eq!(result.outcome, DrainOutcome::Drained);
    assert_eq!(result.delivered, 4);

    assert_eq!(h.remote.keys(), vec!["k0", "k1", "k2", "k3"]);
    let delivered: Vec<String> = h
        .remote
        .requests()
        .into_iter()
        .map(|request| request.command_type)
        .collect();
    assert_eq!(delivered, types);
    assert_eq!(h.engine.store().count(&ws).unwrap(), 0);
}

#[tokio::test]
async fn identical_timestamps_keep_enqueue_order() {
    let h = Harness::new();
    let ws = workspace("store-12");
    let outbox = h.engine.outbox();
    for key in ["a", "b", "c", "d", "e"] {
        outbox
            .enqueue(ws.clone(), "sale.recorded", json!({}), key)
            .unwrap();
    }

    h.engine.drain(&ws).await.unwrap();
    assert_eq!(h.remote.keys(), vec!["a", "b", "c", "d", "e"]);
}

#[tokio::test]
async fn created_at_decides_over_insertion_order() {
    let h = Harness::new();
    let ws = workspace("store-12");
    let store = h.engine.store();
    store
        .enqueue(OutboxCommand::new(
            ws.clone(),
            "sale.recorded",
            json!({}),
            "late",
            start_time() - Duration::seconds(1),
        ))
        .unwrap();
    store
        .enqueue(OutboxCommand::new(
            ws.clone(),
            "price.overridden",
            json!({}),
            "early",
            start_time() - Duration::seconds(10),
        ))
        .unwrap();

    h.engine.drain(&ws).await.unwrap();
    assert_eq!(h.remote.keys(), vec!["early", "late"]);
}

#[tokio::test]
async fn a_stuck_workspace_does_not_hold_back_another() {
    let h = Harness::new();
    let north = workspace("north");
    let south = workspace("south");
    let stuck = h.enqueue(&north, "sale.recorded", "n1");
    h.enqueue(&north, "sale.recorded", "n2");
    h.enqueue(&south, "sale.recorded", "s1");
    h.enqueue(&south, "sale.recorded", "s2");
    h.remote.reply("n1", Err(DeliveryError::retryable("gateway timeout")));

    let north_result = h.engine.drain(&north).await.unwrap();
    let south_result = h.engine.drain(&south).await.unwrap();

    assert_eq!(north_result.outcome, DrainOutcome::HardStopped(stuck));
    assert_eq!(south_result.outcome, DrainOutcome::Drained);
    assert_eq!(south_result.delivered, 2);
    assert_eq!(h.remote.applied(), vec!["s1", "s2"]);
}

#[tokio::test]
async fn drain_all_visits_every_workspace() {
    let h = Harness::new();
    h.enqueue(&workspace("north"), "sale.recorded", "n1");
    h.enqueue(&workspace("south"), "sale.recorded", "s1");
    h.enqueue(&workspace("east"), "sale.recorded", "e1");

    let results = h.engine.drain_all().await.unwrap();
    let names: Vec<&str> = results.iter().map(|(ws, _)| ws.as_str()).collect();
    assert_eq!(names, vec!["east", "north", "south"]);
    assert!(results.iter().all(|(_, r)| r.delivered == 1));
    assert!(h.engine.store().workspaces().unwrap().is_empty());
}
