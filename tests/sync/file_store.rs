use std::fs;
use std::sync::Arc;

use chrono::Duration;
use offline_outbox::{
    CommandStatus, CommandStore, DrainOutcome, FileCommandStore, InMemorySyncLock, OutboxCommand,
    StoreError, SyncEngine, WorkspaceId,
};
use serde_json::json;
use tempfile::tempdir;

use crate::support::{start_time, workspace, ScriptedEndpoint};

fn sale(ws: &WorkspaceId, key: &str, offset_secs: i64) -> OutboxCommand {
    OutboxCommand::new(
        ws.clone(),
        "sale.recorded",
        json!({ "totalCents": 1250, "key": key }),
        key,
        start_time() + Duration::seconds(offset_secs),
    )
}

#[test]
fn queue_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pos").join("outbox.jsonl");
    let ws = workspace("store-12");
    let t0 = start_time();

    let (a, b) = {
        let store = FileCommandStore::open(path.clone()).unwrap();
        let a = store.enqueue(sale(&ws, "sale-1", 0)).unwrap();
        let b = store.enqueue(sale(&ws, "sale-2", 1)).unwrap();
        store.mark_in_flight(a).unwrap();
        store
            .mark_failed(a, "503", t0 + Duration::seconds(10))
            .unwrap();
        (a, b)
    };

    let store = FileCommandStore::open(path.clone()).unwrap();
    assert_eq!(store.count(&ws).unwrap(), 2);

    let failed = store.get(a).unwrap().unwrap();
    assert_eq!(failed.status, CommandStatus::Failed);
    assert_eq!(failed.attempt_count, 1);
    assert_eq!(failed.last_error.as_deref(), Some("503"));
    assert_eq!(failed.next_attempt_at, Some(t0 + Duration::seconds(10)));

    let waiting = store.list_pending(&ws, t0 + Duration::seconds(5)).unwrap();
    let ids: Vec<_> = waiting.commands.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![b]);
    assert_eq!(waiting.blocked.map(|head| head.id), Some(a));
    assert!(waiting.deliverable().is_empty());

    assert!(matches!(
        store.enqueue(sale(&ws, "sale-2", 2)),
        Err(StoreError::DuplicateIdempotencyKey { .. })
    ));

    // Same timestamp as b: enqueue order must still hold after reopening.
    let c = store.enqueue(sale(&ws, "sale-3", 1)).unwrap();
    let due = store.list_pending(&ws, t0 + Duration::seconds(20)).unwrap();
    let ids: Vec<_> = due.commands.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![a, b, c]);
}

#[test]
fn rejected_archive_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("outbox.jsonl");
    let ws = workspace("store-12");

    let id = {
        let store = FileCommandStore::open(path.clone()).unwrap();
        let id = store.enqueue(sale(&ws, "sale-1", 0)).unwrap();
        store.mark_in_flight(id).unwrap();
        store.mark_rejected(id, "card declined").unwrap();
        id
    };

    let store = FileCommandStore::open(path).unwrap();
    assert_eq!(store.count(&ws).unwrap(), 0);
    assert!(store.workspaces().unwrap().is_empty());
    let archived = store.rejected(&ws).unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].id, id);
    assert_eq!(archived[0].last_error.as_deref(), Some("card declined"));
}

#[test]
fn corrupt_lines_do_not_block_the_queue() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("outbox.jsonl");
    let ws = workspace("store-12");

    let (a, b) = {
        let store = FileCommandStore::open(path.clone()).unwrap();
        (
            store.enqueue(sale(&ws, "sale-1", 0)).unwrap(),
            store.enqueue(sale(&ws, "sale-2", 1)).unwrap(),
        )
    };

    let text = fs::read_to_string(&path).unwrap();
    let mut text = text.replacen("\"status\":\"PENDING\"", "\"status\":\"LOST\"", 1);
    text.push_str("{not json\n");
    fs::write(&path, text).unwrap();

    let store = FileCommandStore::open(path.clone()).unwrap();
    let batch = store.list_pending(&ws, start_time()).unwrap();
    let ids: Vec<_> = batch.commands.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![b]);
    assert_eq!(batch.corrupt.len(), 1);
    assert_eq!(batch.corrupt[0].id, a.to_string());
    assert_eq!(store.count(&ws).unwrap(), 2);
    assert!(matches!(store.get(a), Err(StoreError::Corrupt(_))));

    store.mark_in_flight(b).unwrap();
    store.mark_done(b).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("{not json"));
    assert!(text.contains("\"status\":\"LOST\""));
    assert!(!path.with_file_name("outbox.jsonl.tmp").exists());
}

#[tokio::test]
async fn engine_drains_a_file_backed_queue() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("outbox.jsonl");
    let ws = workspace("store-12");
    let remote = Arc::new(ScriptedEndpoint::new());

    {
        let store = Arc::new(FileCommandStore::open(path.clone()).unwrap());
        let engine = SyncEngine::new(store, InMemorySyncLock::new(), Arc::clone(&remote));
        let outbox = engine.outbox();
        for key in ["sale-1", "sale-2"] {
            outbox
                .enqueue(ws.clone(), "sale.recorded", json!({}), key)
                .unwrap();
        }
        let result = engine.drain(&ws).await.unwrap();
        assert_eq!(result.outcome, DrainOutcome::Drained);
    }

    let store = FileCommandStore::open(path).unwrap();
    assert_eq!(store.count(&ws).unwrap(), 0);
    assert_eq!(remote.applied(), vec!["sale-1", "sale-2"]);
}

#[tokio::test]
async fn float_payload_reaches_the_remote_unchanged() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("outbox.jsonl");
    let ws = workspace("store-12");
    let payload = json!({
        "weightKg": 1.0715660391465826e-75,
        "adjustment": -1.81996730402717e-179,
        "lines": [{ "unitPrice": -1.603964615428183e143, "qty": 0.1 }],
    });

    let store = Arc::new(FileCommandStore::open(path.clone()).unwrap());
    store
        .enqueue(OutboxCommand::new(
            ws.clone(),
            "sale.recorded",
            payload.clone(),
            "sale-1",
            start_time(),
        ))
        .unwrap();
    drop(store);

    let remote = Arc::new(ScriptedEndpoint::new());
    let store = Arc::new(FileCommandStore::open(path).unwrap());
    let engine = SyncEngine::new(store, InMemorySyncLock::new(), Arc::clone(&remote));
    engine.drain(&ws).await.unwrap();

    let requests = remote.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].payload, payload);
    assert_eq!(
        requests[0].payload["weightKg"].as_f64(),
        Some(1.0715660391465826e-75)
    );
}

#[test]
fn archive_is_capped_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("outbox.jsonl");
    let ws = workspace("store-12");

    let open = || {
        let store = FileCommandStore::new(path.clone()).with_archive_limit(2);
        store.initialize().unwrap();
        store
    };

    let ids: Vec<_> = {
        let store = open();
        (0..4)
            .map(|n| {
                let id = store.enqueue(sale(&ws, &format!("sale-{n}"), n)).unwrap();
                store.mark_in_flight(id).unwrap();
                store.mark_rejected(id, "card declined").unwrap();
                id
            })
            .collect()
    };

    let store = open();
    let kept: Vec<_> = store.rejected(&ws).unwrap().iter().map(|c| c.id).collect();
    assert_eq!(kept, vec![ids[2], ids[3]]);
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
}
