use offline_outbox::{
    CommandPayload, CommandStatus, CommandStore, DeliveryError, IdempotencyKey, StoreError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::support::{workspace, Harness};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
enum PosCommand {
    #[serde(rename = "sale.recorded")]
    SaleRecorded { sale_id: String, total_cents: i64 },
    #[serde(rename = "drawer.closed")]
    DrawerClosed,
}

impl CommandPayload for PosCommand {
    fn command_type(&self) -> &'static str {
        match self {
            PosCommand::SaleRecorded { .. } => "sale.recorded",
            PosCommand::DrawerClosed => "drawer.closed",
        }
    }
}

#[test]
fn enqueue_never_touches_the_remote() {
    let h = Harness::new();
    let ws = workspace("store-12");
    for i in 0..3 {
        h.enqueue(&ws, "sale.recorded", &format!("sale-{i}"));
    }
    assert_eq!(h.engine.store().count(&ws).unwrap(), 3);
    assert!(h.remote.requests().is_empty());
}

#[test]
fn duplicate_key_in_one_workspace_is_refused() {
    let h = Harness::new();
    let ws = workspace("store-12");
    h.enqueue(&ws, "sale.recorded", "sale-1");

    let err = h
        .engine
        .outbox()
        .enqueue(ws.clone(), "sale.recorded", json!({}), "sale-1")
        .unwrap_err();
    match err {
        StoreError::DuplicateIdempotencyKey {
            workspace_id,
            idempotency_key,
        } => {
            assert_eq!(workspace_id, ws);
            assert_eq!(idempotency_key, IdempotencyKey::new("sale-1"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.engine.store().count(&ws).unwrap(), 1);
}

#[test]
fn same_key_in_another_workspace_is_independent() {
    let h = Harness::new();
    h.enqueue(&workspace("north"), "sale.recorded", "sale-1");
    h.enqueue(&workspace("south"), "sale.recorded", "sale-1");
    assert_eq!(h.engine.store().count(&workspace("south")).unwrap(), 1);
}

#[tokio::test]
async fn key_stays_taken_while_retrying_and_frees_up_when_done() {
    let h = Harness::new();
    let ws = workspace("store-12");
    h.enqueue(&ws, "sale.recorded", "sale-1");
    h.remote.reply("sale-1", Err(DeliveryError::retryable("503")));
    h.engine.drain(&ws).await.unwrap();

    let outbox = h.engine.outbox();
    assert!(matches!(
        outbox.enqueue(ws.clone(), "sale.recorded", json!({}), "sale-1"),
        Err(StoreError::DuplicateIdempotencyKey { .. })
    ));

    h.tick(60_000);
    h.engine.drain(&ws).await.unwrap();
    assert_eq!(h.engine.store().count(&ws).unwrap(), 0);
    outbox
        .enqueue(ws.clone(), "sale.recorded", json!({}), "sale-1")
        .unwrap();
}

#[tokio::test]
async fn typed_payload_reaches_the_remote_intact() {
    let h = Harness::new();
    let ws = workspace("store-12");
    let sale = PosCommand::SaleRecorded {
        sale_id: "S-1001".into(),
        total_cents: 4_250,
    };
    let id = h
        .engine
        .outbox()
        .enqueue_typed(ws.clone(), &sale, IdempotencyKey::generate())
        .unwrap();
    h.engine
        .outbox()
        .enqueue_typed(ws.clone(), &PosCommand::DrawerClosed, "close-1")
        .unwrap();

    let stored = h.engine.store().get(id).unwrap().unwrap();
    assert_eq!(stored.status, CommandStatus::Pending);
    assert_eq!(stored.command_type, "sale.recorded");

    h.engine.drain(&ws).await.unwrap();
    let requests = h.remote.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].idempotency_key, stored.idempotency_key.as_str());
    assert_eq!(requests[0].payload_as::<PosCommand>().unwrap(), sale);
    assert_eq!(
        requests[1].payload_as::<PosCommand>().unwrap(),
        PosCommand::DrawerClosed
    );
}
