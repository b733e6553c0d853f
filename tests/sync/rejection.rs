use offline_outbox::{CommandStatus, CommandStore, DeliveryError, DrainOutcome};

use crate::support::{workspace, Harness, Observed};

#[tokio::test]
async fn rejection_does_not_block_later_commands() {
    let h = Harness::new();
    let ws = workspace("store-12");
    let a = h.enqueue(&ws, "sale.recorded", "A");
    h.enqueue(&ws, "sale.recorded", "B");
    h.enqueue(&ws, "sale.recorded", "C");
    h.remote.reply("A", Err(DeliveryError::non_retryable("sku retired")));

    let result = h.engine.drain(&ws).await.unwrap();
    assert_eq!(result.outcome, DrainOutcome::Drained);
    assert_eq!(result.rejected, 1);
    assert_eq!(result.delivered, 2);
    assert_eq!(h.remote.applied(), vec!["B", "C"]);
    assert_eq!(h.engine.store().count(&ws).unwrap(), 0);

    let archived = h.engine.store().rejected(&ws).unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].id, a);
    assert_eq!(archived[0].status, CommandStatus::Done);
    assert_eq!(archived[0].last_error.as_deref(), Some("sku retired"));

    let by_id = h.engine.store().get(a).unwrap().unwrap();
    assert!(by_id.is_done());

    assert!(h
        .observer
        .events()
        .contains(&Observed::Rejected("A".into(), "sku retired".into())));
}

#[tokio::test]
async fn rejected_command_is_never_retried() {
    let h = Harness::new();
    let ws = workspace("store-12");
    h.enqueue(&ws, "sale.recorded", "A");
    h.remote.reply("A", Err(DeliveryError::non_retryable("price below cost")));

    h.engine.drain(&ws).await.unwrap();
    h.tick(3_600_000);
    let again = h.engine.drain(&ws).await.unwrap();

    assert_eq!(again.outcome, DrainOutcome::Empty);
    assert_eq!(h.remote.keys(), vec!["A"]);
    assert!(h.remote.applied().is_empty());
}

#[tokio::test]
async fn rejection_after_retries_keeps_attempt_count() {
    let h = Harness::new();
    let ws = workspace("store-12");
    let a = h.enqueue(&ws, "sale.recorded", "A");
    h.remote.reply("A", Err(DeliveryError::retryable("503")));
    h.remote.reply("A", Err(DeliveryError::non_retryable("void window closed")));

    h.engine.drain(&ws).await.unwrap();
    h.tick(60_000);
    h.engine.drain(&ws).await.unwrap();

    let archived = h.engine.store().get(a).unwrap().unwrap();
    assert_eq!(archived.attempt_count, 2);
    assert_eq!(archived.next_attempt_at, None);
    assert_eq!(h.engine.store().count(&ws).unwrap(), 0);
}
