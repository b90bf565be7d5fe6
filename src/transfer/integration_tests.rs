//! Scenario tests for the transfer lifecycle
//!
//! Full engine flows on the in-memory store with a recording sink.

use std::sync::Arc;

use crate::transfer::coordinator::TransferCoordinator;
use crate::transfer::error::TransferError;
use crate::transfer::events::TransferEventType;
use crate::transfer::sink::{RecordingEventSink, event_channel};
use crate::transfer::state::{ItemStatus, TransferStatus};
use crate::transfer::store::{InMemoryTransferStore, TransferStore};
use crate::transfer::transitions::transfer_targets;
use crate::transfer::types::{NewTransferItem, NewTransferRequest, TransferId, TransferRequest};
use crate::transfer::validation::BasicTransferValidator;

struct TestHarness {
    coordinator: TransferCoordinator,
    store: Arc<InMemoryTransferStore>,
    sink: Arc<RecordingEventSink>,
}

impl TestHarness {
    fn new() -> Self {
        let store = Arc::new(InMemoryTransferStore::new());
        let sink = Arc::new(RecordingEventSink::new());
        let coordinator = TransferCoordinator::new(
            store.clone(),
            Arc::new(BasicTransferValidator::new()),
            sink.clone(),
        );
        Self {
            coordinator,
            store,
            sink,
        }
    }

    async fn create(&self, item_count: usize) -> TransferRequest {
        let items = (0..item_count)
            .map(|i| NewTransferItem::new(format!("SKU-{}", i), 5))
            .collect();
        self.coordinator
            .create(NewTransferRequest::new("WH-EAST-01", "WH-WEST-02", items))
            .await
            .unwrap()
    }

    /// Created, approved and picking
    async fn picking(&self, item_count: usize) -> TransferRequest {
        let transfer = self.create(item_count).await;
        self.coordinator.submit_for_approval(transfer.id).await.unwrap();
        self.coordinator.approve(transfer.id).await.unwrap();
        self.coordinator.start_picking(transfer.id).await.unwrap()
    }

    /// Move every item to `status`, returning the final aggregate
    async fn set_all_items(&self, id: TransferId, status: ItemStatus) -> TransferRequest {
        let mut transfer = self.coordinator.get(id).await.unwrap();
        for item_id in transfer.items.iter().map(|i| i.id).collect::<Vec<_>>() {
            transfer = self
                .coordinator
                .update_item_status(id, item_id, status)
                .await
                .unwrap();
        }
        transfer
    }

    async fn ready_for_pickup(&self, item_count: usize) -> TransferRequest {
        let transfer = self.picking(item_count).await;
        self.set_all_items(transfer.id, ItemStatus::Picked).await;
        self.set_all_items(transfer.id, ItemStatus::Packed).await
    }

    fn status_events(&self, status: TransferStatus) -> usize {
        self.sink
            .events()
            .iter()
            .filter(|e| e.event_type != TransferEventType::TransferCreated && e.status == status)
            .count()
    }
}

// ============================================================================
// Happy Path
// ============================================================================

#[tokio::test]
async fn test_full_lifecycle() {
    let harness = TestHarness::new();
    let transfer = harness.ready_for_pickup(2).await;
    assert_eq!(transfer.status, TransferStatus::ReadyForPickup);

    let in_transit = harness
        .coordinator
        .record_pickup(transfer.id, "FastFreight", "FF-123456", Some("https://labels/1"))
        .await
        .unwrap();
    assert_eq!(in_transit.status, TransferStatus::InTransit);
    assert!(in_transit.actual_pickup_date.is_some());
    assert_eq!(in_transit.shipping_carrier.as_deref(), Some("FastFreight"));
    assert!(in_transit.all_items_in(ItemStatus::InTransit));

    let arrived = harness.coordinator.record_arrival(transfer.id).await.unwrap();
    assert_eq!(arrived.status, TransferStatus::Arrived);
    assert!(arrived.actual_delivery_date.is_some());
    assert!(arrived.all_items_in(ItemStatus::Arrived));

    harness.coordinator.verify(transfer.id).await.unwrap();
    let completed = harness.coordinator.complete(transfer.id).await.unwrap();
    assert_eq!(completed.status, TransferStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.actual_pickup_date, in_transit.actual_pickup_date);
    assert!(completed.all_items_in(ItemStatus::Completed));
    assert_eq!(
        harness.coordinator.get(transfer.id).await.unwrap().item_statuses().collect::<Vec<_>>(),
        vec![ItemStatus::Completed, ItemStatus::Completed]
    );

    let types: Vec<TransferEventType> = harness.sink.events().iter().map(|e| e.event_type).collect();
    assert_eq!(types.first(), Some(&TransferEventType::TransferCreated));
    assert_eq!(types.last(), Some(&TransferEventType::TransferCompleted));
    // created + 9 status changes
    assert_eq!(types.len(), 10);
}

#[tokio::test]
async fn test_arrival_sets_date_and_items() {
    let harness = TestHarness::new();
    let transfer = harness.ready_for_pickup(3).await;
    harness
        .coordinator
        .record_pickup(transfer.id, "DHL", "JD0001", None)
        .await
        .unwrap();

    let arrived = harness.coordinator.record_arrival(transfer.id).await.unwrap();
    assert_eq!(arrived.status, TransferStatus::Arrived);
    assert!(arrived.actual_delivery_date.is_some());
    assert!(arrived.items.iter().all(|i| i.status == ItemStatus::Arrived));
}

// ============================================================================
// Cascade
// ============================================================================

#[tokio::test]
async fn test_all_items_picked_cascades_to_packing_once() {
    let harness = TestHarness::new();
    let transfer = harness.picking(4).await;
    let ids: Vec<_> = transfer.items.iter().map(|i| i.id).collect();

    for (n, item_id) in ids.iter().enumerate() {
        let updated = harness
            .coordinator
            .update_item_status(transfer.id, *item_id, ItemStatus::Picked)
            .await
            .unwrap();
        let expected = if n + 1 == ids.len() {
            TransferStatus::Packing
        } else {
            TransferStatus::Picking
        };
        assert_eq!(updated.status, expected, "after {} items picked", n + 1);
    }

    assert_eq!(harness.status_events(TransferStatus::Packing), 1);
}

#[tokio::test]
async fn test_last_picked_item_promotes_request() {
    let harness = TestHarness::new();
    let transfer = harness.picking(2).await;
    let first = transfer.items[0].id;
    let second = transfer.items[1].id;

    let partial = harness
        .coordinator
        .update_item_status(transfer.id, first, ItemStatus::Picked)
        .await
        .unwrap();
    assert_eq!(partial.status, TransferStatus::Picking);

    let packing = harness
        .coordinator
        .update_item_status(transfer.id, second, ItemStatus::Picked)
        .await
        .unwrap();
    assert_eq!(packing.status, TransferStatus::Packing);

    let event = harness.sink.events().pop().unwrap();
    assert_eq!(event.event_type, TransferEventType::TransferStatusChanged);
    assert_eq!(event.previous_status(), Some(TransferStatus::Picking));
}

#[tokio::test]
async fn test_all_items_cancelled_cascades_to_cancelled() {
    let harness = TestHarness::new();
    let transfer = harness.picking(3).await;

    let cancelled = harness
        .set_all_items(transfer.id, ItemStatus::Cancelled)
        .await;
    assert_eq!(cancelled.status, TransferStatus::Cancelled);

    let last = harness.sink.events().pop().unwrap();
    assert_eq!(last.event_type, TransferEventType::TransferCancelled);
    assert_eq!(harness.status_events(TransferStatus::Cancelled), 1);
}

#[tokio::test]
async fn test_partial_items_do_not_cascade() {
    let harness = TestHarness::new();
    let transfer = harness.picking(2).await;

    let updated = harness.set_all_items(transfer.id, ItemStatus::Partial).await;
    assert_eq!(updated.status, TransferStatus::Picking);
    assert!(updated.all_items_in(ItemStatus::Partial));
}

#[tokio::test]
async fn test_unreachable_cascade_rejects_item_update() {
    let harness = TestHarness::new();
    let transfer = harness.ready_for_pickup(2).await;
    let in_transit = harness
        .coordinator
        .record_pickup(transfer.id, "DHL", "JD0010", None)
        .await
        .unwrap();
    let first = in_transit.items[0].id;
    let second = in_transit.items[1].id;

    let mixed = harness
        .coordinator
        .update_item_status(transfer.id, first, ItemStatus::Arrived)
        .await
        .unwrap();
    assert_eq!(mixed.status, TransferStatus::InTransit);
    let events_before = harness.sink.len();

    // All ARRIVED derives VERIFYING, which IN_TRANSIT cannot reach
    let err = harness
        .coordinator
        .update_item_status(transfer.id, second, ItemStatus::Arrived)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransferError::InvalidStateTransition {
            from: TransferStatus::InTransit,
            to: TransferStatus::Verifying,
        }
    );

    let reloaded = harness.coordinator.get(transfer.id).await.unwrap();
    assert_eq!(reloaded, mixed);
    assert_eq!(reloaded.item(second).unwrap().status, ItemStatus::InTransit);
    assert_eq!(harness.sink.len(), events_before);

    // The regular route still works
    let arrived = harness.coordinator.record_arrival(transfer.id).await.unwrap();
    assert!(arrived.all_items_in(ItemStatus::Arrived));
}

#[tokio::test]
async fn test_item_cascade_to_in_transit_needs_tracking_update() {
    let harness = TestHarness::new();
    let transfer = harness.ready_for_pickup(2).await;

    let in_transit = harness
        .set_all_items(transfer.id, ItemStatus::InTransit)
        .await;
    assert_eq!(in_transit.status, TransferStatus::InTransit);
    assert!(in_transit.actual_pickup_date.is_some());
    assert!(in_transit.shipping_carrier.is_none());
    assert!(in_transit.tracking_number.is_none());

    let tracked = harness
        .coordinator
        .update_tracking_info(transfer.id, "FastFreight", "FF-777", Some("https://labels/7"))
        .await
        .unwrap();
    assert_eq!(tracked.status, TransferStatus::InTransit);
    assert_eq!(tracked.shipping_carrier.as_deref(), Some("FastFreight"));
    assert_eq!(tracked.tracking_number.as_deref(), Some("FF-777"));
    assert_eq!(tracked.shipping_label_url.as_deref(), Some("https://labels/7"));
    assert_eq!(tracked.actual_pickup_date, in_transit.actual_pickup_date);
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn test_approve_from_draft_fails() {
    let harness = TestHarness::new();
    let transfer = harness.create(1).await;

    let err = harness.coordinator.approve(transfer.id).await.unwrap_err();
    assert_eq!(
        err,
        TransferError::InvalidStateTransition {
            from: TransferStatus::Draft,
            to: TransferStatus::Approved,
        }
    );

    let reloaded = harness.coordinator.get(transfer.id).await.unwrap();
    assert_eq!(reloaded, transfer);
}

#[tokio::test]
async fn test_illegal_pairs_leave_state_unchanged() {
    let harness = TestHarness::new();
    let transfer = harness.create(1).await;
    let allowed = transfer_targets(TransferStatus::Draft);

    for target in TransferStatus::ALL {
        if allowed.contains(&target) {
            continue;
        }
        let err = harness
            .coordinator
            .update_status(transfer.id, target)
            .await
            .unwrap_err();
        assert!(err.is_validation(), "DRAFT -> {} should be rejected", target);

        let reloaded = harness.coordinator.get(transfer.id).await.unwrap();
        assert_eq!(reloaded.status, TransferStatus::Draft);
        assert_eq!(reloaded.version, transfer.version);
    }
    assert_eq!(harness.sink.len(), 1);
}

#[tokio::test]
async fn test_terminal_states_reject_everything() {
    let harness = TestHarness::new();

    let cancelled = harness.create(2).await;
    harness.coordinator.cancel(cancelled.id).await.unwrap();

    let rejected = harness.create(1).await;
    harness.coordinator.submit_for_approval(rejected.id).await.unwrap();
    harness.coordinator.reject(rejected.id).await.unwrap();

    for id in [cancelled.id, rejected.id] {
        let before = harness.coordinator.get(id).await.unwrap();
        assert!(before.status.is_terminal());

        for target in TransferStatus::ALL {
            assert!(harness.coordinator.update_status(id, target).await.is_err());
        }
        assert!(harness.coordinator.cancel(id).await.is_err());
        assert!(
            harness
                .coordinator
                .record_pickup(id, "DHL", "X1", None)
                .await
                .is_err()
        );
        assert!(
            harness
                .coordinator
                .update_tracking_info(id, "DHL", "X2", None)
                .await
                .is_err()
        );
        assert!(
            harness
                .coordinator
                .update_item_status(id, before.items[0].id, ItemStatus::Picking)
                .await
                .is_err()
        );

        let after = harness.coordinator.get(id).await.unwrap();
        assert_eq!(after, before);
    }
}

#[tokio::test]
async fn test_cancel_not_allowed_in_transit() {
    let harness = TestHarness::new();
    let transfer = harness.ready_for_pickup(1).await;
    harness
        .coordinator
        .record_pickup(transfer.id, "DHL", "JD0002", None)
        .await
        .unwrap();

    let err = harness.coordinator.cancel(transfer.id).await.unwrap_err();
    assert_eq!(
        err,
        TransferError::InvalidStateTransition {
            from: TransferStatus::InTransit,
            to: TransferStatus::Cancelled,
        }
    );
}

#[tokio::test]
async fn test_cancel_spares_completed_items() {
    let harness = TestHarness::new();
    let transfer = harness.picking(2).await;
    let item_id = transfer.items[0].id;
    for status in [ItemStatus::Exception, ItemStatus::Completed] {
        harness
            .coordinator
            .update_item_status(transfer.id, item_id, status)
            .await
            .unwrap();
    }

    let cancelled = harness.coordinator.cancel(transfer.id).await.unwrap();
    assert_eq!(cancelled.item(item_id).unwrap().status, ItemStatus::Completed);
    assert_eq!(cancelled.items[1].status, ItemStatus::Cancelled);
}

// ============================================================================
// Exception Recovery and Tracking
// ============================================================================

#[tokio::test]
async fn test_exception_recovery_keeps_pickup_date() {
    let harness = TestHarness::new();
    let transfer = harness.ready_for_pickup(1).await;
    let first = harness
        .coordinator
        .record_pickup(transfer.id, "DHL", "JD0003", None)
        .await
        .unwrap();

    harness.coordinator.flag_exception(transfer.id).await.unwrap();
    let resumed = harness
        .coordinator
        .record_pickup(transfer.id, "UPS", "1Z0004", None)
        .await
        .unwrap();

    assert_eq!(resumed.status, TransferStatus::InTransit);
    assert_eq!(resumed.actual_pickup_date, first.actual_pickup_date);
    assert_eq!(resumed.shipping_carrier.as_deref(), Some("UPS"));
}

#[tokio::test]
async fn test_tracking_correction_emits_nothing() {
    let harness = TestHarness::new();
    let transfer = harness.ready_for_pickup(1).await;
    harness
        .coordinator
        .record_pickup(transfer.id, "DHL", "JD0005", Some("https://labels/5"))
        .await
        .unwrap();
    let events_before = harness.sink.len();

    let corrected = harness
        .coordinator
        .update_tracking_info(transfer.id, "DHL Express", "JD0005-B", None)
        .await
        .unwrap();

    assert_eq!(corrected.tracking_number.as_deref(), Some("JD0005-B"));
    assert_eq!(corrected.shipping_label_url.as_deref(), Some("https://labels/5"));
    assert_eq!(corrected.status, TransferStatus::InTransit);
    assert_eq!(harness.sink.len(), events_before);
}

// ============================================================================
// Persistence and Concurrency
// ============================================================================

#[tokio::test]
async fn test_reference_number_round_trip() {
    let harness = TestHarness::new();
    let transfer = harness.create(1).await;

    let by_reference = harness
        .coordinator
        .get_by_reference_number(&transfer.reference_number)
        .await
        .unwrap();
    assert_eq!(by_reference, harness.coordinator.get(transfer.id).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_cancel_single_winner() {
    let harness = TestHarness::new();
    let transfer = harness.create(2).await;

    let (a, b) = tokio::join!(
        harness.coordinator.cancel(transfer.id),
        harness.coordinator.cancel(transfer.id)
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(loser.is_conflict() || loser.is_validation());
    assert_eq!(harness.status_events(TransferStatus::Cancelled), 1);
}

#[tokio::test]
async fn test_stale_save_is_conflict() {
    let harness = TestHarness::new();
    let transfer = harness.create(1).await;
    let stale = harness.store.load(transfer.id).await.unwrap().unwrap();

    harness.coordinator.cancel(transfer.id).await.unwrap();

    let mut second = stale;
    second.status = TransferStatus::Cancelled;
    let err = harness.store.save(second).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_failing_sink_does_not_fail_operation() {
    let harness = TestHarness::new();
    let transfer = harness.create(1).await;
    harness.sink.set_fail(true);

    let submitted = harness
        .coordinator
        .submit_for_approval(transfer.id)
        .await
        .unwrap();
    assert_eq!(submitted.status, TransferStatus::PendingApproval);
    assert_eq!(
        harness.coordinator.get(transfer.id).await.unwrap().status,
        TransferStatus::PendingApproval
    );
    assert_eq!(harness.sink.len(), 1);
}

#[tokio::test]
async fn test_channel_sink_receives_events() {
    let (sink, mut rx) = event_channel(64);
    let coordinator = TransferCoordinator::new(
        Arc::new(InMemoryTransferStore::new()),
        Arc::new(BasicTransferValidator::new()),
        Arc::new(sink),
    );

    let transfer = coordinator
        .create(NewTransferRequest::new(
            "WH-1",
            "WH-2",
            vec![NewTransferItem::new("SKU-9", 1)],
        ))
        .await
        .unwrap();
    coordinator.cancel(transfer.id).await.unwrap();

    let events = rx.drain();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, TransferEventType::TransferCreated);
    assert_eq!(events[1].event_type, TransferEventType::TransferCancelled);
    assert_eq!(events[1].previous_status(), Some(TransferStatus::Draft));
}
