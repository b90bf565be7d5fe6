//! Transfer Coordinator
//!
//! Workflow engine driving both state machines. Every mutating operation is
//! one unit: load -> check -> mutate (+cascade) -> save -> emit.
//!
//! The engine never retries. A stale save surfaces as `Conflict` and the
//! caller decides whether to reload.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::events::TransferEvent;
use super::reference::{generate_reference_number, is_valid_reference_number};
use super::sink::{LogEventSink, TransferEventSink};
use super::state::{ItemStatus, TransferStatus};
use super::store::TransferStore;
use super::transitions::{can_transition, can_transition_item, derive_request_status, item_side_effect};
use super::types::{ItemId, NewTransferRequest, TransferId, TransferRequest, WarehouseId};
use super::validation::{BasicTransferValidator, TransferValidator};

/// Transfer Coordinator - owns the lifecycle rules
pub struct TransferCoordinator {
    store: Arc<dyn TransferStore>,
    validator: Arc<dyn TransferValidator>,
    sink: Arc<dyn TransferEventSink>,
}

impl TransferCoordinator {
    pub fn new(
        store: Arc<dyn TransferStore>,
        validator: Arc<dyn TransferValidator>,
        sink: Arc<dyn TransferEventSink>,
    ) -> Self {
        Self {
            store,
            validator,
            sink,
        }
    }

    /// Structural validation and log-only events
    pub fn with_store(store: Arc<dyn TransferStore>) -> Self {
        Self::new(
            store,
            Arc::new(BasicTransferValidator::new()),
            Arc::new(LogEventSink),
        )
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Validate and persist a new request in DRAFT
    ///
    /// A missing or blank reference number is generated. Collisions come back
    /// as `Conflict` from the store.
    pub async fn create(&self, request: NewTransferRequest) -> Result<TransferRequest, TransferError> {
        let validation = self.validator.validate(&request).await;
        if !validation.valid {
            warn!(
                source = %request.source_warehouse_id,
                destination = %request.destination_warehouse_id,
                errors = ?validation.errors,
                "Transfer request rejected by validation"
            );
            return Err(TransferError::ValidationFailed(validation.errors));
        }

        let reference_number = match request.reference_number.as_deref().map(str::trim) {
            Some(reference) if !reference.is_empty() => reference.to_string(),
            _ => generate_reference_number(),
        };
        if !is_valid_reference_number(&reference_number) {
            return Err(TransferError::InvalidRequest(format!(
                "Reference number '{}' does not match TR-YYYYMMDD-NNNN",
                reference_number
            )));
        }

        let transfer = TransferRequest::draft(request, reference_number, Utc::now());
        let saved = self.store.save(transfer).await.inspect_err(|e| {
            if e.is_conflict() {
                warn!(error = %e, "Transfer creation conflicted");
            }
        })?;

        info!(
            transfer_id = %saved.id,
            reference_number = %saved.reference_number,
            items = saved.items.len(),
            "Transfer created: {} -> {}",
            saved.source_warehouse_id,
            saved.destination_warehouse_id
        );
        self.emit(TransferEvent::created(&saved)).await;

        Ok(saved)
    }

    /// Fresh reference number in `TR-YYYYMMDD-NNNN` form
    pub fn generate_reference_number(&self) -> String {
        generate_reference_number()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// DRAFT -> PENDING_APPROVAL
    pub async fn submit_for_approval(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.transition(id, TransferStatus::PendingApproval).await
    }

    /// PENDING_APPROVAL -> APPROVED; pending items start picking
    pub async fn approve(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.transition(id, TransferStatus::Approved).await
    }

    /// PENDING_APPROVAL -> REJECTED
    pub async fn reject(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.transition(id, TransferStatus::Rejected).await
    }

    pub async fn start_picking(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.transition(id, TransferStatus::Picking).await
    }

    /// PICKING -> PACKING once every item is PICKED
    pub async fn complete_picking(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.complete_stage(
            id,
            TransferStatus::Picking,
            ItemStatus::Picked,
            TransferStatus::Packing,
        )
        .await
    }

    /// PACKING -> READY_FOR_PICKUP once every item is PACKED
    pub async fn complete_packing(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.complete_stage(
            id,
            TransferStatus::Packing,
            ItemStatus::Packed,
            TransferStatus::ReadyForPickup,
        )
        .await
    }

    /// Hand over to the carrier: READY_FOR_PICKUP (or EXCEPTION) -> IN_TRANSIT
    pub async fn record_pickup(
        &self,
        id: TransferId,
        carrier: &str,
        tracking_number: &str,
        label_url: Option<&str>,
    ) -> Result<TransferRequest, TransferError> {
        let carrier = require_non_blank(carrier, "Shipping carrier")?;
        let tracking_number = require_non_blank(tracking_number, "Tracking number")?;

        let mut transfer = self.load(id).await?;
        let previous = transfer.status;
        if !matches!(
            previous,
            TransferStatus::ReadyForPickup | TransferStatus::Exception
        ) {
            return Err(TransferError::InvalidStateTransition {
                from: previous,
                to: TransferStatus::InTransit,
            });
        }

        transfer.shipping_carrier = Some(carrier);
        transfer.tracking_number = Some(tracking_number);
        if let Some(url) = label_url {
            transfer.shipping_label_url = Some(url.trim().to_string());
        }
        apply_transition(&mut transfer, TransferStatus::InTransit, Utc::now())?;

        self.commit(transfer, previous).await
    }

    /// IN_TRANSIT -> ARRIVED; in-transit items arrive
    pub async fn record_arrival(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.transition(id, TransferStatus::Arrived).await
    }

    pub async fn verify(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.transition(id, TransferStatus::Verifying).await
    }

    pub async fn complete(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.transition(id, TransferStatus::Completed).await
    }

    /// Cancel the request and every item not yet COMPLETED
    pub async fn cancel(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.transition(id, TransferStatus::Cancelled).await
    }

    pub async fn flag_exception(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.transition(id, TransferStatus::Exception).await
    }

    /// Operator transition to any status the table allows
    pub async fn update_status(
        &self,
        id: TransferId,
        status: TransferStatus,
    ) -> Result<TransferRequest, TransferError> {
        self.transition(id, status).await
    }

    // ========================================================================
    // Items and shipping metadata
    // ========================================================================

    /// Move one item, then let the item set drive the request status
    ///
    /// When the items derive a request status that the request cannot reach,
    /// the whole update fails and nothing is saved.
    pub async fn update_item_status(
        &self,
        id: TransferId,
        item_id: ItemId,
        status: ItemStatus,
    ) -> Result<TransferRequest, TransferError> {
        let mut transfer = self.load(id).await?;
        ensure_mutable(&transfer)?;

        let previous = transfer.status;
        let now = Utc::now();

        let item = transfer
            .item_mut(item_id)
            .ok_or_else(|| TransferError::ItemNotFound {
                transfer_id: id.to_string(),
                item_id: item_id.to_string(),
            })?;
        let item_from = item.status;
        if !can_transition_item(item_from, status) {
            return Err(TransferError::InvalidItemTransition {
                item_id: item_id.to_string(),
                from: item_from,
                to: status,
            });
        }
        item.status = status;
        item.updated_at = now;
        transfer.updated_at = now;

        debug!(
            transfer_id = %id,
            item_id = %item_id,
            from = %item_from,
            to = %status,
            "Item status updated"
        );

        let derived = derive_request_status(transfer.item_statuses());
        if let Some(derived) = derived
            && derived != transfer.status
        {
            if !can_transition(transfer.status, derived) {
                warn!(
                    transfer_id = %id,
                    item_id = %item_id,
                    current = %transfer.status,
                    derived = %derived,
                    "Cascade target unreachable, item update rejected"
                );
                return Err(TransferError::InvalidStateTransition {
                    from: transfer.status,
                    to: derived,
                });
            }
            debug!(transfer_id = %id, from = %transfer.status, to = %derived, "Cascading item status to request");
            apply_transition(&mut transfer, derived, now)?;
            if derived == TransferStatus::InTransit && transfer.shipping_carrier.is_none() {
                // Shipping metadata only arrives through record_pickup
                warn!(
                    transfer_id = %id,
                    "Request in transit without carrier or tracking, fill them via update_tracking_info"
                );
            }
        }

        self.commit(transfer, previous).await
    }

    /// Correct carrier and tracking after pickup
    ///
    /// `label_url` of `None` keeps the stored label.
    pub async fn update_tracking_info(
        &self,
        id: TransferId,
        carrier: &str,
        tracking_number: &str,
        label_url: Option<&str>,
    ) -> Result<TransferRequest, TransferError> {
        let carrier = require_non_blank(carrier, "Shipping carrier")?;
        let tracking_number = require_non_blank(tracking_number, "Tracking number")?;

        let mut transfer = self.load(id).await?;
        ensure_mutable(&transfer)?;
        if transfer.actual_pickup_date.is_none() {
            return Err(TransferError::InvalidRequest(format!(
                "Tracking info can only be updated after pickup (transfer is {})",
                transfer.status
            )));
        }

        let previous = transfer.status;
        transfer.shipping_carrier = Some(carrier);
        transfer.tracking_number = Some(tracking_number);
        if let Some(url) = label_url {
            transfer.shipping_label_url = Some(url.trim().to_string());
        }
        transfer.updated_at = Utc::now();

        self.commit(transfer, previous).await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        self.load(id).await
    }

    pub async fn get_by_reference_number(
        &self,
        reference_number: &str,
    ) -> Result<TransferRequest, TransferError> {
        self.store
            .load_by_reference_number(reference_number)
            .await?
            .ok_or_else(|| TransferError::TransferNotFound(reference_number.to_string()))
    }

    pub async fn list_by_status(
        &self,
        status: TransferStatus,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        self.store.list_by_status(status).await
    }

    pub async fn list_by_source_warehouse(
        &self,
        warehouse_id: &WarehouseId,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        self.store.list_by_source_warehouse(warehouse_id).await
    }

    pub async fn list_by_destination_warehouse(
        &self,
        warehouse_id: &WarehouseId,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        self.store.list_by_destination_warehouse(warehouse_id).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn load(&self, id: TransferId) -> Result<TransferRequest, TransferError> {
        let transfer = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| TransferError::TransferNotFound(id.to_string()))?;
        debug!(transfer_id = %id, status = %transfer.status, version = transfer.version, "Transfer loaded");
        Ok(transfer)
    }

    async fn transition(
        &self,
        id: TransferId,
        to: TransferStatus,
    ) -> Result<TransferRequest, TransferError> {
        let mut transfer = self.load(id).await?;
        let previous = transfer.status;
        apply_transition(&mut transfer, to, Utc::now())?;
        self.commit(transfer, previous).await
    }

    async fn complete_stage(
        &self,
        id: TransferId,
        stage: TransferStatus,
        required: ItemStatus,
        next: TransferStatus,
    ) -> Result<TransferRequest, TransferError> {
        let mut transfer = self.load(id).await?;
        let previous = transfer.status;
        if previous != stage {
            return Err(TransferError::InvalidStateTransition {
                from: previous,
                to: next,
            });
        }
        if !transfer.all_items_in(required) {
            let outstanding = transfer
                .items
                .iter()
                .filter(|item| item.status != required)
                .count();
            return Err(TransferError::InvalidRequest(format!(
                "All items must be {} before leaving {} ({} outstanding)",
                required, stage, outstanding
            )));
        }

        apply_transition(&mut transfer, next, Utc::now())?;
        self.commit(transfer, previous).await
    }

    /// Save, then announce the status change if there was one
    async fn commit(
        &self,
        transfer: TransferRequest,
        previous: TransferStatus,
    ) -> Result<TransferRequest, TransferError> {
        let saved = self.store.save(transfer).await.inspect_err(|e| {
            if e.is_conflict() {
                warn!(error = %e, "Transfer save conflicted");
            }
        })?;

        if saved.status != previous {
            info!(
                transfer_id = %saved.id,
                reference_number = %saved.reference_number,
                from = %previous,
                to = %saved.status,
                version = saved.version,
                "Transfer status changed"
            );
            self.emit(TransferEvent::status_changed(&saved, previous)).await;
        }

        Ok(saved)
    }

    async fn emit(&self, event: TransferEvent) {
        if let Err(e) = self.sink.publish(&event).await {
            error!(
                sink = self.sink.name(),
                event_id = %event.event_id,
                event_type = %event.event_type,
                transfer_id = %event.transfer_id,
                error = %e,
                "Failed to publish transfer event"
            );
        }
    }
}

/// Table check plus the side effects of entering `to`
///
/// Lifecycle dates are set only the first time their status is entered.
fn apply_transition(
    transfer: &mut TransferRequest,
    to: TransferStatus,
    now: DateTime<Utc>,
) -> Result<(), TransferError> {
    let from = transfer.status;
    if !can_transition(from, to) {
        return Err(TransferError::InvalidStateTransition { from, to });
    }

    transfer.status = to;
    match to {
        TransferStatus::InTransit => {
            transfer.actual_pickup_date.get_or_insert(now);
        }
        TransferStatus::Arrived => {
            transfer.actual_delivery_date.get_or_insert(now);
        }
        TransferStatus::Completed => {
            transfer.completed_at.get_or_insert(now);
        }
        _ => {}
    }

    if let Some(effect) = item_side_effect(to) {
        for item in transfer
            .items
            .iter_mut()
            .filter(|item| effect.eligible.contains(&item.status))
        {
            item.status = effect.to;
            item.updated_at = now;
        }
    }

    transfer.updated_at = now;
    Ok(())
}

fn ensure_mutable(transfer: &TransferRequest) -> Result<(), TransferError> {
    if transfer.status.is_terminal() {
        return Err(TransferError::InvalidRequest(format!(
            "Transfer {} is {} and can no longer be modified",
            transfer.id, transfer.status
        )));
    }
    Ok(())
}

fn require_non_blank(value: &str, field: &str) -> Result<String, TransferError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TransferError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(value.to_string())
}
