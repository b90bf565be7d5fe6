//! Transfer Lifecycle Events
//!
//! One event per lifecycle milestone, emitted after the state change is
//! persisted. Delivery is at-least-once; consumers dedupe on
//! `(transfer_id, event_type, timestamp)`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::TransferStatus;
use super::types::{TransferId, TransferRequest, WarehouseId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferEventType {
    TransferCreated,
    TransferStatusChanged,
    TransferCancelled,
    TransferCompleted,
}

impl TransferEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEventType::TransferCreated => "TRANSFER_CREATED",
            TransferEventType::TransferStatusChanged => "TRANSFER_STATUS_CHANGED",
            TransferEventType::TransferCancelled => "TRANSFER_CANCELLED",
            TransferEventType::TransferCompleted => "TRANSFER_COMPLETED",
        }
    }

    /// Event type for a request that just entered `status`
    pub fn for_status_change(status: TransferStatus) -> Self {
        match status {
            TransferStatus::Cancelled => TransferEventType::TransferCancelled,
            TransferStatus::Completed => TransferEventType::TransferCompleted,
            _ => TransferEventType::TransferStatusChanged,
        }
    }
}

impl fmt::Display for TransferEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub event_id: Uuid,
    pub event_type: TransferEventType,
    pub transfer_id: TransferId,
    pub reference_number: String,
    pub source_warehouse_id: WarehouseId,
    pub destination_warehouse_id: WarehouseId,
    /// Status after the change
    pub status: TransferStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl TransferEvent {
    fn from_transfer(
        event_type: TransferEventType,
        transfer: &TransferRequest,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            transfer_id: transfer.id,
            reference_number: transfer.reference_number.clone(),
            source_warehouse_id: transfer.source_warehouse_id.clone(),
            destination_warehouse_id: transfer.destination_warehouse_id.clone(),
            status: transfer.status,
            timestamp: transfer.updated_at,
            metadata,
        }
    }

    pub fn created(transfer: &TransferRequest) -> Self {
        Self::from_transfer(TransferEventType::TransferCreated, transfer, None)
    }

    /// Status change event; CANCELLED and COMPLETED get their own types.
    /// Metadata carries the previous status name.
    pub fn status_changed(transfer: &TransferRequest, previous: TransferStatus) -> Self {
        Self::from_transfer(
            TransferEventType::for_status_change(transfer.status),
            transfer,
            Some(serde_json::Value::String(previous.as_str().to_string())),
        )
    }

    pub fn previous_status(&self) -> Option<TransferStatus> {
        self.metadata
            .as_ref()
            .and_then(|m| m.as_str())
            .and_then(|s| s.parse().ok())
    }

    /// Consumer-side deduplication key
    pub fn dedup_key(&self) -> (TransferId, TransferEventType, DateTime<Utc>) {
        (self.transfer_id, self.event_type, self.timestamp)
    }
}
