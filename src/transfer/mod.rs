//! Warehouse Transfer Lifecycle
//!
//! Moves goods from a source warehouse to a destination warehouse through
//! approval, picking, packing, shipment, arrival and verification.
//!
//! # State Machine
//!
//! ```text
//! DRAFT → PENDING_APPROVAL → APPROVED → PICKING → PACKING → READY_FOR_PICKUP
//!              ↓                          ↓          ↓            ↓
//!           REJECTED                 EXCEPTION ←─────┴────────────┤
//!                                                                 ↓
//!          COMPLETED ← VERIFYING ← ARRIVED ← IN_TRANSIT ←─────────┘
//! ```
//!
//! CANCELLED is reachable from every pre-shipment state and from EXCEPTION.
//! EXCEPTION recovers to PICKING, PACKING, READY_FOR_PICKUP, IN_TRANSIT,
//! VERIFYING or COMPLETED.
//!
//! # Rules
//!
//! 1. **Table-driven**: every move, request or item, is checked against
//!    [`transitions`]; terminal states have no outgoing edges
//! 2. **Cascade**: when all items share a status with a request counterpart,
//!    an item update promotes the request; an unreachable promotion rejects
//!    the item update
//! 3. **Save-Then-Emit**: events go out only after the store accepted the
//!    new version; sink failures never fail the operation

pub mod coordinator;
pub mod db;
pub mod error;
pub mod events;
pub mod reference;
pub mod sink;
pub mod state;
pub mod store;
pub mod transitions;
pub mod types;
pub mod validation;

#[cfg(test)]
mod integration_tests;

// Re-exports for convenience
pub use coordinator::TransferCoordinator;
pub use db::PgTransferStore;
pub use error::TransferError;
pub use events::{TransferEvent, TransferEventType};
pub use reference::{generate_reference_number, is_valid_reference_number};
pub use sink::{
    ChannelEventSink, EventReceiver, EventSinkError, LogEventSink, NoopEventSink,
    RecordingEventSink, TransferEventSink, WebhookEventSink, event_channel,
};
pub use state::{ItemStatus, TransferStatus};
pub use store::{InMemoryTransferStore, TransferStore};
pub use types::{
    ItemId, NewTransferItem, NewTransferRequest, TransferId, TransferItem, TransferPriority,
    TransferRequest, WarehouseId,
};
pub use validation::{BasicTransferValidator, TransferValidator, ValidationResult};
