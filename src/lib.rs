//! Warehouse Transfer - cross-region transfer workflow engine
//!
//! # Modules
//!
//! - [`transfer`] - Transfer and item state machines, coordinator, store, events
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use transfer::{
    ItemStatus, NewTransferItem, NewTransferRequest, TransferCoordinator, TransferError,
    TransferEvent, TransferId, TransferRequest, TransferStatus,
};
