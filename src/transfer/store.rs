//! Transfer Store
//!
//! Persistence seam for the coordinator. `save` writes the whole aggregate
//! (items included) and enforces optimistic concurrency on `version`:
//!
//! - `version == 0`: insert; duplicate id or reference number -> `Conflict`
//! - otherwise: succeed only if the stored version still matches, then bump it
//!
//! [`InMemoryTransferStore`] backs tests and the local binary;
//! [`PgTransferStore`](super::db::PgTransferStore) is the PostgreSQL backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::TransferError;
use super::state::TransferStatus;
use super::types::{TransferId, TransferRequest, WarehouseId};

#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Load the aggregate by id
    async fn load(&self, id: TransferId) -> Result<Option<TransferRequest>, TransferError>;

    /// Load the aggregate by its reference number
    async fn load_by_reference_number(
        &self,
        reference_number: &str,
    ) -> Result<Option<TransferRequest>, TransferError>;

    /// Persist the aggregate, returning it with the new version
    async fn save(&self, transfer: TransferRequest) -> Result<TransferRequest, TransferError>;

    async fn list_by_status(
        &self,
        status: TransferStatus,
    ) -> Result<Vec<TransferRequest>, TransferError>;

    async fn list_by_source_warehouse(
        &self,
        warehouse_id: &WarehouseId,
    ) -> Result<Vec<TransferRequest>, TransferError>;

    async fn list_by_destination_warehouse(
        &self,
        warehouse_id: &WarehouseId,
    ) -> Result<Vec<TransferRequest>, TransferError>;
}

#[derive(Default)]
struct Inner {
    transfers: HashMap<TransferId, TransferRequest>,
    by_reference: HashMap<String, TransferId>,
}

/// Process-local store
///
/// One mutex guards both maps, so the version check, the reference-number
/// uniqueness check and the write happen atomically.
#[derive(Default)]
pub struct InMemoryTransferStore {
    inner: Mutex<Inner>,
}

impl InMemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Writes are single inserts, so a poisoned map is still consistent
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn filtered<F>(&self, predicate: F) -> Vec<TransferRequest>
    where
        F: Fn(&TransferRequest) -> bool,
    {
        let inner = self.lock();
        let mut matches: Vec<TransferRequest> = inner
            .transfers
            .values()
            .filter(|t| predicate(t))
            .cloned()
            .collect();
        matches.sort_by_key(|t| t.id);
        matches
    }
}

#[async_trait]
impl TransferStore for InMemoryTransferStore {
    async fn load(&self, id: TransferId) -> Result<Option<TransferRequest>, TransferError> {
        Ok(self.lock().transfers.get(&id).cloned())
    }

    async fn load_by_reference_number(
        &self,
        reference_number: &str,
    ) -> Result<Option<TransferRequest>, TransferError> {
        let inner = self.lock();
        Ok(inner
            .by_reference
            .get(reference_number)
            .and_then(|id| inner.transfers.get(id))
            .cloned())
    }

    async fn save(&self, mut transfer: TransferRequest) -> Result<TransferRequest, TransferError> {
        let mut inner = self.lock();

        if transfer.version == 0 {
            if inner.transfers.contains_key(&transfer.id) {
                return Err(TransferError::Conflict(format!(
                    "transfer {} already exists",
                    transfer.id
                )));
            }
            if inner.by_reference.contains_key(&transfer.reference_number) {
                return Err(TransferError::Conflict(format!(
                    "reference number {} already in use",
                    transfer.reference_number
                )));
            }
            inner
                .by_reference
                .insert(transfer.reference_number.clone(), transfer.id);
        } else {
            let stored = inner
                .transfers
                .get(&transfer.id)
                .ok_or_else(|| TransferError::TransferNotFound(transfer.id.to_string()))?;
            if stored.version != transfer.version {
                return Err(TransferError::Conflict(format!(
                    "transfer {} was modified concurrently (expected version {}, found {})",
                    transfer.id, transfer.version, stored.version
                )));
            }
            if stored.reference_number != transfer.reference_number {
                return Err(TransferError::InvalidRequest(
                    "reference number is immutable".to_string(),
                ));
            }
        }

        transfer.version += 1;
        inner.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    async fn list_by_status(
        &self,
        status: TransferStatus,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        Ok(self.filtered(|t| t.status == status))
    }

    async fn list_by_source_warehouse(
        &self,
        warehouse_id: &WarehouseId,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        Ok(self.filtered(|t| &t.source_warehouse_id == warehouse_id))
    }

    async fn list_by_destination_warehouse(
        &self,
        warehouse_id: &WarehouseId,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        Ok(self.filtered(|t| &t.destination_warehouse_id == warehouse_id))
    }
}
