//! Transfer Core Types
//!
//! Aggregate (`TransferRequest` owning its `TransferItem`s by value) plus the
//! creation payload accepted by the coordinator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{ItemStatus, TransferStatus};

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(ulid::Ulid);

        impl $name {
            pub fn new() -> Self {
                Self(ulid::Ulid::new())
            }

            pub fn inner(&self) -> ulid::Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(ulid::Ulid::from_string(s)?))
            }
        }
    };
}

ulid_id!(
    /// Transfer ID - ULID-based, sortable by creation time
    TransferId
);

ulid_id!(
    /// Item ID - unique within its parent transfer
    ItemId
);

/// Warehouse identifier (owned by the warehouse service, opaque here)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseId(String);

impl WarehouseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WarehouseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WarehouseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Transfer priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl TransferPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPriority::Low => "LOW",
            TransferPriority::Normal => "NORMAL",
            TransferPriority::High => "HIGH",
            TransferPriority::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for TransferPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransferPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(TransferPriority::Low),
            "NORMAL" => Ok(TransferPriority::Normal),
            "HIGH" => Ok(TransferPriority::High),
            "URGENT" => Ok(TransferPriority::Urgent),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// One line of a creation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransferItem {
    pub inventory_id: String,
    pub product_id: String,
    pub sku: String,
    pub product_name: Option<String>,
    pub requested_quantity: i32,
    pub notes: Option<String>,
}

impl NewTransferItem {
    /// Item with inventory and product ids derived from the SKU
    pub fn new(sku: impl Into<String>, requested_quantity: i32) -> Self {
        let sku = sku.into();
        Self {
            inventory_id: format!("inv-{}", sku),
            product_id: format!("prod-{}", sku),
            sku,
            product_name: None,
            requested_quantity,
            notes: None,
        }
    }

    pub fn with_ids(
        inventory_id: impl Into<String>,
        product_id: impl Into<String>,
        sku: impl Into<String>,
        requested_quantity: i32,
    ) -> Self {
        Self {
            inventory_id: inventory_id.into(),
            product_id: product_id.into(),
            sku: sku.into(),
            product_name: None,
            requested_quantity,
            notes: None,
        }
    }
}

/// Creation payload from the calling layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransferRequest {
    pub source_warehouse_id: WarehouseId,
    pub destination_warehouse_id: WarehouseId,
    pub items: Vec<NewTransferItem>,
    #[serde(default)]
    pub priority: TransferPriority,
    /// Caller-supplied reference; generated when absent
    pub reference_number: Option<String>,
    pub requested_by: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
    pub expected_pickup_date: Option<DateTime<Utc>>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub special_instructions: Option<String>,
}

impl NewTransferRequest {
    pub fn new(
        source: impl Into<WarehouseId>,
        destination: impl Into<WarehouseId>,
        items: Vec<NewTransferItem>,
    ) -> Self {
        Self {
            source_warehouse_id: source.into(),
            destination_warehouse_id: destination.into(),
            items,
            priority: TransferPriority::Normal,
            reference_number: None,
            requested_by: None,
            requested_at: None,
            expected_pickup_date: None,
            expected_delivery_date: None,
            special_instructions: None,
        }
    }

    pub fn with_priority(mut self, priority: TransferPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_reference_number(mut self, reference_number: impl Into<String>) -> Self {
        self.reference_number = Some(reference_number.into());
        self
    }

    pub fn with_requested_by(mut self, requested_by: impl Into<String>) -> Self {
        self.requested_by = Some(requested_by.into());
        self
    }

    pub fn with_special_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.special_instructions = Some(instructions.into());
        self
    }
}

/// Line item owned by a transfer request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferItem {
    pub id: ItemId,
    pub inventory_id: String,
    pub product_id: String,
    pub sku: String,
    pub product_name: Option<String>,
    pub requested_quantity: i32,
    pub actual_quantity: Option<i32>,
    pub notes: Option<String>,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferItem {
    pub fn from_new(item: NewTransferItem, now: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::new(),
            inventory_id: item.inventory_id,
            product_id: item.product_id,
            sku: item.sku,
            product_name: item.product_name,
            requested_quantity: item.requested_quantity,
            actual_quantity: None,
            notes: item.notes,
            status: ItemStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Transfer aggregate as stored and returned by every operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: TransferId,
    pub reference_number: String,
    pub source_warehouse_id: WarehouseId,
    pub destination_warehouse_id: WarehouseId,
    pub status: TransferStatus,
    pub priority: TransferPriority,
    pub items: Vec<TransferItem>,
    pub requested_by: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub expected_pickup_date: Option<DateTime<Utc>>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub actual_pickup_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_label_url: Option<String>,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, 0 until first save
    pub version: i64,
}

impl TransferRequest {
    /// Build a DRAFT aggregate from a validated payload
    pub fn draft(new: NewTransferRequest, reference_number: String, now: DateTime<Utc>) -> Self {
        let items = new
            .items
            .into_iter()
            .map(|item| TransferItem::from_new(item, now))
            .collect();

        Self {
            id: TransferId::new(),
            reference_number,
            source_warehouse_id: new.source_warehouse_id,
            destination_warehouse_id: new.destination_warehouse_id,
            status: TransferStatus::Draft,
            priority: new.priority,
            items,
            requested_by: new.requested_by,
            requested_at: new.requested_at.unwrap_or(now),
            expected_pickup_date: new.expected_pickup_date,
            expected_delivery_date: new.expected_delivery_date,
            actual_pickup_date: None,
            actual_delivery_date: None,
            completed_at: None,
            shipping_carrier: None,
            tracking_number: None,
            shipping_label_url: None,
            special_instructions: new.special_instructions,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn item(&self, item_id: ItemId) -> Option<&TransferItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: ItemId) -> Option<&mut TransferItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    pub fn item_statuses(&self) -> impl Iterator<Item = ItemStatus> + '_ {
        self.items.iter().map(|item| item.status)
    }

    pub fn all_items_in(&self, status: ItemStatus) -> bool {
        self.item_statuses().all(|s| s == status)
    }
}

impl fmt::Display for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transfer[{}] {} {} -> {} items={} status={}",
            self.id,
            self.reference_number,
            self.source_warehouse_id,
            self.destination_warehouse_id,
            self.items.len(),
            self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> NewTransferRequest {
        NewTransferRequest::new(
            "W1",
            "W2",
            vec![NewTransferItem::new("SKU-1", 5), NewTransferItem::new("SKU-2", 3)],
        )
    }

    #[test]
    fn test_id_roundtrip() {
        let id = TransferId::new();
        let parsed: TransferId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);

        assert!("not-a-ulid".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("urgent".parse::<TransferPriority>(), Ok(TransferPriority::Urgent));
        assert_eq!(TransferPriority::default(), TransferPriority::Normal);
        assert!("asap".parse::<TransferPriority>().is_err());
    }

    #[test]
    fn test_draft_initializes_lifecycle_fields() {
        let now = Utc::now();
        let transfer = TransferRequest::draft(sample_request(), "TR-20260101-1234".into(), now);

        assert_eq!(transfer.status, TransferStatus::Draft);
        assert_eq!(transfer.version, 0);
        assert_eq!(transfer.created_at, now);
        assert_eq!(transfer.updated_at, now);
        assert_eq!(transfer.requested_at, now);
        assert!(transfer.actual_pickup_date.is_none());
        assert!(transfer.actual_delivery_date.is_none());
        assert_eq!(transfer.items.len(), 2);
        assert!(transfer.all_items_in(ItemStatus::Pending));
        assert_ne!(transfer.items[0].id, transfer.items[1].id);
    }

    #[test]
    fn test_item_lookup() {
        let transfer = TransferRequest::draft(sample_request(), "TR-20260101-1234".into(), Utc::now());
        let id = transfer.items[1].id;

        assert_eq!(transfer.item(id).map(|i| i.sku.as_str()), Some("SKU-2"));
        assert!(transfer.item(ItemId::new()).is_none());
    }

    #[test]
    fn test_serialize_shape() {
        let transfer = TransferRequest::draft(sample_request(), "TR-20260101-1234".into(), Utc::now());
        let json = serde_json::to_value(&transfer).unwrap();

        assert_eq!(json["status"], "DRAFT");
        assert_eq!(json["source_warehouse_id"], "W1");
        assert_eq!(json["items"][0]["status"], "PENDING");
        assert_eq!(json["id"], transfer.id.to_string());
    }
}
