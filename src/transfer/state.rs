//! Transfer Status Definitions
//!
//! Status names match the strings stored in PostgreSQL and carried on events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Transfer-level status
///
/// Terminal states: COMPLETED, CANCELLED, REJECTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// Initial state - request recorded, not yet submitted
    Draft,
    PendingApproval,
    Approved,
    Picking,
    Packing,
    ReadyForPickup,
    /// Carrier has the goods
    InTransit,
    Arrived,
    Verifying,
    Completed,
    Cancelled,
    Rejected,
    /// Recovery hub after a shipping anomaly
    Exception,
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 13] = [
        TransferStatus::Draft,
        TransferStatus::PendingApproval,
        TransferStatus::Approved,
        TransferStatus::Picking,
        TransferStatus::Packing,
        TransferStatus::ReadyForPickup,
        TransferStatus::InTransit,
        TransferStatus::Arrived,
        TransferStatus::Verifying,
        TransferStatus::Completed,
        TransferStatus::Cancelled,
        TransferStatus::Rejected,
        TransferStatus::Exception,
    ];

    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Cancelled | TransferStatus::Rejected
        )
    }

    /// Get the stored status name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Draft => "DRAFT",
            TransferStatus::PendingApproval => "PENDING_APPROVAL",
            TransferStatus::Approved => "APPROVED",
            TransferStatus::Picking => "PICKING",
            TransferStatus::Packing => "PACKING",
            TransferStatus::ReadyForPickup => "READY_FOR_PICKUP",
            TransferStatus::InTransit => "IN_TRANSIT",
            TransferStatus::Arrived => "ARRIVED",
            TransferStatus::Verifying => "VERIFYING",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Cancelled => "CANCELLED",
            TransferStatus::Rejected => "REJECTED",
            TransferStatus::Exception => "EXCEPTION",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransferStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown transfer status: {}", s))
    }
}

/// Item-level status
///
/// Terminal states: COMPLETED, CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    Picking,
    Picked,
    /// Short pick or short receipt
    Partial,
    Packed,
    InTransit,
    Arrived,
    Verifying,
    Completed,
    Cancelled,
    Exception,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 11] = [
        ItemStatus::Pending,
        ItemStatus::Picking,
        ItemStatus::Picked,
        ItemStatus::Partial,
        ItemStatus::Packed,
        ItemStatus::InTransit,
        ItemStatus::Arrived,
        ItemStatus::Verifying,
        ItemStatus::Completed,
        ItemStatus::Cancelled,
        ItemStatus::Exception,
    ];

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::Picking => "PICKING",
            ItemStatus::Picked => "PICKED",
            ItemStatus::Partial => "PARTIAL",
            ItemStatus::Packed => "PACKED",
            ItemStatus::InTransit => "IN_TRANSIT",
            ItemStatus::Arrived => "ARRIVED",
            ItemStatus::Verifying => "VERIFYING",
            ItemStatus::Completed => "COMPLETED",
            ItemStatus::Cancelled => "CANCELLED",
            ItemStatus::Exception => "EXCEPTION",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown item status: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TransferStatus::Completed.is_terminal());
        assert!(TransferStatus::Cancelled.is_terminal());
        assert!(TransferStatus::Rejected.is_terminal());

        assert!(!TransferStatus::Draft.is_terminal());
        assert!(!TransferStatus::InTransit.is_terminal());
        assert!(!TransferStatus::Exception.is_terminal());

        assert!(ItemStatus::Completed.is_terminal());
        assert!(ItemStatus::Cancelled.is_terminal());
        assert!(!ItemStatus::Partial.is_terminal());
        assert!(!ItemStatus::Exception.is_terminal());
    }

    #[test]
    fn test_status_name_roundtrip() {
        for status in TransferStatus::ALL {
            assert_eq!(status.as_str().parse::<TransferStatus>(), Ok(status));
        }
        for status in ItemStatus::ALL {
            assert_eq!(status.as_str().parse::<ItemStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            "ready_for_pickup".parse::<TransferStatus>(),
            Ok(TransferStatus::ReadyForPickup)
        );
        assert_eq!(" picked ".parse::<ItemStatus>(), Ok(ItemStatus::Picked));
        assert!("SHIPPED".parse::<TransferStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_stored_names() {
        let json = serde_json::to_string(&TransferStatus::PendingApproval).unwrap();
        assert_eq!(json, "\"PENDING_APPROVAL\"");

        let status: ItemStatus = serde_json::from_str("\"IN_TRANSIT\"").unwrap();
        assert_eq!(status, ItemStatus::InTransit);
    }

    #[test]
    fn test_display() {
        assert_eq!(TransferStatus::Draft.to_string(), "DRAFT");
        assert_eq!(ItemStatus::Partial.to_string(), "PARTIAL");
    }
}
