//! Transfer Error Types
//!
//! Every operation returns the updated aggregate or one of these.
//! Three families matter to callers:
//! - not found: never retried
//! - validation: retry only with different input
//! - conflict: reload and retry

use thiserror::Error;

use super::state::{ItemStatus, TransferStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    // === Not Found ===
    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    #[error("Transfer item not found: {item_id} in transfer {transfer_id}")]
    ItemNotFound {
        transfer_id: String,
        item_id: String,
    },

    // === Validation Errors ===
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStateTransition {
        from: TransferStatus,
        to: TransferStatus,
    },

    #[error("Invalid item status transition from {from} to {to} for item {item_id}")]
    InvalidItemTransition {
        item_id: String,
        from: ItemStatus,
        to: ItemStatus,
    },

    #[error("Transfer request validation failed: {}", .0.join(", "))]
    ValidationFailed(Vec<String>),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Concurrency ===
    #[error("Conflict: {0}")]
    Conflict(String),

    // === System Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::ItemNotFound { .. } => "TRANSFER_ITEM_NOT_FOUND",
            TransferError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            TransferError::InvalidItemTransition { .. } => "INVALID_ITEM_TRANSITION",
            TransferError::ValidationFailed(_) => "VALIDATION_FAILED",
            TransferError::InvalidRequest(_) => "INVALID_REQUEST",
            TransferError::Conflict(_) => "CONFLICT",
            TransferError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::TransferNotFound(_) | TransferError::ItemNotFound { .. } => 404,
            TransferError::ValidationFailed(_) | TransferError::InvalidRequest(_) => 400,
            TransferError::InvalidStateTransition { .. }
            | TransferError::InvalidItemTransition { .. } => 422,
            TransferError::Conflict(_) => 409,
            TransferError::DatabaseError(_) => 500,
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TransferError::TransferNotFound(_) | TransferError::ItemNotFound { .. }
        )
    }

    #[inline]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TransferError::InvalidStateTransition { .. }
                | TransferError::InvalidItemTransition { .. }
                | TransferError::ValidationFailed(_)
                | TransferError::InvalidRequest(_)
        )
    }

    /// Caller should reload and retry
    #[inline]
    pub fn is_conflict(&self) -> bool {
        matches!(self, TransferError::Conflict(_))
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(e: sqlx::Error) -> Self {
        TransferError::DatabaseError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TransferError::TransferNotFound("x".into()).code(),
            "TRANSFER_NOT_FOUND"
        );
        assert_eq!(TransferError::Conflict("stale".into()).code(), "CONFLICT");
        assert_eq!(
            TransferError::InvalidStateTransition {
                from: TransferStatus::Draft,
                to: TransferStatus::Approved
            }
            .code(),
            "INVALID_STATE_TRANSITION"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(TransferError::TransferNotFound("x".into()).http_status(), 404);
        assert_eq!(TransferError::InvalidRequest("x".into()).http_status(), 400);
        assert_eq!(TransferError::Conflict("x".into()).http_status(), 409);
        assert_eq!(TransferError::DatabaseError("x".into()).http_status(), 500);
    }

    #[test]
    fn test_families() {
        let not_found = TransferError::ItemNotFound {
            transfer_id: "t".into(),
            item_id: "i".into(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_validation());

        let invalid = TransferError::InvalidItemTransition {
            item_id: "i".into(),
            from: ItemStatus::Pending,
            to: ItemStatus::Packed,
        };
        assert!(invalid.is_validation());
        assert!(!invalid.is_conflict());

        assert!(TransferError::Conflict("x".into()).is_conflict());
        assert!(!TransferError::DatabaseError("x".into()).is_validation());
    }

    #[test]
    fn test_display() {
        let err = TransferError::InvalidStateTransition {
            from: TransferStatus::Draft,
            to: TransferStatus::Approved,
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition from DRAFT to APPROVED"
        );

        let err = TransferError::ValidationFailed(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Transfer request validation failed: a, b");
    }
}
