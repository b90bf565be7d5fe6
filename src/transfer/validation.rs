//! Pre-creation validation
//!
//! Runs once in `create`, before the request exists in DRAFT.

use async_trait::async_trait;

use super::reference::is_valid_reference_number;
use super::types::NewTransferRequest;

/// Outcome of validating a new transfer request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Combine with another result (errors accumulate)
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.errors.extend(other.errors);
        self.valid = self.valid && other.valid && self.errors.is_empty();
        self
    }
}

/// Validation collaborator
///
/// Implementations may consult external services (warehouse directory,
/// inventory). Infrastructure failures should be reported as errors in the
/// result, not panics.
#[async_trait]
pub trait TransferValidator: Send + Sync {
    async fn validate(&self, request: &NewTransferRequest) -> ValidationResult;
}

/// Structural checks on the payload itself
#[derive(Debug, Clone, Default)]
pub struct BasicTransferValidator;

impl BasicTransferValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn check(request: &NewTransferRequest) -> ValidationResult {
        let mut errors = Vec::new();

        if request.source_warehouse_id.is_blank() {
            errors.push("Source warehouse ID is required".to_string());
        }
        if request.destination_warehouse_id.is_blank() {
            errors.push("Destination warehouse ID is required".to_string());
        }
        if !request.source_warehouse_id.is_blank()
            && request.source_warehouse_id == request.destination_warehouse_id
        {
            errors.push("Source and destination warehouses must be different".to_string());
        }

        if request.items.is_empty() {
            errors.push("At least one item is required for transfer".to_string());
        }
        for (i, item) in request.items.iter().enumerate() {
            if item.inventory_id.trim().is_empty() {
                errors.push(format!("Item at index {} is missing inventory ID", i));
            }
            if item.product_id.trim().is_empty() {
                errors.push(format!("Item at index {} is missing product ID", i));
            }
            if item.sku.trim().is_empty() {
                errors.push(format!("Item at index {} is missing SKU", i));
            }
            if item.requested_quantity <= 0 {
                errors.push(format!("Item at index {} has invalid requested quantity", i));
            }
        }

        if let Some(reference) = &request.reference_number
            && !reference.trim().is_empty()
            && !is_valid_reference_number(reference)
        {
            errors.push(format!(
                "Reference number '{}' does not match TR-YYYYMMDD-NNNN",
                reference
            ));
        }

        if let (Some(pickup), Some(delivery)) =
            (request.expected_pickup_date, request.expected_delivery_date)
            && delivery < pickup
        {
            errors.push("Expected delivery date is before expected pickup date".to_string());
        }

        ValidationResult::from_errors(errors)
    }
}

#[async_trait]
impl TransferValidator for BasicTransferValidator {
    async fn validate(&self, request: &NewTransferRequest) -> ValidationResult {
        Self::check(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::types::NewTransferItem;
    use chrono::{Duration, Utc};

    fn valid_request() -> NewTransferRequest {
        NewTransferRequest::new("W1", "W2", vec![NewTransferItem::new("SKU-1", 10)])
    }

    #[test]
    fn test_valid_request() {
        let result = BasicTransferValidator::check(&valid_request());
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_same_warehouse_rejected() {
        let mut request = valid_request();
        request.destination_warehouse_id = "W1".into();

        let result = BasicTransferValidator::check(&request);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec!["Source and destination warehouses must be different".to_string()]
        );
    }

    #[test]
    fn test_missing_warehouses_and_items() {
        let request = NewTransferRequest::new("", " ", Vec::new());
        let result = BasicTransferValidator::check(&request);

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors.iter().any(|e| e.contains("At least one item")));
    }

    #[test]
    fn test_item_field_errors() {
        let mut item = NewTransferItem::with_ids("", "", " ", 0);
        item.notes = Some("broken".into());
        let request = NewTransferRequest::new("W1", "W2", vec![NewTransferItem::new("OK", 1), item]);

        let result = BasicTransferValidator::check(&request);
        assert_eq!(result.errors.len(), 4);
        assert!(result.errors.iter().all(|e| e.starts_with("Item at index 1")));
    }

    #[test]
    fn test_bad_reference_number() {
        let request = valid_request().with_reference_number("REF-1");
        let result = BasicTransferValidator::check(&request);
        assert!(!result.valid);

        let request = valid_request().with_reference_number("TR-20260101-5555");
        assert!(BasicTransferValidator::check(&request).valid);
    }

    #[test]
    fn test_delivery_before_pickup() {
        let mut request = valid_request();
        let now = Utc::now();
        request.expected_pickup_date = Some(now);
        request.expected_delivery_date = Some(now - Duration::hours(1));

        assert!(!BasicTransferValidator::check(&request).valid);
    }

    #[test]
    fn test_merge() {
        let merged = ValidationResult::ok()
            .merge(ValidationResult::from_errors(vec!["inventory short".into()]));
        assert!(!merged.valid);
        assert_eq!(merged.errors, vec!["inventory short".to_string()]);

        assert!(ValidationResult::ok().merge(ValidationResult::ok()).valid);
    }

    #[tokio::test]
    async fn test_trait_delegates_to_check() {
        let validator = BasicTransferValidator::new();
        assert!(validator.validate(&valid_request()).await.valid);
    }
}
