//! Engine error taxonomy.

use std::time::Duration;

use common::{Money, NdrId, OrderId, ShipmentId};
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during RTO operations.
///
/// Every variant carries a stable code (see [`RtoError::code`]) so the
/// calling layer can translate failures into user-facing responses
/// without string matching.
#[derive(Debug, Error)]
pub enum RtoError {
    /// Shipment not found.
    #[error("Shipment not found: {0}")]
    ShipmentNotFound(ShipmentId),

    /// RTO event not found (by id or reverse AWB).
    #[error("RTO not found: {0}")]
    RtoNotFound(String),

    /// Order not found during restock.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The NDR event named by the trigger does not exist.
    #[error("NDR event not found: {0}")]
    NdrEventNotFound(NdrId),

    /// The shipment already reached the consignee.
    #[error("Shipment {0} is already delivered")]
    AlreadyDelivered(ShipmentId),

    /// The shipment already has an active return.
    #[error("Shipment {0} is already in an active RTO")]
    AlreadyInRto(ShipmentId),

    /// The operation is not legal in the event's current status.
    #[error("{message}")]
    InvalidState { message: String },

    /// Restock attempted without a passed QC inspection.
    #[error("Cannot restock: QC not passed")]
    QcNotPassed,

    /// The wallet cannot cover the estimated charge.
    #[error("Insufficient wallet balance: required {required}, available {available}")]
    InsufficientBalance { required: Money, available: Money },

    /// The actor exceeded the trigger rate limit.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// This NDR already produced an RTO.
    #[error("RTO already triggered for this NDR")]
    DuplicateTrigger,

    /// The wallet gateway rejected or failed the charge.
    #[error("Wallet charge failed: {0}")]
    WalletChargeFailed(String),

    /// The courier could not create the reverse shipment.
    #[error("Courier reverse shipment creation failed: {0}")]
    CourierCreateFailed(String),

    /// The courier could not cancel the reverse shipment.
    #[error("Courier cancellation failed: {0}")]
    CourierCancelFailed(String),

    /// The courier could not return tracking data.
    #[error("Courier tracking failed: {0}")]
    CourierTrackingFailed(String),

    /// No adapter is registered for the shipment's carrier.
    #[error("No courier adapter registered for carrier '{0}'")]
    UnsupportedCarrier(String),

    /// Storage error the workflow could not translate.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl RtoError {
    /// Returns the stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            RtoError::ShipmentNotFound(_) => "SHIPMENT_NOT_FOUND",
            RtoError::RtoNotFound(_) => "RTO_NOT_FOUND",
            RtoError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            RtoError::NdrEventNotFound(_) => "NDR_EVENT_NOT_FOUND",
            RtoError::AlreadyDelivered(_) => "ALREADY_DELIVERED",
            RtoError::AlreadyInRto(_) => "ALREADY_IN_RTO",
            RtoError::InvalidState { .. } => "INVALID_RTO_STATUS",
            RtoError::QcNotPassed => "QC_NOT_PASSED",
            RtoError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            RtoError::RateLimited { .. } => "RATE_LIMITED",
            RtoError::DuplicateTrigger => "DUPLICATE_TRIGGER",
            RtoError::WalletChargeFailed(_) => "WALLET_CHARGE_FAILED",
            RtoError::CourierCreateFailed(_) => "COURIER_CREATE_FAILED",
            RtoError::CourierCancelFailed(_) => "COURIER_CANCEL_FAILED",
            RtoError::CourierTrackingFailed(_) => "COURIER_TRACKING_FAILED",
            RtoError::UnsupportedCarrier(_) => "UNSUPPORTED_CARRIER",
            RtoError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Renders the error as the structured body handed to callers.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            success: false,
            error: self.to_string(),
            code: self.code(),
        }
    }
}

impl From<domain::RtoEventError> for RtoError {
    fn from(err: domain::RtoEventError) -> Self {
        match err {
            domain::RtoEventError::QcNotAllowed { .. } => RtoError::InvalidState {
                message: "RTO must be delivered to warehouse before QC".to_string(),
            },
            other => RtoError::InvalidState {
                message: other.to_string(),
            },
        }
    }
}

/// Structured failure body for the calling layer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, RtoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ReturnStatus;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(RtoError::DuplicateTrigger.code(), "DUPLICATE_TRIGGER");
        assert_eq!(RtoError::QcNotPassed.code(), "QC_NOT_PASSED");
        assert_eq!(
            RtoError::RtoNotFound("RAWB-1".to_string()).code(),
            "RTO_NOT_FOUND"
        );
        assert_eq!(
            RtoError::InvalidState {
                message: "x".to_string()
            }
            .code(),
            "INVALID_RTO_STATUS"
        );
    }

    #[test]
    fn test_duplicate_trigger_message_is_verbatim() {
        assert_eq!(
            RtoError::DuplicateTrigger.to_string(),
            "RTO already triggered for this NDR"
        );
    }

    #[test]
    fn test_insufficient_balance_message() {
        let err = RtoError::InsufficientBalance {
            required: Money::from_cents(5000),
            available: Money::from_cents(1000),
        };
        assert!(err.to_string().starts_with("Insufficient wallet balance"));
    }

    #[test]
    fn test_body_shape() {
        let body = RtoError::DuplicateTrigger.body();
        assert!(!body.success);
        assert_eq!(body.code, "DUPLICATE_TRIGGER");
        assert_eq!(body.error, "RTO already triggered for this NDR");

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], serde_json::json!(false));
    }

    #[test]
    fn test_qc_gate_error_message() {
        let err: RtoError = domain::RtoEventError::QcNotAllowed {
            status: ReturnStatus::Initiated,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "RTO must be delivered to warehouse before QC"
        );
    }
}
