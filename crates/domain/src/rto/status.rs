//! Return-status state machine.

use serde::{Deserialize, Serialize};

/// The state of a return in its lifecycle.
///
/// State transitions:
/// ```text
/// Initiated ──► InTransit ──► DeliveredToWarehouse ──► QcPending ──► QcCompleted
///     │                                  │                              │
///     ▼                                  └──────────────────────────────┤
/// Cancelled                                                             ▼
///                                           {Restocked | Refurbished | Disposed | Claimed}
/// ```
///
/// `Cancelled` is reachable only from pre-transit states. Once the
/// package is moving there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    /// Reverse shipment requested, package not yet picked up.
    #[default]
    Initiated,

    /// Package is on its way back to the warehouse.
    InTransit,

    /// Package arrived at the warehouse.
    DeliveredToWarehouse,

    /// Awaiting quality-control inspection.
    QcPending,

    /// Inspection recorded, awaiting disposition.
    QcCompleted,

    /// Units returned to sellable stock (terminal state).
    Restocked,

    /// Sent for refurbishment (terminal state).
    Refurbished,

    /// Written off and disposed (terminal state).
    Disposed,

    /// Claimed against the courier (terminal state).
    Claimed,

    /// Return cancelled before pickup (terminal state).
    Cancelled,
}

impl ReturnStatus {
    /// Returns true if `next` is a legal transition from this state.
    pub fn can_transition_to(&self, next: ReturnStatus) -> bool {
        use ReturnStatus::*;

        matches!(
            (self, next),
            (Initiated, InTransit)
                | (Initiated, Cancelled)
                | (InTransit, DeliveredToWarehouse)
                | (DeliveredToWarehouse, QcPending)
                | (DeliveredToWarehouse, QcCompleted)
                | (QcPending, QcCompleted)
                | (QcCompleted, Restocked)
                | (QcCompleted, Refurbished)
                | (QcCompleted, Disposed)
                | (QcCompleted, Claimed)
        )
    }

    /// Returns true if the package has not yet entered the reverse leg.
    pub fn is_pre_transit(&self) -> bool {
        matches!(self, ReturnStatus::Initiated)
    }

    /// Returns true if the return can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        self.is_pre_transit()
    }

    /// Returns true if a QC result can be recorded in this state.
    pub fn can_record_qc(&self) -> bool {
        matches!(
            self,
            ReturnStatus::DeliveredToWarehouse | ReturnStatus::QcPending
        )
    }

    /// Returns true if restock can be performed in this state.
    pub fn can_restock(&self) -> bool {
        matches!(self, ReturnStatus::QcCompleted)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReturnStatus::Restocked
                | ReturnStatus::Refurbished
                | ReturnStatus::Disposed
                | ReturnStatus::Claimed
                | ReturnStatus::Cancelled
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Initiated => "initiated",
            ReturnStatus::InTransit => "in_transit",
            ReturnStatus::DeliveredToWarehouse => "delivered_to_warehouse",
            ReturnStatus::QcPending => "qc_pending",
            ReturnStatus::QcCompleted => "qc_completed",
            ReturnStatus::Restocked => "restocked",
            ReturnStatus::Refurbished => "refurbished",
            ReturnStatus::Disposed => "disposed",
            ReturnStatus::Claimed => "claimed",
            ReturnStatus::Cancelled => "cancelled",
        }
    }

    /// All states, in lifecycle order.
    pub fn all() -> [ReturnStatus; 10] {
        [
            ReturnStatus::Initiated,
            ReturnStatus::InTransit,
            ReturnStatus::DeliveredToWarehouse,
            ReturnStatus::QcPending,
            ReturnStatus::QcCompleted,
            ReturnStatus::Restocked,
            ReturnStatus::Refurbished,
            ReturnStatus::Disposed,
            ReturnStatus::Claimed,
            ReturnStatus::Cancelled,
        ]
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a return was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtoReason {
    /// NDR follow-ups exhausted without a successful delivery.
    NdrUnresolved,

    /// Buyer cancelled while the package was in flight.
    CustomerCancellation,

    /// Address could not be resolved by the courier.
    AddressIssue,

    /// Consignee refused to accept the package.
    RefusedDelivery,
}

impl RtoReason {
    /// Returns the reason name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RtoReason::NdrUnresolved => "ndr_unresolved",
            RtoReason::CustomerCancellation => "customer_cancellation",
            RtoReason::AddressIssue => "address_issue",
            RtoReason::RefusedDelivery => "refused_delivery",
        }
    }
}

impl std::fmt::Display for RtoReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the return was triggered by NDR processing or an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Triggered by background NDR processing.
    Auto,

    /// Triggered by an operator action.
    Manual,
}

impl TriggerType {
    /// Returns the trigger type as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Auto => "auto",
            TriggerType::Manual => "manual",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
