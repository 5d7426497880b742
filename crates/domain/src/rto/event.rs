//! RTO event aggregate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{CompanyId, Money, NdrId, OrderId, RtoId, ShipmentId, WarehouseId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::status::{ReturnStatus, RtoReason, TriggerType};

/// Errors raised by the RTO event aggregate itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RtoEventError {
    /// The requested status change is not on the transition graph.
    #[error("Cannot transition RTO from {from} to {to}")]
    InvalidTransition { from: ReturnStatus, to: ReturnStatus },

    /// The wallet charge has already been stamped on this event.
    #[error("Charges already deducted for this RTO")]
    ChargesAlreadyDeducted,

    /// QC cannot be recorded in the current status.
    #[error("RTO must be delivered to warehouse before QC, current status {status}")]
    QcNotAllowed { status: ReturnStatus },
}

/// One recorded status change in the event's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    /// Status before the change.
    pub from: ReturnStatus,
    /// Status after the change.
    pub to: ReturnStatus,
    /// When the change happened.
    pub at: DateTime<Utc>,
    /// Who caused the change, when known.
    pub actor: Option<String>,
    /// Free-form note attached to the change.
    pub remarks: Option<String>,
}

/// Result of the warehouse quality-control inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcResult {
    /// Whether the returned units are sellable.
    pub passed: bool,
    /// Inspector remarks.
    pub remarks: Option<String>,
    /// Who performed the inspection.
    pub inspected_by: String,
    /// When the inspection was recorded.
    pub inspected_at: DateTime<Utc>,
}

/// Input for recording a QC inspection; `inspected_at` is stamped by the
/// aggregate.
#[derive(Debug, Clone)]
pub struct QcInput {
    pub passed: bool,
    pub remarks: Option<String>,
    pub inspected_by: String,
}

/// Everything needed to open a new RTO event during the trigger flow.
///
/// The reverse AWB is not part of the input; the courier issues it later
/// in the same unit of work and it is stamped with
/// [`RtoEvent::assign_reverse_awb`].
#[derive(Debug, Clone)]
pub struct NewRto {
    pub shipment_id: ShipmentId,
    pub order_id: OrderId,
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub reason: RtoReason,
    pub trigger_type: TriggerType,
    pub ndr_event_id: Option<NdrId>,
    pub charge: Money,
}

/// The aggregate root of the return workflow.
///
/// Created only inside the trigger unit of work, advanced by state-machine
/// transitions, and never deleted: terminal states close an immutable
/// audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtoEvent {
    id: RtoId,
    shipment_id: ShipmentId,
    order_id: OrderId,
    company_id: CompanyId,
    warehouse_id: WarehouseId,
    reverse_awb: Option<String>,
    rto_reason: RtoReason,
    trigger_type: TriggerType,
    ndr_event_id: Option<NdrId>,
    return_status: ReturnStatus,
    status_history: Vec<StatusChange>,
    charges_deducted: bool,
    charges_deducted_at: Option<DateTime<Utc>>,
    rto_charge: Money,
    qc_result: Option<QcResult>,
    metadata: HashMap<String, serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RtoEvent {
    /// Opens a new RTO event in `Initiated` status.
    ///
    /// The charge amount is recorded but not yet stamped as deducted;
    /// the coordinator stamps it after the wallet confirms.
    pub fn open(new: NewRto) -> Self {
        let now = Utc::now();
        Self {
            id: RtoId::new(),
            shipment_id: new.shipment_id,
            order_id: new.order_id,
            company_id: new.company_id,
            warehouse_id: new.warehouse_id,
            reverse_awb: None,
            rto_reason: new.reason,
            trigger_type: new.trigger_type,
            ndr_event_id: new.ndr_event_id,
            return_status: ReturnStatus::Initiated,
            status_history: Vec::new(),
            charges_deducted: false,
            charges_deducted_at: None,
            rto_charge: new.charge,
            qc_result: None,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the event to `next`, recording the change in the history.
    pub fn transition_to(
        &mut self,
        next: ReturnStatus,
        actor: Option<&str>,
        remarks: Option<&str>,
    ) -> Result<(), RtoEventError> {
        if !self.return_status.can_transition_to(next) {
            return Err(RtoEventError::InvalidTransition {
                from: self.return_status,
                to: next,
            });
        }

        let now = Utc::now();
        self.status_history.push(StatusChange {
            from: self.return_status,
            to: next,
            at: now,
            actor: actor.map(str::to_string),
            remarks: remarks.map(str::to_string),
        });
        self.return_status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Stamps the wallet deduction. Legal exactly once.
    pub fn mark_charges_deducted(&mut self) -> Result<(), RtoEventError> {
        if self.charges_deducted {
            return Err(RtoEventError::ChargesAlreadyDeducted);
        }
        let now = Utc::now();
        self.charges_deducted = true;
        self.charges_deducted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Records the QC inspection and advances to `QcCompleted`.
    pub fn record_qc(&mut self, input: QcInput) -> Result<(), RtoEventError> {
        if !self.return_status.can_record_qc() {
            return Err(RtoEventError::QcNotAllowed {
                status: self.return_status,
            });
        }

        let now = Utc::now();
        self.qc_result = Some(QcResult {
            passed: input.passed,
            remarks: input.remarks.clone(),
            inspected_by: input.inspected_by.clone(),
            inspected_at: now,
        });
        self.transition_to(
            ReturnStatus::QcCompleted,
            Some(&input.inspected_by),
            input.remarks.as_deref(),
        )
    }

    /// Stamps the courier-issued reverse tracking id.
    pub fn assign_reverse_awb(&mut self, awb: impl Into<String>) {
        self.reverse_awb = Some(awb.into());
        self.updated_at = Utc::now();
    }

    /// Attaches adapter-specific data to the event.
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
        self.updated_at = Utc::now();
    }
}

// Query methods
impl RtoEvent {
    pub fn id(&self) -> RtoId {
        self.id
    }

    pub fn shipment_id(&self) -> ShipmentId {
        self.shipment_id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    /// Tracking id issued by the courier for the return leg.
    ///
    /// `None` only while the trigger unit of work is still in flight; a
    /// committed event always carries it.
    pub fn reverse_awb(&self) -> Option<&str> {
        self.reverse_awb.as_deref()
    }

    pub fn rto_reason(&self) -> RtoReason {
        self.rto_reason
    }

    pub fn trigger_type(&self) -> TriggerType {
        self.trigger_type
    }

    pub fn ndr_event_id(&self) -> Option<NdrId> {
        self.ndr_event_id
    }

    pub fn return_status(&self) -> ReturnStatus {
        self.return_status
    }

    pub fn status_history(&self) -> &[StatusChange] {
        &self.status_history
    }

    pub fn charges_deducted(&self) -> bool {
        self.charges_deducted
    }

    pub fn charges_deducted_at(&self) -> Option<DateTime<Utc>> {
        self.charges_deducted_at
    }

    pub fn rto_charge(&self) -> Money {
        self.rto_charge
    }

    pub fn qc_result(&self) -> Option<&QcResult> {
        self.qc_result.as_ref()
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true while the return has not reached a terminal state.
    pub fn is_active(&self) -> bool {
        !self.return_status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_rto() -> NewRto {
        NewRto {
            shipment_id: ShipmentId::new(),
            order_id: OrderId::new(),
            company_id: CompanyId::new(),
            warehouse_id: WarehouseId::new(),
            reason: RtoReason::NdrUnresolved,
            trigger_type: TriggerType::Auto,
            ndr_event_id: Some(NdrId::new()),
            charge: Money::from_cents(5000),
        }
    }

    #[test]
    fn test_open_starts_initiated() {
        let event = RtoEvent::open(new_rto());

        assert_eq!(event.return_status(), ReturnStatus::Initiated);
        assert!(event.is_active());
        assert!(!event.charges_deducted());
        assert!(event.status_history().is_empty());
        assert!(event.reverse_awb().is_none());
    }

    #[test]
    fn test_assign_reverse_awb() {
        let mut event = RtoEvent::open(new_rto());
        event.assign_reverse_awb("RAWB-001");
        assert_eq!(event.reverse_awb(), Some("RAWB-001"));
    }

    #[test]
    fn test_transition_records_history() {
        let mut event = RtoEvent::open(new_rto());

        event
            .transition_to(ReturnStatus::InTransit, Some("courier-webhook"), None)
            .unwrap();

        assert_eq!(event.return_status(), ReturnStatus::InTransit);
        assert_eq!(event.status_history().len(), 1);
        let change = &event.status_history()[0];
        assert_eq!(change.from, ReturnStatus::Initiated);
        assert_eq!(change.to, ReturnStatus::InTransit);
        assert_eq!(change.actor.as_deref(), Some("courier-webhook"));
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let mut event = RtoEvent::open(new_rto());

        let err = event
            .transition_to(ReturnStatus::Restocked, None, None)
            .unwrap_err();

        assert_eq!(
            err,
            RtoEventError::InvalidTransition {
                from: ReturnStatus::Initiated,
                to: ReturnStatus::Restocked,
            }
        );
        assert_eq!(event.return_status(), ReturnStatus::Initiated);
        assert!(event.status_history().is_empty());
    }

    #[test]
    fn test_charges_deducted_exactly_once() {
        let mut event = RtoEvent::open(new_rto());

        event.mark_charges_deducted().unwrap();
        assert!(event.charges_deducted());
        assert!(event.charges_deducted_at().is_some());

        assert_eq!(
            event.mark_charges_deducted().unwrap_err(),
            RtoEventError::ChargesAlreadyDeducted
        );
    }

    #[test]
    fn test_record_qc_from_delivered() {
        let mut event = RtoEvent::open(new_rto());
        event
            .transition_to(ReturnStatus::InTransit, None, None)
            .unwrap();
        event
            .transition_to(ReturnStatus::DeliveredToWarehouse, None, None)
            .unwrap();

        event
            .record_qc(QcInput {
                passed: true,
                remarks: Some("intact".to_string()),
                inspected_by: "inspector-7".to_string(),
            })
            .unwrap();

        assert_eq!(event.return_status(), ReturnStatus::QcCompleted);
        let qc = event.qc_result().unwrap();
        assert!(qc.passed);
        assert_eq!(qc.inspected_by, "inspector-7");
    }

    #[test]
    fn test_record_qc_rejected_before_delivery() {
        let mut event = RtoEvent::open(new_rto());

        let err = event
            .record_qc(QcInput {
                passed: true,
                remarks: None,
                inspected_by: "inspector-7".to_string(),
            })
            .unwrap_err();

        assert_eq!(
            err,
            RtoEventError::QcNotAllowed {
                status: ReturnStatus::Initiated
            }
        );
        assert!(event.qc_result().is_none());
    }

    #[test]
    fn test_cancel_from_initiated_only() {
        let mut event = RtoEvent::open(new_rto());
        event
            .transition_to(ReturnStatus::Cancelled, Some("seller"), Some("ordered twice"))
            .unwrap();
        assert!(!event.is_active());

        let mut moving = RtoEvent::open(new_rto());
        moving
            .transition_to(ReturnStatus::InTransit, None, None)
            .unwrap();
        assert!(
            moving
                .transition_to(ReturnStatus::Cancelled, None, None)
                .is_err()
        );
    }

    #[test]
    fn test_metadata_bag() {
        let mut event = RtoEvent::open(new_rto());
        event.insert_metadata("pickup_slot", serde_json::json!("10:00-14:00"));

        assert_eq!(
            event.metadata().get("pickup_slot"),
            Some(&serde_json::json!("10:00-14:00"))
        );
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut event = RtoEvent::open(new_rto());
        event.mark_charges_deducted().unwrap();
        event
            .transition_to(ReturnStatus::InTransit, None, None)
            .unwrap();

        let json = serde_json::to_string(&event).unwrap();
        let back: RtoEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id(), event.id());
        assert_eq!(back.return_status(), ReturnStatus::InTransit);
        assert!(back.charges_deducted());
        assert_eq!(back.status_history().len(), 1);
    }
}
