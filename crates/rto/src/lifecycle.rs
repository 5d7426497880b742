//! State-machine operations over persisted RTO events.

use std::sync::Arc;

use common::RtoId;
use domain::{QcInput, ReturnStatus, RtoEvent, ShipmentStatus};
use store::{RtoStore, UnitOfWork};

use crate::error::{Result, RtoError};
use crate::restock::RestockExecutor;
use crate::services::{
    AuditEntry, AuditLogger, CourierAdapter, CourierRegistry, NotificationDispatcher,
};

/// Who asked for a transition and why, for the audit trail.
#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
    pub actor: Option<String>,
    pub remarks: Option<String>,
}

impl TransitionContext {
    /// Creates a context carrying only the actor.
    pub fn by(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            remarks: None,
        }
    }
}

/// Drives RTO events along the legal transition graph.
///
/// Transition side effects: entering `DeliveredToWarehouse` fires the
/// delivered notification and mirrors the shipment to `RtoDelivered`;
/// entering `Restocked` routes through the [`RestockExecutor`] so the QC
/// gate cannot be bypassed.
pub struct RtoStateMachine {
    store: Arc<dyn RtoStore>,
    couriers: Arc<CourierRegistry>,
    notifier: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditLogger>,
    restock: Arc<RestockExecutor>,
}

impl RtoStateMachine {
    /// Creates a new state machine with explicit collaborators.
    pub fn new(
        store: Arc<dyn RtoStore>,
        couriers: Arc<CourierRegistry>,
        notifier: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditLogger>,
        restock: Arc<RestockExecutor>,
    ) -> Self {
        Self {
            store,
            couriers,
            notifier,
            audit,
            restock,
        }
    }

    /// Advances an RTO event to `new_status`.
    ///
    /// Illegal transitions fail with a typed state-conflict error and
    /// unknown ids with `RtoNotFound`.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn update_rto_status(
        &self,
        id: RtoId,
        new_status: ReturnStatus,
        ctx: TransitionContext,
    ) -> Result<RtoEvent> {
        match new_status {
            // Restock owns its own gate (QC passed) and inventory writes.
            ReturnStatus::Restocked => return self.restock.perform_restock(id, &ctx).await,
            // Cancellation must invoke the courier's cancel hook.
            ReturnStatus::Cancelled => {
                let reason = ctx
                    .remarks
                    .clone()
                    .unwrap_or_else(|| "cancelled via status update".to_string());
                return self.cancel_reverse_shipment(id, &reason, ctx).await;
            }
            // QC completion carries an inspection payload.
            ReturnStatus::QcCompleted => {
                return Err(RtoError::InvalidState {
                    message: "QC results must be recorded through record_qc_result".to_string(),
                });
            }
            _ => {}
        }

        let mut event = self
            .store
            .rto_event(id)
            .await?
            .ok_or_else(|| RtoError::RtoNotFound(id.to_string()))?;

        event.transition_to(new_status, ctx.actor.as_deref(), ctx.remarks.as_deref())?;

        let mut uow = UnitOfWork::new();
        uow.update_rto_event(event.clone());
        match new_status {
            ReturnStatus::InTransit => {
                uow.set_shipment_status(event.shipment_id(), ShipmentStatus::RtoInTransit);
            }
            ReturnStatus::DeliveredToWarehouse => {
                uow.set_shipment_status(event.shipment_id(), ShipmentStatus::RtoDelivered);
            }
            _ => {}
        }
        self.store.commit(uow).await?;

        metrics::counter!("rto_status_updates_total").increment(1);
        self.audit
            .record(
                AuditEntry::new("rto_status_updated", new_status.as_str())
                    .rto(event.id())
                    .shipment(event.shipment_id()),
            )
            .await;
        if new_status == ReturnStatus::DeliveredToWarehouse {
            self.notifier.notify_rto_delivered_to_warehouse(&event).await;
        }
        tracing::info!(rto_id = %event.id(), status = %new_status, "RTO status updated");

        Ok(event)
    }

    /// Records the warehouse QC inspection and advances to `QcCompleted`.
    #[tracing::instrument(skip(self, input))]
    pub async fn record_qc_result(&self, id: RtoId, input: QcInput) -> Result<RtoEvent> {
        let mut event = self
            .store
            .rto_event(id)
            .await?
            .ok_or_else(|| RtoError::RtoNotFound(id.to_string()))?;

        let passed = input.passed;
        let inspected_by = input.inspected_by.clone();
        event.record_qc(input)?;

        let mut uow = UnitOfWork::new();
        uow.update_rto_event(event.clone());
        self.store.commit(uow).await?;

        metrics::counter!("rto_qc_results_total").increment(1);
        self.audit
            .record(
                AuditEntry::new("rto_qc_recorded", if passed { "passed" } else { "failed" })
                    .rto(event.id())
                    .shipment(event.shipment_id())
                    .actor(inspected_by),
            )
            .await;
        self.notifier.notify_rto_qc_completed(&event).await;

        Ok(event)
    }

    /// Cancels a reverse shipment that has not left yet.
    ///
    /// The adapter's cancel hook runs before the local commit, exactly
    /// once; if the courier refuses, nothing changes locally. On success
    /// the shipment is released back to `Ndr`, freeing the active slot.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn cancel_reverse_shipment(
        &self,
        id: RtoId,
        reason: &str,
        ctx: TransitionContext,
    ) -> Result<RtoEvent> {
        let mut event = self
            .store
            .rto_event(id)
            .await?
            .ok_or_else(|| RtoError::RtoNotFound(id.to_string()))?;

        if !event.return_status().can_cancel() {
            return Err(RtoError::InvalidState {
                message: format!("Cannot cancel RTO in status {}", event.return_status()),
            });
        }

        let shipment = self
            .store
            .shipment(event.shipment_id())
            .await?
            .ok_or(RtoError::ShipmentNotFound(event.shipment_id()))?;
        let adapter = self.couriers.get_provider(&shipment.carrier)?;

        if let Some(awb) = event.reverse_awb() {
            adapter.cancel_reverse_shipment(awb, reason).await?;
        }

        event.transition_to(
            ReturnStatus::Cancelled,
            ctx.actor.as_deref(),
            Some(reason),
        )?;
        event.insert_metadata("cancellation_reason", serde_json::json!(reason));

        let mut uow = UnitOfWork::new();
        uow.update_rto_event(event.clone())
            .set_shipment_status(shipment.id, ShipmentStatus::Ndr);
        self.store.commit(uow).await?;

        metrics::counter!("rto_cancellations_total").increment(1);
        self.audit
            .record(
                AuditEntry::new("rto_cancelled", reason)
                    .rto(event.id())
                    .shipment(shipment.id),
            )
            .await;
        tracing::info!(rto_id = %event.id(), reason, "RTO cancelled");

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{CompanyId, Money, NdrId, OrderId, ShipmentId, WarehouseId};
    use domain::{NewRto, RtoReason, Shipment, TriggerType};

    use crate::services::{
        InMemoryAuditLogger, InMemoryCourierAdapter, InMemoryInventoryAdjuster,
        InMemoryNotificationDispatcher, NotificationKind,
    };
    use store::InMemoryRtoStore;

    struct Fixture {
        machine: RtoStateMachine,
        store: InMemoryRtoStore,
        adapter: InMemoryCourierAdapter,
        notifier: InMemoryNotificationDispatcher,
        audit: InMemoryAuditLogger,
    }

    fn setup() -> Fixture {
        let store = InMemoryRtoStore::new();
        let adapter = InMemoryCourierAdapter::new("bluedart");
        let notifier = InMemoryNotificationDispatcher::new();
        let audit = InMemoryAuditLogger::new();

        let mut registry = CourierRegistry::new();
        registry.register(Arc::new(adapter.clone()));

        let restock = Arc::new(RestockExecutor::new(
            Arc::new(store.clone()),
            Arc::new(InMemoryInventoryAdjuster::new()),
            Arc::new(audit.clone()),
        ));
        let machine = RtoStateMachine::new(
            Arc::new(store.clone()),
            Arc::new(registry),
            Arc::new(notifier.clone()),
            Arc::new(audit.clone()),
            restock,
        );

        Fixture {
            machine,
            store,
            adapter,
            notifier,
            audit,
        }
    }

    async fn seed_initiated(f: &Fixture) -> (RtoId, ShipmentId) {
        let shipment = Shipment {
            id: ShipmentId::new(),
            order_id: OrderId::new(),
            company_id: CompanyId::new(),
            warehouse_id: WarehouseId::new(),
            carrier: "bluedart".to_string(),
            awb: "AWB-1".to_string(),
            weight_grams: 500,
            zone: "zone-a".to_string(),
            status: domain::ShipmentStatus::RtoInitiated,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        f.store.insert_shipment(shipment.clone()).await;

        // Register the reverse leg with the adapter so cancel finds it.
        let reverse = f
            .adapter
            .create_reverse_shipment(&shipment, RtoReason::NdrUnresolved)
            .await
            .unwrap();

        let mut event = RtoEvent::open(NewRto {
            shipment_id: shipment.id,
            order_id: shipment.order_id,
            company_id: shipment.company_id,
            warehouse_id: shipment.warehouse_id,
            reason: RtoReason::NdrUnresolved,
            trigger_type: TriggerType::Auto,
            ndr_event_id: Some(NdrId::new()),
            charge: Money::from_cents(5000),
        });
        event.assign_reverse_awb(reverse.reverse_awb);
        let id = event.id();

        let mut uow = UnitOfWork::new();
        uow.insert_rto_event(event);
        f.store.commit(uow).await.unwrap();

        (id, shipment.id)
    }

    #[tokio::test]
    async fn test_in_transit_mirrors_shipment() {
        let f = setup();
        let (id, shipment_id) = seed_initiated(&f).await;

        let event = f
            .machine
            .update_rto_status(id, ReturnStatus::InTransit, TransitionContext::default())
            .await
            .unwrap();

        assert_eq!(event.return_status(), ReturnStatus::InTransit);
        assert_eq!(
            f.store.shipment(shipment_id).await.unwrap().unwrap().status,
            domain::ShipmentStatus::RtoInTransit
        );
    }

    #[tokio::test]
    async fn test_delivered_fires_notification_and_mirrors_shipment() {
        let f = setup();
        let (id, shipment_id) = seed_initiated(&f).await;

        f.machine
            .update_rto_status(id, ReturnStatus::InTransit, TransitionContext::default())
            .await
            .unwrap();
        f.machine
            .update_rto_status(
                id,
                ReturnStatus::DeliveredToWarehouse,
                TransitionContext::by("courier-webhook"),
            )
            .await
            .unwrap();

        assert_eq!(
            f.notifier.count_of(NotificationKind::RtoDeliveredToWarehouse),
            1
        );
        assert_eq!(
            f.store.shipment(shipment_id).await.unwrap().unwrap().status,
            domain::ShipmentStatus::RtoDelivered
        );

        let stored = f.store.rto_event(id).await.unwrap().unwrap();
        assert_eq!(stored.status_history().len(), 2);
        assert_eq!(
            stored.status_history()[1].actor.as_deref(),
            Some("courier-webhook")
        );
    }

    #[tokio::test]
    async fn test_illegal_transition_is_typed() {
        let f = setup();
        let (id, _) = seed_initiated(&f).await;

        let err = f
            .machine
            .update_rto_status(
                id,
                ReturnStatus::DeliveredToWarehouse,
                TransitionContext::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_RTO_STATUS");
    }

    #[tokio::test]
    async fn test_unknown_id_fails_rto_not_found() {
        let f = setup();
        let err = f
            .machine
            .update_rto_status(
                RtoId::new(),
                ReturnStatus::InTransit,
                TransitionContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RtoError::RtoNotFound(_)));
    }

    #[tokio::test]
    async fn test_qc_completed_must_go_through_record_qc() {
        let f = setup();
        let (id, _) = seed_initiated(&f).await;

        let err = f
            .machine
            .update_rto_status(id, ReturnStatus::QcCompleted, TransitionContext::default())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_RTO_STATUS");
    }

    #[tokio::test]
    async fn test_record_qc_from_delivered_and_pending() {
        let f = setup();
        let (id, _) = seed_initiated(&f).await;

        f.machine
            .update_rto_status(id, ReturnStatus::InTransit, TransitionContext::default())
            .await
            .unwrap();
        f.machine
            .update_rto_status(
                id,
                ReturnStatus::DeliveredToWarehouse,
                TransitionContext::default(),
            )
            .await
            .unwrap();
        f.machine
            .update_rto_status(id, ReturnStatus::QcPending, TransitionContext::default())
            .await
            .unwrap();

        let event = f
            .machine
            .record_qc_result(
                id,
                QcInput {
                    passed: true,
                    remarks: Some("sellable".to_string()),
                    inspected_by: "inspector-1".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(event.return_status(), ReturnStatus::QcCompleted);
        assert!(event.qc_result().unwrap().passed);
        assert_eq!(f.notifier.count_of(NotificationKind::RtoQcCompleted), 1);
        assert_eq!(f.audit.count_of("rto_qc_recorded"), 1);
    }

    #[tokio::test]
    async fn test_record_qc_before_delivery_fails_invalid_state() {
        let f = setup();
        let (id, _) = seed_initiated(&f).await;

        let err = f
            .machine
            .record_qc_result(
                id,
                QcInput {
                    passed: true,
                    remarks: None,
                    inspected_by: "inspector-1".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_RTO_STATUS");
        assert_eq!(
            err.to_string(),
            "RTO must be delivered to warehouse before QC"
        );
    }

    #[tokio::test]
    async fn test_cancel_from_initiated_invokes_adapter_once() {
        let f = setup();
        let (id, shipment_id) = seed_initiated(&f).await;
        let awb = f
            .store
            .rto_event(id)
            .await
            .unwrap()
            .unwrap()
            .reverse_awb()
            .unwrap()
            .to_string();

        let event = f
            .machine
            .cancel_reverse_shipment(id, "customer will retry delivery", TransitionContext::by("seller"))
            .await
            .unwrap();

        assert_eq!(event.return_status(), ReturnStatus::Cancelled);
        assert_eq!(f.adapter.cancellations_for(&awb), 1);
        assert_eq!(
            f.store.shipment(shipment_id).await.unwrap().unwrap().status,
            domain::ShipmentStatus::Ndr
        );
        assert_eq!(f.audit.count_of("rto_cancelled"), 1);
        assert_eq!(
            event.metadata().get("cancellation_reason").unwrap(),
            &serde_json::json!("customer will retry delivery")
        );
    }

    #[tokio::test]
    async fn test_cancel_after_transit_fails_with_status_message() {
        let f = setup();
        let (id, _) = seed_initiated(&f).await;

        f.machine
            .update_rto_status(id, ReturnStatus::InTransit, TransitionContext::default())
            .await
            .unwrap();

        let err = f
            .machine
            .cancel_reverse_shipment(id, "too late", TransitionContext::default())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_RTO_STATUS");
        assert_eq!(err.to_string(), "Cannot cancel RTO in status in_transit");

        // Adapter hook never ran.
        let awb = f
            .store
            .rto_event(id)
            .await
            .unwrap()
            .unwrap()
            .reverse_awb()
            .unwrap()
            .to_string();
        assert_eq!(f.adapter.cancellations_for(&awb), 0);
    }

    #[tokio::test]
    async fn test_cancel_via_status_update_routes_through_cancel_flow() {
        let f = setup();
        let (id, shipment_id) = seed_initiated(&f).await;

        let event = f
            .machine
            .update_rto_status(
                id,
                ReturnStatus::Cancelled,
                TransitionContext {
                    actor: Some("seller".to_string()),
                    remarks: Some("duplicate order".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(event.return_status(), ReturnStatus::Cancelled);
        assert_eq!(
            f.store.shipment(shipment_id).await.unwrap().unwrap().status,
            domain::ShipmentStatus::Ndr
        );
    }

    #[tokio::test]
    async fn test_courier_refusal_blocks_cancellation() {
        let f = setup();
        let (id, shipment_id) = seed_initiated(&f).await;
        f.adapter.set_fail_on_cancel(true);

        let err = f
            .machine
            .cancel_reverse_shipment(id, "reason", TransitionContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, RtoError::CourierCancelFailed(_)));

        // Nothing changed locally.
        let stored = f.store.rto_event(id).await.unwrap().unwrap();
        assert_eq!(stored.return_status(), ReturnStatus::Initiated);
        assert_eq!(
            f.store.shipment(shipment_id).await.unwrap().unwrap().status,
            domain::ShipmentStatus::RtoInitiated
        );
    }

    #[tokio::test]
    async fn test_refurbish_dispose_claim_close_the_event() {
        for terminal in [
            ReturnStatus::Refurbished,
            ReturnStatus::Disposed,
            ReturnStatus::Claimed,
        ] {
            let f = setup();
            let (id, _) = seed_initiated(&f).await;

            f.machine
                .update_rto_status(id, ReturnStatus::InTransit, TransitionContext::default())
                .await
                .unwrap();
            f.machine
                .update_rto_status(
                    id,
                    ReturnStatus::DeliveredToWarehouse,
                    TransitionContext::default(),
                )
                .await
                .unwrap();
            f.machine
                .record_qc_result(
                    id,
                    QcInput {
                        passed: false,
                        remarks: Some("damaged".to_string()),
                        inspected_by: "inspector-1".to_string(),
                    },
                )
                .await
                .unwrap();

            let event = f
                .machine
                .update_rto_status(id, terminal, TransitionContext::default())
                .await
                .unwrap();
            assert_eq!(event.return_status(), terminal);
            assert!(!event.is_active());
        }
    }
}
