//! Trigger coordination for the RTO lifecycle.

use std::sync::Arc;

use common::{NdrId, ShipmentId};
use domain::{NdrStatus, NewRto, RtoEvent, RtoReason, Shipment, ShipmentStatus, TriggerType};
use store::{
    RtoStore, StoreError, UQ_ACTIVE_RTO_PER_SHIPMENT, UQ_RTO_NDR_EVENT, UnitOfWork,
};

use crate::error::{Result, RtoError};
use crate::services::{
    AuditEntry, AuditLogger, CourierAdapter, CourierRegistry, NotificationDispatcher,
    RateCardCalculator, RateLimiter, WalletChargeGateway,
};

/// Input to [`RtoTriggerCoordinator::trigger_rto`].
#[derive(Debug, Clone)]
pub struct TriggerRequest {
    pub shipment_id: ShipmentId,
    pub reason: RtoReason,
    pub ndr_event_id: Option<NdrId>,
    pub trigger_type: TriggerType,
    /// Who asked for the trigger; rate-limited and audited per actor.
    pub actor: String,
}

/// Orchestrates the RTO trigger transaction.
///
/// Preconditions run in a fixed order without side effects; then one
/// atomic unit deducts the wallet, creates the reverse shipment, opens
/// the RTO event, flips the shipment, and consumes the NDR. Any failure
/// inside the unit rolls everything back, compensating the external
/// steps that already happened in reverse order.
pub struct RtoTriggerCoordinator {
    store: Arc<dyn RtoStore>,
    wallet: Arc<dyn WalletChargeGateway>,
    rate_card: Arc<dyn RateCardCalculator>,
    couriers: Arc<CourierRegistry>,
    rate_limiter: Arc<dyn RateLimiter>,
    notifier: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditLogger>,
}

impl RtoTriggerCoordinator {
    /// Creates a new trigger coordinator with explicit collaborators.
    pub fn new(
        store: Arc<dyn RtoStore>,
        wallet: Arc<dyn WalletChargeGateway>,
        rate_card: Arc<dyn RateCardCalculator>,
        couriers: Arc<CourierRegistry>,
        rate_limiter: Arc<dyn RateLimiter>,
        notifier: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self {
            store,
            wallet,
            rate_card,
            couriers,
            rate_limiter,
            notifier,
            audit,
        }
    }

    /// Triggers an RTO for a failed delivery.
    #[tracing::instrument(skip(self), fields(shipment_id = %request.shipment_id))]
    pub async fn trigger_rto(&self, request: TriggerRequest) -> Result<RtoEvent> {
        metrics::counter!("rto_triggers_total").increment(1);
        let start = std::time::Instant::now();

        let result = self.trigger_inner(&request).await;

        metrics::histogram!("rto_trigger_duration_seconds").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(event) => {
                metrics::counter!("rto_triggers_succeeded").increment(1);
                tracing::info!(rto_id = %event.id(), "RTO triggered");
            }
            Err(err) => {
                metrics::counter!("rto_trigger_failures_total").increment(1);
                tracing::warn!(code = err.code(), "RTO trigger failed");
            }
        }
        result
    }

    async fn trigger_inner(&self, request: &TriggerRequest) -> Result<RtoEvent> {
        // Preconditions, in order; each fails without side effects.
        let shipment = self
            .store
            .shipment(request.shipment_id)
            .await?
            .ok_or(RtoError::ShipmentNotFound(request.shipment_id))?;

        if shipment.is_delivered() {
            return Err(RtoError::AlreadyDelivered(shipment.id));
        }

        if shipment.status.is_active_rto() {
            return Err(RtoError::AlreadyInRto(shipment.id));
        }

        let actor_key = format!("rto:{}:{}", shipment.company_id, request.actor);
        let decision = self.rate_limiter.check_limit(&actor_key).await?;
        if !decision.allowed {
            return Err(RtoError::RateLimited {
                retry_after: decision.retry_after.unwrap_or_default(),
            });
        }

        if let Some(ndr_id) = request.ndr_event_id {
            let ndr = self
                .store
                .ndr_event(ndr_id)
                .await?
                .ok_or(RtoError::NdrEventNotFound(ndr_id))?;
            if ndr.status == NdrStatus::RtoTriggered
                || self.store.rto_event_for_ndr(ndr_id).await?.is_some()
            {
                return Err(RtoError::DuplicateTrigger);
            }
        }

        let charges = self
            .rate_card
            .calculate_rto_charges(&shipment, request.reason)
            .await?;
        if !self
            .wallet
            .has_minimum_balance(shipment.company_id, charges.final_price)
            .await?
        {
            return Err(RtoError::InsufficientBalance {
                required: charges.final_price,
                available: self.wallet.get_balance(shipment.company_id).await?,
            });
        }

        let adapter = self.couriers.get_provider(&shipment.carrier)?;

        // Atomic unit of work. The event exists only in memory until the
        // commit; external steps that succeed before a later failure are
        // compensated in reverse order.
        let mut event = RtoEvent::open(NewRto {
            shipment_id: shipment.id,
            order_id: shipment.order_id,
            company_id: shipment.company_id,
            warehouse_id: shipment.warehouse_id,
            reason: request.reason,
            trigger_type: request.trigger_type,
            ndr_event_id: request.ndr_event_id,
            charge: charges.final_price,
        });
        let charge_ref = event.id().to_string();

        self.wallet
            .handle_rto_charge(shipment.company_id, charges.final_price, &charge_ref)
            .await?;
        event.mark_charges_deducted()?;

        let reverse = match adapter
            .create_reverse_shipment(&shipment, request.reason)
            .await
        {
            Ok(reverse) => reverse,
            Err(err) => {
                self.compensate_wallet(&shipment, &event, &charge_ref).await;
                return Err(err);
            }
        };
        event.assign_reverse_awb(reverse.reverse_awb.clone());

        let mut uow = UnitOfWork::new();
        uow.insert_rto_event(event.clone())
            .set_shipment_status(shipment.id, ShipmentStatus::RtoInitiated);
        if let Some(ndr_id) = request.ndr_event_id {
            uow.set_ndr_status(ndr_id, NdrStatus::RtoTriggered);
        }

        if let Err(err) = self.store.commit(uow).await {
            // A concurrent trigger won the race; undo the courier leg and
            // the wallet charge, then surface the conflict as a domain
            // error.
            if let Err(cancel_err) = adapter
                .cancel_reverse_shipment(&reverse.reverse_awb, "trigger aborted")
                .await
            {
                tracing::warn!(error = %cancel_err, "courier compensation failed");
                self.audit
                    .record(
                        AuditEntry::new("compensation_failed", cancel_err.to_string())
                            .rto(event.id())
                            .shipment(shipment.id),
                    )
                    .await;
            }
            self.compensate_wallet(&shipment, &event, &charge_ref).await;
            return Err(translate_commit_error(err, shipment.id));
        }

        self.audit
            .record(
                AuditEntry::new(
                    "rto_triggered",
                    format!(
                        "reason {}, charge {}, reverse AWB {}",
                        request.reason,
                        charges.final_price,
                        reverse.reverse_awb
                    ),
                )
                .rto(event.id())
                .shipment(shipment.id)
                .actor(request.actor.clone()),
            )
            .await;
        self.notifier.notify_rto_initiated(&event).await;

        Ok(event)
    }

    /// Reverses the wallet charge after a post-charge failure.
    ///
    /// A failed reversal is recorded for manual reconciliation; it never
    /// masks the error that aborted the trigger.
    async fn compensate_wallet(&self, shipment: &Shipment, event: &RtoEvent, charge_ref: &str) {
        if let Err(err) = self
            .wallet
            .reverse_rto_charge(shipment.company_id, event.rto_charge(), charge_ref)
            .await
        {
            tracing::warn!(error = %err, "wallet compensation failed");
            self.audit
                .record(
                    AuditEntry::new("compensation_failed", err.to_string())
                        .rto(event.id())
                        .shipment(shipment.id),
                )
                .await;
        }
    }
}

/// Maps commit-time constraint violations onto the domain taxonomy.
fn translate_commit_error(err: StoreError, shipment_id: ShipmentId) -> RtoError {
    if err.is_unique_violation(UQ_ACTIVE_RTO_PER_SHIPMENT) {
        RtoError::AlreadyInRto(shipment_id)
    } else if err.is_unique_violation(UQ_RTO_NDR_EVENT) {
        RtoError::DuplicateTrigger
    } else {
        RtoError::Storage(err)
    }
}
