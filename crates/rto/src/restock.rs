//! Terminal inventory-adjustment step after a passed QC.

use std::sync::Arc;

use common::RtoId;
use domain::{ReturnStatus, RtoEvent};
use store::{RtoStore, UnitOfWork};

use crate::error::{Result, RtoError};
use crate::lifecycle::TransitionContext;
use crate::services::{AuditEntry, AuditLogger, InventoryAdjuster};

/// Returns QC-passed units to sellable stock and closes the event.
pub struct RestockExecutor {
    store: Arc<dyn RtoStore>,
    inventory: Arc<dyn InventoryAdjuster>,
    audit: Arc<dyn AuditLogger>,
}

impl RestockExecutor {
    /// Creates a new restock executor.
    pub fn new(
        store: Arc<dyn RtoStore>,
        inventory: Arc<dyn InventoryAdjuster>,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self {
            store,
            inventory,
            audit,
        }
    }

    /// Performs the restock for a QC-passed return.
    ///
    /// An order with zero line items succeeds as a no-op: no inventory
    /// call is made, and the event still closes as `Restocked` so the
    /// audit trail records that the pipeline finished.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn perform_restock(&self, id: RtoId, ctx: &TransitionContext) -> Result<RtoEvent> {
        let mut event = self
            .store
            .rto_event(id)
            .await?
            .ok_or_else(|| RtoError::RtoNotFound(id.to_string()))?;

        if !event.return_status().can_restock() {
            return Err(RtoError::InvalidState {
                message: format!(
                    "Cannot restock RTO in status {}",
                    event.return_status()
                ),
            });
        }

        match event.qc_result() {
            Some(qc) if qc.passed => {}
            _ => return Err(RtoError::QcNotPassed),
        }

        let order = self
            .store
            .order(event.order_id())
            .await?
            .ok_or(RtoError::OrderNotFound(event.order_id()))?;

        let mut units_returned: u32 = 0;
        let mut skipped_skus: Vec<String> = Vec::new();

        for item in &order.items {
            match self
                .inventory
                .inventory_by_sku(&item.sku, event.warehouse_id())
                .await?
            {
                Some(record) => {
                    self.inventory
                        .adjust_stock(&record.id, item.quantity as i64)
                        .await?;
                    units_returned += item.quantity;
                }
                None => {
                    // An unmapped SKU must not strand the whole return in
                    // QcCompleted; it is skipped and surfaced for
                    // reconciliation.
                    tracing::warn!(sku = %item.sku, "no inventory record, skipping restock");
                    skipped_skus.push(item.sku.clone());
                }
            }
        }

        event.insert_metadata(
            "restock",
            serde_json::json!({
                "units_returned": units_returned,
                "skipped_skus": skipped_skus,
            }),
        );
        event.transition_to(
            ReturnStatus::Restocked,
            ctx.actor.as_deref(),
            ctx.remarks.as_deref(),
        )?;

        let mut uow = UnitOfWork::new();
        uow.update_rto_event(event.clone());
        self.store.commit(uow).await?;

        metrics::counter!("rto_restocks_total").increment(1);
        self.audit
            .record(
                AuditEntry::new(
                    "rto_restocked",
                    format!("{units_returned} units returned, {} SKUs skipped", skipped_skus.len()),
                )
                .rto(event.id())
                .shipment(event.shipment_id()),
            )
            .await;
        tracing::info!(rto_id = %event.id(), units_returned, "RTO restocked");

        Ok(event)
    }
}
