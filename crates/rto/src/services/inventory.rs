//! Inventory adjuster trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::WarehouseId;

use crate::error::{Result, RtoError};

/// A warehouse inventory record for one SKU.
#[derive(Debug, Clone)]
pub struct InventoryRecord {
    /// Inventory-system identifier used for adjustments.
    pub id: String,
    pub sku: String,
    pub warehouse_id: WarehouseId,
    /// Units currently on hand.
    pub available: u32,
}

/// Trait for stock lookup and adjustment.
#[async_trait]
pub trait InventoryAdjuster: Send + Sync {
    /// Resolves the inventory record for a SKU in a warehouse.
    async fn inventory_by_sku(
        &self,
        sku: &str,
        warehouse_id: WarehouseId,
    ) -> Result<Option<InventoryRecord>>;

    /// Applies an atomic stock adjustment.
    async fn adjust_stock(&self, inventory_id: &str, delta: i64) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    records: HashMap<String, InventoryRecord>,
    next_id: u32,
}

/// In-memory inventory adjuster for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryAdjuster {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryAdjuster {
    /// Creates a new in-memory inventory adjuster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds stock for a SKU in a warehouse, returning the record id.
    pub fn seed_stock(&self, sku: &str, warehouse_id: WarehouseId, available: u32) -> String {
        let mut state = self.state.write().unwrap();
        state.next_id += 1;
        let id = format!("INV-{:04}", state.next_id);
        state.records.insert(
            id.clone(),
            InventoryRecord {
                id: id.clone(),
                sku: sku.to_string(),
                warehouse_id,
                available,
            },
        );
        id
    }

    /// Returns the on-hand quantity for a SKU in a warehouse.
    pub fn stock_of(&self, sku: &str, warehouse_id: WarehouseId) -> Option<u32> {
        self.state
            .read()
            .unwrap()
            .records
            .values()
            .find(|record| record.sku == sku && record.warehouse_id == warehouse_id)
            .map(|record| record.available)
    }
}

#[async_trait]
impl InventoryAdjuster for InMemoryInventoryAdjuster {
    async fn inventory_by_sku(
        &self,
        sku: &str,
        warehouse_id: WarehouseId,
    ) -> Result<Option<InventoryRecord>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .records
            .values()
            .find(|record| record.sku == sku && record.warehouse_id == warehouse_id)
            .cloned())
    }

    async fn adjust_stock(&self, inventory_id: &str, delta: i64) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let record = state.records.get_mut(inventory_id).ok_or_else(|| {
            RtoError::InvalidState {
                message: format!("unknown inventory record {inventory_id}"),
            }
        })?;

        let adjusted = record.available as i64 + delta;
        record.available = adjusted.max(0) as u32;
        Ok(())
    }
}
