//! Rate card calculator trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Money;
use domain::{RtoReason, Shipment};
use serde::Serialize;

use crate::error::Result;

/// Itemized composition of an RTO charge.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeBreakdown {
    pub base: Money,
    pub weight_surcharge: Money,
    pub zone_surcharge: Money,
}

/// Computed RTO charge for a shipment.
#[derive(Debug, Clone, Serialize)]
pub struct RtoCharges {
    pub final_price: Money,
    pub breakdown: ChargeBreakdown,
}

/// Trait for computing the RTO charge from carrier/weight/zone rules.
#[async_trait]
pub trait RateCardCalculator: Send + Sync {
    async fn calculate_rto_charges(
        &self,
        shipment: &Shipment,
        reason: RtoReason,
    ) -> Result<RtoCharges>;
}

#[derive(Debug)]
struct RateTable {
    base: Money,
    /// Surcharge per started 500g above the first 500g.
    per_half_kg: Money,
}

/// In-memory rate card for testing: a base price plus a weight slab
/// surcharge, independent of carrier and reason.
#[derive(Debug, Clone)]
pub struct InMemoryRateCard {
    table: Arc<RwLock<RateTable>>,
}

impl InMemoryRateCard {
    /// Creates a rate card with the default table.
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(RateTable {
                base: Money::from_cents(5000),
                per_half_kg: Money::from_cents(1500),
            })),
        }
    }

    /// Creates a rate card that always returns `price`.
    pub fn flat(price: Money) -> Self {
        Self {
            table: Arc::new(RwLock::new(RateTable {
                base: price,
                per_half_kg: Money::zero(),
            })),
        }
    }

    /// Replaces the base price.
    pub fn set_base(&self, base: Money) {
        self.table.write().unwrap().base = base;
    }
}

impl Default for InMemoryRateCard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateCardCalculator for InMemoryRateCard {
    async fn calculate_rto_charges(
        &self,
        shipment: &Shipment,
        _reason: RtoReason,
    ) -> Result<RtoCharges> {
        let table = self.table.read().unwrap();

        let extra_slabs = shipment.weight_grams.saturating_sub(500).div_ceil(500);
        let weight_surcharge = table.per_half_kg.multiply(extra_slabs);

        let breakdown = ChargeBreakdown {
            base: table.base,
            weight_surcharge,
            zone_surcharge: Money::zero(),
        };
        Ok(RtoCharges {
            final_price: breakdown.base + breakdown.weight_surcharge + breakdown.zone_surcharge,
            breakdown,
        })
    }
}
