//! Shipment entity, partially owned by the RTO engine.
//!
//! The engine reads the full delivery status but writes only the RTO
//! vocabulary; the store rejects any other write.

use chrono::{DateTime, Utc};
use common::{CompanyId, OrderId, ShipmentId, WarehouseId};
use serde::{Deserialize, Serialize};

/// Delivery status of a forward shipment, including the reverse leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    /// Label created, not yet handed to the courier.
    Created,

    /// Moving through the courier network.
    InTransit,

    /// On the last-mile vehicle.
    OutForDelivery,

    /// Delivered to the consignee (terminal for the forward leg).
    Delivered,

    /// A delivery attempt failed; awaiting NDR resolution.
    Ndr,

    /// Return to origin triggered.
    RtoInitiated,

    /// Return leg in motion.
    RtoInTransit,

    /// Return leg delivered back to the warehouse.
    RtoDelivered,
}

impl ShipmentStatus {
    /// Returns true if the shipment is currently in an active RTO state.
    pub fn is_active_rto(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::RtoInitiated
                | ShipmentStatus::RtoInTransit
                | ShipmentStatus::RtoDelivered
        )
    }

    /// Returns true if the RTO engine is allowed to write this status.
    ///
    /// `Ndr` is included so a cancelled return can release the shipment
    /// back to its pre-trigger state.
    pub fn is_rto_writable(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::Ndr
                | ShipmentStatus::RtoInitiated
                | ShipmentStatus::RtoInTransit
                | ShipmentStatus::RtoDelivered
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Created => "created",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::OutForDelivery => "out_for_delivery",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Ndr => "ndr",
            ShipmentStatus::RtoInitiated => "rto_initiated",
            ShipmentStatus::RtoInTransit => "rto_in_transit",
            ShipmentStatus::RtoDelivered => "rto_delivered",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A forward shipment handed to a third-party courier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    /// Courier identifier as the seller configured it (may be an alias).
    pub carrier: String,
    /// Forward-leg tracking id.
    pub awb: String,
    /// Chargeable weight in grams.
    pub weight_grams: u32,
    /// Destination zone used by rate cards.
    pub zone: String,
    pub status: ShipmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// Returns true if the forward leg already completed.
    pub fn is_delivered(&self) -> bool {
        self.status == ShipmentStatus::Delivered
    }
}
