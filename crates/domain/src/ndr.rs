//! Non-delivery report entity, the idempotency key for auto triggers.

use chrono::{DateTime, Utc};
use common::{NdrId, ShipmentId};
use serde::{Deserialize, Serialize};

/// Resolution state of a non-delivery report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NdrStatus {
    /// Awaiting action (reattempt, address fix, or RTO).
    Pending,

    /// A later delivery attempt succeeded.
    Resolved,

    /// This NDR produced an RTO; it must never produce another.
    RtoTriggered,
}

impl NdrStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            NdrStatus::Pending => "pending",
            NdrStatus::Resolved => "resolved",
            NdrStatus::RtoTriggered => "rto_triggered",
        }
    }
}

impl std::fmt::Display for NdrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A courier-reported failed delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NdrEvent {
    pub id: NdrId,
    pub shipment_id: ShipmentId,
    /// Which delivery attempt failed (1-based).
    pub attempt: u32,
    /// Courier-supplied failure reason, verbatim.
    pub courier_remark: String,
    pub status: NdrStatus,
    pub created_at: DateTime<Utc>,
}
