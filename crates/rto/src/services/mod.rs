//! Collaborator interfaces consumed by the engine, with in-memory
//! implementations usable as deterministic test doubles.

pub mod courier;
pub mod inventory;
pub mod notify;
pub mod ratecard;
pub mod ratelimit;
pub mod wallet;

pub use courier::{
    CourierAdapter, CourierRegistry, InMemoryCourierAdapter, InMemoryPickupScheduler,
    PickupConfirmation, PickupScheduler, ReverseShipmentResult, TrackingCheckpoint, TrackingInfo,
};
pub use inventory::{InMemoryInventoryAdjuster, InventoryAdjuster, InventoryRecord};
pub use notify::{
    AuditEntry, AuditLogger, InMemoryAuditLogger, InMemoryNotificationDispatcher,
    NotificationDispatcher, NotificationKind, TracingAuditLogger, TracingNotificationDispatcher,
};
pub use ratecard::{ChargeBreakdown, InMemoryRateCard, RateCardCalculator, RtoCharges};
pub use ratelimit::{InMemoryRateLimiter, RateDecision, RateLimiter};
pub use wallet::{ChargeReceipt, InMemoryWalletGateway, WalletChargeGateway};
