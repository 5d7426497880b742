use thiserror::Error;

/// Name of the partial unique index guaranteeing at most one active RTO
/// per shipment.
pub const UQ_ACTIVE_RTO_PER_SHIPMENT: &str = "uq_rto_events_active_shipment";

/// Name of the unique index guaranteeing one RTO per NDR event.
pub const UQ_RTO_NDR_EVENT: &str = "uq_rto_events_ndr_event";

/// Name of the guard rejecting shipment status writes outside the RTO
/// vocabulary.
pub const CHK_SHIPMENT_RTO_VOCABULARY: &str = "chk_shipment_rto_vocabulary";

/// Errors that can occur when interacting with the RTO store.
///
/// Workflow code never branches on storage internals; duplicate keys are
/// surfaced as a named `UniqueViolation` and translated into domain
/// errors by the engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was violated at commit time.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A write was rejected by a storage-level guard.
    #[error("Write rejected by constraint {constraint}")]
    CheckViolation { constraint: &'static str },

    /// The targeted entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if this is a unique violation on the named constraint.
    pub fn is_unique_violation(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
