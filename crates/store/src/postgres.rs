use async_trait::async_trait;
use chrono::Utc;
use common::{CompanyId, NdrId, OrderId, RtoId, ShipmentId, WarehouseId};
use domain::{NdrEvent, NdrStatus, Order, OrderItem, RtoEvent, Shipment, ShipmentStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError, UQ_ACTIVE_RTO_PER_SHIPMENT, UQ_RTO_NDR_EVENT};
use crate::store::{RtoFilter, RtoStore, ensure_rto_writable};
use crate::unit_of_work::{UnitOfWork, WriteOp};

const TERMINAL_STATUSES: &str = "('restocked', 'refurbished', 'disposed', 'claimed', 'cancelled')";

/// PostgreSQL-backed RTO store implementation.
///
/// RTO events are persisted as a JSONB payload alongside the columns the
/// indexes and uniqueness constraints need; the database enforces the
/// one-active-RTO-per-shipment and one-RTO-per-NDR invariants under true
/// concurrent writers.
#[derive(Clone)]
pub struct PostgresRtoStore {
    pool: PgPool,
}

/// Serializes a unit-variant enum to its wire string.
fn enum_str<T: serde::Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(StoreError::Serialization(serde_json::Error::io(
            std::io::Error::other(format!("expected string enum, got {other}")),
        ))),
    }
}

/// Parses a wire string back into a unit-variant enum.
fn parse_enum<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(
        s.to_string(),
    ))?)
}

impl PostgresRtoStore {
    /// Creates a new PostgreSQL RTO store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Seeds a shipment.
    pub async fn insert_shipment(&self, shipment: &Shipment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shipments (id, order_id, company_id, warehouse_id, carrier, awb, weight_grams, zone, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(shipment.id.as_uuid())
        .bind(shipment.order_id.as_uuid())
        .bind(shipment.company_id.as_uuid())
        .bind(shipment.warehouse_id.as_uuid())
        .bind(&shipment.carrier)
        .bind(&shipment.awb)
        .bind(shipment.weight_grams as i32)
        .bind(&shipment.zone)
        .bind(enum_str(&shipment.status)?)
        .bind(shipment.created_at)
        .bind(shipment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Seeds an order.
    pub async fn insert_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, company_id, items, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.company_id.as_uuid())
        .bind(serde_json::to_value(&order.items)?)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Seeds an NDR event.
    pub async fn insert_ndr_event(&self, ndr: &NdrEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ndr_events (id, shipment_id, attempt, courier_remark, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(ndr.id.as_uuid())
        .bind(ndr.shipment_id.as_uuid())
        .bind(ndr.attempt as i32)
        .bind(&ndr.courier_remark)
        .bind(enum_str(&ndr.status)?)
        .bind(ndr.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_shipment(row: PgRow) -> Result<Shipment> {
        let status: String = row.try_get("status")?;
        Ok(Shipment {
            id: ShipmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            company_id: CompanyId::from_uuid(row.try_get::<Uuid, _>("company_id")?),
            warehouse_id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
            carrier: row.try_get("carrier")?,
            awb: row.try_get("awb")?,
            weight_grams: row.try_get::<i32, _>("weight_grams")? as u32,
            zone: row.try_get("zone")?,
            status: parse_enum(&status)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let items: Vec<OrderItem> = serde_json::from_value(row.try_get("items")?)?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            company_id: CompanyId::from_uuid(row.try_get::<Uuid, _>("company_id")?),
            items,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_ndr(row: PgRow) -> Result<NdrEvent> {
        let status: String = row.try_get("status")?;
        Ok(NdrEvent {
            id: NdrId::from_uuid(row.try_get::<Uuid, _>("id")?),
            shipment_id: ShipmentId::from_uuid(row.try_get::<Uuid, _>("shipment_id")?),
            attempt: row.try_get::<i32, _>("attempt")? as u32,
            courier_remark: row.try_get("courier_remark")?,
            status: parse_enum(&status)?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_rto_event(row: PgRow) -> Result<RtoEvent> {
        Ok(serde_json::from_value(row.try_get("payload")?)?)
    }

    async fn insert_rto_event_tx(
        tx: &mut sqlx::PgConnection,
        event: &RtoEvent,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rto_events (id, shipment_id, company_id, warehouse_id, ndr_event_id, reverse_awb, rto_reason, return_status, payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.id().as_uuid())
        .bind(event.shipment_id().as_uuid())
        .bind(event.company_id().as_uuid())
        .bind(event.warehouse_id().as_uuid())
        .bind(event.ndr_event_id().map(|id| id.as_uuid()))
        .bind(event.reverse_awb())
        .bind(event.rto_reason().as_str())
        .bind(event.return_status().as_str())
        .bind(serde_json::to_value(event)?)
        .bind(event.created_at())
        .bind(event.updated_at())
        .execute(tx)
        .await
        .map_err(|e| {
            // Duplicate keys on the named indexes become typed violations
            // the engine translates into domain errors.
            if let sqlx::Error::Database(ref db_err) = e {
                for constraint in [UQ_ACTIVE_RTO_PER_SHIPMENT, UQ_RTO_NDR_EVENT] {
                    if db_err.constraint() == Some(constraint) {
                        return StoreError::UniqueViolation {
                            constraint: constraint.to_string(),
                        };
                    }
                }
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn update_rto_event_tx(
        tx: &mut sqlx::PgConnection,
        event: &RtoEvent,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE rto_events
            SET reverse_awb = $2, return_status = $3, payload = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(event.id().as_uuid())
        .bind(event.reverse_awb())
        .bind(event.return_status().as_str())
        .bind(serde_json::to_value(event)?)
        .bind(event.updated_at())
        .execute(tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "RtoEvent",
                id: event.id().to_string(),
            });
        }
        Ok(())
    }

    async fn set_shipment_status_tx(
        tx: &mut sqlx::PgConnection,
        shipment_id: ShipmentId,
        status: ShipmentStatus,
    ) -> Result<()> {
        ensure_rto_writable(status)?;

        let result = sqlx::query("UPDATE shipments SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(shipment_id.as_uuid())
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "Shipment",
                id: shipment_id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_ndr_status_tx(
        tx: &mut sqlx::PgConnection,
        ndr_id: NdrId,
        status: NdrStatus,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE ndr_events SET status = $2 WHERE id = $1")
            .bind(ndr_id.as_uuid())
            .bind(enum_str(&status)?)
            .execute(tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "NdrEvent",
                id: ndr_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RtoStore for PostgresRtoStore {
    async fn shipment(&self, id: ShipmentId) -> Result<Option<Shipment>> {
        let row = sqlx::query("SELECT * FROM shipments WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_shipment).transpose()
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn ndr_event(&self, id: NdrId) -> Result<Option<NdrEvent>> {
        let row = sqlx::query("SELECT * FROM ndr_events WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_ndr).transpose()
    }

    async fn rto_event(&self, id: RtoId) -> Result<Option<RtoEvent>> {
        let row = sqlx::query("SELECT payload FROM rto_events WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_rto_event).transpose()
    }

    async fn rto_event_by_reverse_awb(&self, reverse_awb: &str) -> Result<Option<RtoEvent>> {
        let row = sqlx::query("SELECT payload FROM rto_events WHERE reverse_awb = $1")
            .bind(reverse_awb)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_rto_event).transpose()
    }

    async fn active_rto_for_shipment(&self, shipment_id: ShipmentId) -> Result<Option<RtoEvent>> {
        let sql = format!(
            "SELECT payload FROM rto_events WHERE shipment_id = $1 AND return_status NOT IN {TERMINAL_STATUSES}"
        );
        let row = sqlx::query(&sql)
            .bind(shipment_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_rto_event).transpose()
    }

    async fn rto_event_for_ndr(&self, ndr_id: NdrId) -> Result<Option<RtoEvent>> {
        let row = sqlx::query("SELECT payload FROM rto_events WHERE ndr_event_id = $1")
            .bind(ndr_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_rto_event).transpose()
    }

    async fn rto_events_for_company(
        &self,
        company_id: CompanyId,
        filter: &RtoFilter,
    ) -> Result<Vec<RtoEvent>> {
        let mut sql = String::from("SELECT payload FROM rto_events WHERE company_id = $1");
        let mut param_count = 1;

        if filter.from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if filter.to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }
        if filter.warehouse_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND warehouse_id = ${param_count}"));
        }
        if filter.reason.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND rto_reason = ${param_count}"));
        }
        sql.push_str(" ORDER BY created_at ASC");

        let mut query = sqlx::query(&sql).bind(company_id.as_uuid());
        if let Some(from) = filter.from {
            query = query.bind(from);
        }
        if let Some(to) = filter.to {
            query = query.bind(to);
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.bind(warehouse_id.as_uuid());
        }
        if let Some(reason) = filter.reason {
            query = query.bind(reason.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_rto_event).collect()
    }

    async fn commit(&self, uow: UnitOfWork) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for op in uow.into_ops() {
            match op {
                WriteOp::InsertRtoEvent(event) => {
                    Self::insert_rto_event_tx(&mut tx, &event).await?;
                }
                WriteOp::UpdateRtoEvent(event) => {
                    Self::update_rto_event_tx(&mut tx, &event).await?;
                }
                WriteOp::SetShipmentStatus { shipment_id, status } => {
                    Self::set_shipment_status_tx(&mut tx, shipment_id, status).await?;
                }
                WriteOp::SetNdrStatus { ndr_id, status } => {
                    Self::set_ndr_status_tx(&mut tx, ndr_id, status).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
