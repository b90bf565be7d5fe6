//! Transfer Database Layer
//!
//! PostgreSQL-backed [`TransferStore`]. A save writes the request row and
//! replaces its item rows inside one transaction; updates are CAS on
//! `version`, so a stale writer affects zero rows and gets `Conflict`.
//!
//! Schema: `migrations/001_transfer_requests.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::error::TransferError;
use super::state::{ItemStatus, TransferStatus};
use super::store::TransferStore;
use super::types::{ItemId, TransferId, TransferItem, TransferPriority, TransferRequest, WarehouseId};

const SELECT_TRANSFER: &str = r#"
    SELECT id, reference_number, source_warehouse_id, destination_warehouse_id,
           status, priority, requested_by, requested_at,
           expected_pickup_date, expected_delivery_date,
           actual_pickup_date, actual_delivery_date, completed_at,
           shipping_carrier, tracking_number, shipping_label_url,
           special_instructions, created_at, updated_at, version
    FROM transfer_requests_tb
"#;

/// PostgreSQL transfer store
pub struct PgTransferStore {
    pool: PgPool,
}

impl PgTransferStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, TransferError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<(), TransferError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Read-only snapshot so the request row and its items agree
    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>, TransferError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        value: &str,
    ) -> Result<Option<TransferRequest>, TransferError> {
        let sql = format!("{} WHERE {} = $1", SELECT_TRANSFER, clause);
        let mut tx = self.begin_snapshot().await?;
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&mut *tx)
            .await?;

        let transfer = match row {
            Some(row) => Some(Self::load_aggregate(&mut tx, &row).await?),
            None => None,
        };
        tx.commit().await?;
        Ok(transfer)
    }

    async fn fetch_all_where(
        &self,
        clause: &str,
        value: &str,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        let sql = format!("{} WHERE {} = $1 ORDER BY id ASC", SELECT_TRANSFER, clause);
        let mut tx = self.begin_snapshot().await?;
        let rows = sqlx::query(&sql)
            .bind(value)
            .fetch_all(&mut *tx)
            .await?;

        let mut transfers = Vec::with_capacity(rows.len());
        for row in rows {
            transfers.push(Self::load_aggregate(&mut tx, &row).await?);
        }
        tx.commit().await?;
        Ok(transfers)
    }

    async fn load_aggregate(
        tx: &mut Transaction<'_, Postgres>,
        row: &PgRow,
    ) -> Result<TransferRequest, TransferError> {
        let mut transfer = row_to_transfer(row)?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, inventory_id, product_id, sku, product_name,
                   requested_quantity, actual_quantity, notes, status,
                   created_at, updated_at
            FROM transfer_items_tb
            WHERE transfer_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(transfer.id.to_string())
        .fetch_all(&mut **tx)
        .await?;

        transfer.items = item_rows
            .iter()
            .map(row_to_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transfer)
    }

    async fn insert_transfer(
        tx: &mut Transaction<'_, Postgres>,
        transfer: &TransferRequest,
    ) -> Result<(), TransferError> {
        let result = sqlx::query(
            r#"
            INSERT INTO transfer_requests_tb
                (id, reference_number, source_warehouse_id, destination_warehouse_id,
                 status, priority, requested_by, requested_at,
                 expected_pickup_date, expected_delivery_date,
                 actual_pickup_date, actual_delivery_date, completed_at,
                 shipping_carrier, tracking_number, shipping_label_url,
                 special_instructions, created_at, updated_at, version)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                 $11, $12, $13, $14, $15, $16, $17, $18, $19, 1)
            "#,
        )
        .bind(transfer.id.to_string())
        .bind(&transfer.reference_number)
        .bind(transfer.source_warehouse_id.as_str())
        .bind(transfer.destination_warehouse_id.as_str())
        .bind(transfer.status.as_str())
        .bind(transfer.priority.as_str())
        .bind(&transfer.requested_by)
        .bind(transfer.requested_at)
        .bind(transfer.expected_pickup_date)
        .bind(transfer.expected_delivery_date)
        .bind(transfer.actual_pickup_date)
        .bind(transfer.actual_delivery_date)
        .bind(transfer.completed_at)
        .bind(&transfer.shipping_carrier)
        .bind(&transfer.tracking_number)
        .bind(&transfer.shipping_label_url)
        .bind(&transfer.special_instructions)
        .bind(transfer.created_at)
        .bind(transfer.updated_at)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::warn!(
                    transfer_id = %transfer.id,
                    reference_number = %transfer.reference_number,
                    constraint = ?db_err.constraint(),
                    "Duplicate transfer on insert"
                );
                Err(TransferError::Conflict(format!(
                    "transfer {} or reference number {} already exists",
                    transfer.id, transfer.reference_number
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// CAS update on version. Returns false if no row matched.
    async fn update_transfer_if(
        tx: &mut Transaction<'_, Postgres>,
        transfer: &TransferRequest,
    ) -> Result<bool, TransferError> {
        let result = sqlx::query(
            r#"
            UPDATE transfer_requests_tb
            SET status = $1, priority = $2,
                actual_pickup_date = $3, actual_delivery_date = $4, completed_at = $5,
                shipping_carrier = $6, tracking_number = $7, shipping_label_url = $8,
                special_instructions = $9, updated_at = $10,
                version = version + 1
            WHERE id = $11 AND version = $12 AND reference_number = $13
            "#,
        )
        .bind(transfer.status.as_str())
        .bind(transfer.priority.as_str())
        .bind(transfer.actual_pickup_date)
        .bind(transfer.actual_delivery_date)
        .bind(transfer.completed_at)
        .bind(&transfer.shipping_carrier)
        .bind(&transfer.tracking_number)
        .bind(&transfer.shipping_label_url)
        .bind(&transfer.special_instructions)
        .bind(transfer.updated_at)
        .bind(transfer.id.to_string())
        .bind(transfer.version)
        .bind(&transfer.reference_number)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn replace_items(
        tx: &mut Transaction<'_, Postgres>,
        transfer: &TransferRequest,
    ) -> Result<(), TransferError> {
        sqlx::query("DELETE FROM transfer_items_tb WHERE transfer_id = $1")
            .bind(transfer.id.to_string())
            .execute(&mut **tx)
            .await?;

        for (position, item) in transfer.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transfer_items_tb
                    (id, transfer_id, position, inventory_id, product_id, sku,
                     product_name, requested_quantity, actual_quantity, notes,
                     status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(item.id.to_string())
            .bind(transfer.id.to_string())
            .bind(position as i32)
            .bind(&item.inventory_id)
            .bind(&item.product_id)
            .bind(&item.sku)
            .bind(&item.product_name)
            .bind(item.requested_quantity)
            .bind(item.actual_quantity)
            .bind(&item.notes)
            .bind(item.status.as_str())
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl TransferStore for PgTransferStore {
    async fn load(&self, id: TransferId) -> Result<Option<TransferRequest>, TransferError> {
        self.fetch_one_where("id", &id.to_string()).await
    }

    async fn load_by_reference_number(
        &self,
        reference_number: &str,
    ) -> Result<Option<TransferRequest>, TransferError> {
        self.fetch_one_where("reference_number", reference_number)
            .await
    }

    async fn save(&self, mut transfer: TransferRequest) -> Result<TransferRequest, TransferError> {
        let mut tx = self.pool.begin().await?;

        if transfer.version == 0 {
            Self::insert_transfer(&mut tx, &transfer).await?;
        } else if !Self::update_transfer_if(&mut tx, &transfer).await? {
            // Dropping tx rolls back
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT version FROM transfer_requests_tb WHERE id = $1",
            )
            .bind(transfer.id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

            return Err(match exists {
                Some(current) => TransferError::Conflict(format!(
                    "transfer {} was modified concurrently (expected version {}, found {})",
                    transfer.id, transfer.version, current
                )),
                None => TransferError::TransferNotFound(transfer.id.to_string()),
            });
        }

        Self::replace_items(&mut tx, &transfer).await?;
        tx.commit().await?;

        transfer.version += 1;
        Ok(transfer)
    }

    async fn list_by_status(
        &self,
        status: TransferStatus,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        self.fetch_all_where("status", status.as_str()).await
    }

    async fn list_by_source_warehouse(
        &self,
        warehouse_id: &WarehouseId,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        self.fetch_all_where("source_warehouse_id", warehouse_id.as_str())
            .await
    }

    async fn list_by_destination_warehouse(
        &self,
        warehouse_id: &WarehouseId,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        self.fetch_all_where("destination_warehouse_id", warehouse_id.as_str())
            .await
    }
}

/// Convert a request row (items not loaded)
fn row_to_transfer(row: &PgRow) -> Result<TransferRequest, TransferError> {
    let id_str: String = row.try_get("id")?;
    let id: TransferId = id_str
        .parse()
        .map_err(|_| TransferError::DatabaseError(format!("Invalid transfer id: {}", id_str)))?;

    let status_str: String = row.try_get("status")?;
    let status: TransferStatus = status_str.parse().map_err(TransferError::DatabaseError)?;

    let priority_str: String = row.try_get("priority")?;
    let priority: TransferPriority = priority_str.parse().map_err(TransferError::DatabaseError)?;

    let source: String = row.try_get("source_warehouse_id")?;
    let destination: String = row.try_get("destination_warehouse_id")?;

    Ok(TransferRequest {
        id,
        reference_number: row.try_get("reference_number")?,
        source_warehouse_id: WarehouseId::new(source),
        destination_warehouse_id: WarehouseId::new(destination),
        status,
        priority,
        items: Vec::new(),
        requested_by: row.try_get("requested_by")?,
        requested_at: row.try_get::<DateTime<Utc>, _>("requested_at")?,
        expected_pickup_date: row.try_get("expected_pickup_date")?,
        expected_delivery_date: row.try_get("expected_delivery_date")?,
        actual_pickup_date: row.try_get("actual_pickup_date")?,
        actual_delivery_date: row.try_get("actual_delivery_date")?,
        completed_at: row.try_get("completed_at")?,
        shipping_carrier: row.try_get("shipping_carrier")?,
        tracking_number: row.try_get("tracking_number")?,
        shipping_label_url: row.try_get("shipping_label_url")?,
        special_instructions: row.try_get("special_instructions")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<TransferItem, TransferError> {
    let id_str: String = row.try_get("id")?;
    let id: ItemId = id_str
        .parse()
        .map_err(|_| TransferError::DatabaseError(format!("Invalid item id: {}", id_str)))?;

    let status_str: String = row.try_get("status")?;
    let status: ItemStatus = status_str.parse().map_err(TransferError::DatabaseError)?;

    Ok(TransferItem {
        id,
        inventory_id: row.try_get("inventory_id")?,
        product_id: row.try_get("product_id")?,
        sku: row.try_get("sku")?,
        product_name: row.try_get("product_name")?,
        requested_quantity: row.try_get("requested_quantity")?,
        actual_quantity: row.try_get("actual_quantity")?,
        notes: row.try_get("notes")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
