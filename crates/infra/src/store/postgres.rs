//! Postgres-backed inventory store.
//!
//! Every ledger write runs in one transaction that first locks the product
//! row (`SELECT … FOR UPDATE`). Concurrent writers to the same product
//! therefore serialize in the database, and a consumption plan computed from
//! a stale snapshot fails its per-batch `quantity = remaining_before` guard.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | StoreError |
//! |------------|-----------------|------------|
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Conflict` |
//! | Database (check violation) | `23514` | `Corrupt` |
//! | Database (numeric value out of range) | `22003` | `Corrupt` |
//! | Database (other) | any other | `Unavailable` |
//! | PoolTimedOut / PoolClosed / Io | N/A | `Unavailable` |
//! | ColumnDecode / Decode | N/A | `Corrupt` |

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use stockledger_core::{EntryId, OperatorId, ProductId};
use stockledger_inventory::{ConsumptionPlan, ReceiveStock, StockInEntry, StockOutEntry};
use stockledger_products::{NewProduct, Product, ProductDetails};

use super::{InventoryStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_inventory_ledger.sql");

const PRODUCT_COLUMNS: &str = "id, name, brand, category, price, quantity, created_by, created_at";
const STOCK_IN_COLUMNS: &str =
    "id, product_id, original_quantity, quantity, operator_id, created_at";
const STOCK_OUT_COLUMNS: &str = "id, product_id, stock_in_id, quantity, operator_id, created_at";

/// Postgres-backed inventory store.
///
/// `PgPool` is internally reference counted, so cloning the store is cheap
/// and clones share connections.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the ledger tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn begin(&self, op: &'static str) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool.begin().await.map_err(|e| map_sqlx_error(op, e))
    }

    /// Lock the product row for the rest of the transaction and return its
    /// current counter.
    async fn lock_product(
        tx: &mut Transaction<'static, Postgres>,
        product_id: ProductId,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT quantity FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id.get())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?
            .ok_or(StoreError::ProductNotFound(product_id))?;
        row.try_get::<i64, _>("quantity")
            .map_err(|e| map_sqlx_error("lock_product", e))
    }

    async fn insert_stock_in(
        tx: &mut Transaction<'static, Postgres>,
        product_id: ProductId,
        quantity: i64,
        operator_id: &OperatorId,
        at: DateTime<Utc>,
    ) -> Result<StockInEntry, StoreError> {
        let sql = format!(
            "INSERT INTO stock_in (product_id, original_quantity, quantity, operator_id, created_at) \
             VALUES ($1, $2, $2, $3, $4) RETURNING {STOCK_IN_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(product_id.get())
            .bind(quantity)
            .bind(operator_id.as_str())
            .bind(at)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_stock_in", e))?;
        stock_in_from_row(&row)
    }

    async fn record_stock_out(
        tx: &mut Transaction<'static, Postgres>,
        product_id: ProductId,
        stock_in_id: EntryId,
        quantity: i64,
        operator_id: &OperatorId,
        at: DateTime<Utc>,
    ) -> Result<StockOutEntry, StoreError> {
        let sql = format!(
            "INSERT INTO stock_out (product_id, stock_in_id, quantity, operator_id, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {STOCK_OUT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(product_id.get())
            .bind(stock_in_id.get())
            .bind(quantity)
            .bind(operator_id.as_str())
            .bind(at)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("record_stock_out", e))?;
        stock_out_from_row(&row)
    }

    async fn adjust_counter(
        tx: &mut Transaction<'static, Postgres>,
        product_id: ProductId,
        delta: i64,
    ) -> Result<Product, StoreError> {
        let sql = format!(
            "UPDATE products SET quantity = quantity + $1 WHERE id = $2 RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(delta)
            .bind(product_id.get())
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("adjust_counter", e))?;
        product_from_row(&row)
    }

    async fn sum(&self, sql: &str, product_id: ProductId, op: &'static str) -> Result<i64, StoreError> {
        let row = sqlx::query(sql)
            .bind(product_id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(op, e))?;
        row.try_get::<i64, _>("total")
            .map_err(|e| map_sqlx_error(op, e))
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, cmd), fields(initial_quantity = cmd.initial_quantity), err)]
    async fn create_product(
        &self,
        cmd: &NewProduct,
    ) -> Result<(Product, Option<StockInEntry>), StoreError> {
        let mut tx = self.begin("create_product").await?;

        let sql = format!(
            "INSERT INTO products (name, brand, category, price, quantity, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&cmd.details.name)
            .bind(&cmd.details.brand)
            .bind(&cmd.details.category)
            .bind(cmd.details.price)
            .bind(cmd.initial_quantity)
            .bind(cmd.operator_id.as_str())
            .bind(cmd.occurred_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_product", e))?;
        let product = product_from_row(&row)?;

        let opening = if cmd.initial_quantity > 0 {
            Some(
                Self::insert_stock_in(
                    &mut tx,
                    product.id(),
                    cmd.initial_quantity,
                    &cmd.operator_id,
                    cmd.occurred_at,
                )
                .await?,
            )
        } else {
            None
        };

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_product", e))?;
        Ok((product, opening))
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(product_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self, details), fields(product_id = %product_id), err)]
    async fn update_product_details(
        &self,
        product_id: ProductId,
        details: &ProductDetails,
    ) -> Result<Product, StoreError> {
        let sql = format!(
            "UPDATE products SET name = $1, brand = $2, category = $3, price = $4 \
             WHERE id = $5 RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&details.name)
            .bind(&details.brand)
            .bind(&details.category)
            .bind(details.price)
            .bind(product_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_product_details", e))?
            .ok_or(StoreError::ProductNotFound(product_id))?;
        product_from_row(&row)
    }

    #[instrument(
        skip(self, cmd),
        fields(product_id = %cmd.product_id, quantity = cmd.quantity),
        err
    )]
    async fn record_stock_in(&self, cmd: &ReceiveStock) -> Result<StockInEntry, StoreError> {
        let mut tx = self.begin("record_stock_in").await?;
        let live = Self::lock_product(&mut tx, cmd.product_id).await?;
        if live.checked_add(cmd.quantity).is_none() {
            return Err(StoreError::Rejected(format!(
                "receiving {} would overflow the stock counter of product {}",
                cmd.quantity, cmd.product_id
            )));
        }

        // SUM over BIGINT yields NUMERIC, so the comparison cannot overflow.
        let row = sqlx::query(
            "SELECT COALESCE(SUM(original_quantity), 0) + $2 > 9223372036854775807 AS overflows \
             FROM stock_in WHERE product_id = $1",
        )
        .bind(cmd.product_id.get())
        .bind(cmd.quantity)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("record_stock_in", e))?;
        let overflows: bool = row
            .try_get("overflows")
            .map_err(|e| map_sqlx_error("record_stock_in", e))?;
        if overflows {
            return Err(StoreError::Rejected(format!(
                "receiving {} would overflow the stock-in total of product {}",
                cmd.quantity, cmd.product_id
            )));
        }

        let entry = Self::insert_stock_in(
            &mut tx,
            cmd.product_id,
            cmd.quantity,
            &cmd.operator_id,
            cmd.occurred_at,
        )
        .await?;
        Self::adjust_counter(&mut tx, cmd.product_id, cmd.quantity).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("record_stock_in", e))?;
        Ok(entry)
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn list_open_stock_in(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockInEntry>, StoreError> {
        let sql = format!(
            "SELECT {STOCK_IN_COLUMNS} FROM stock_in \
             WHERE product_id = $1 AND quantity > 0 \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(product_id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_open_stock_in", e))?;
        rows.iter().map(stock_in_from_row).collect()
    }

    #[instrument(
        skip(self, plan, operator_id),
        fields(
            product_id = %plan.product_id(),
            steps = plan.steps().len(),
            consumed = plan.consumed()
        ),
        err
    )]
    async fn commit_consumption(
        &self,
        plan: &ConsumptionPlan,
        operator_id: &OperatorId,
        at: DateTime<Utc>,
    ) -> Result<Vec<StockOutEntry>, StoreError> {
        let product_id = plan.product_id();
        let mut tx = self.begin("commit_consumption").await?;

        let live = Self::lock_product(&mut tx, product_id).await?;
        if live < plan.consumed() {
            return Err(StoreError::Corrupt(format!(
                "stock counter {live} below planned consumption {}",
                plan.consumed()
            )));
        }

        let mut stock_out = Vec::with_capacity(plan.steps().len());
        for step in plan.steps() {
            let drained = sqlx::query(
                "UPDATE stock_in SET quantity = quantity - $1 \
                 WHERE id = $2 AND product_id = $3 AND quantity = $4",
            )
            .bind(step.take)
            .bind(step.stock_in_id.get())
            .bind(product_id.get())
            .bind(step.remaining_before)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("commit_consumption", e))?;

            // Dropping `tx` on the early return rolls back earlier steps.
            if drained.rows_affected() != 1 {
                return Err(StoreError::Conflict(format!(
                    "stock-in {} no longer holds {}",
                    step.stock_in_id, step.remaining_before
                )));
            }

            stock_out.push(
                Self::record_stock_out(
                    &mut tx,
                    product_id,
                    step.stock_in_id,
                    step.take,
                    operator_id,
                    at,
                )
                .await?,
            );
        }

        Self::adjust_counter(&mut tx, product_id, -plan.consumed()).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_consumption", e))?;
        Ok(stock_out)
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn sum_stock_in(&self, product_id: ProductId) -> Result<i64, StoreError> {
        self.sum(
            "SELECT COALESCE(SUM(original_quantity), 0)::BIGINT AS total \
             FROM stock_in WHERE product_id = $1",
            product_id,
            "sum_stock_in",
        )
        .await
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn sum_stock_out(&self, product_id: ProductId) -> Result<i64, StoreError> {
        self.sum(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT AS total \
             FROM stock_out WHERE product_id = $1",
            product_id,
            "sum_stock_out",
        )
        .await
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn list_stock_in(&self, product_id: ProductId) -> Result<Vec<StockInEntry>, StoreError> {
        let sql = format!(
            "SELECT {STOCK_IN_COLUMNS} FROM stock_in WHERE product_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(product_id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_stock_in", e))?;
        rows.iter().map(stock_in_from_row).collect()
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn list_stock_out(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockOutEntry>, StoreError> {
        let sql = format!(
            "SELECT {STOCK_OUT_COLUMNS} FROM stock_out WHERE product_id = $1 ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(product_id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_stock_out", e))?;
        rows.iter().map(stock_out_from_row).collect()
    }
}

fn operator_from_row(row: &PgRow, column: &str) -> Result<OperatorId, StoreError> {
    let raw: String = row
        .try_get(column)
        .map_err(|e| map_sqlx_error("decode", e))?;
    OperatorId::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let decode = |e| map_sqlx_error("decode_product", e);
    Ok(Product::restore(
        ProductId::new(row.try_get("id").map_err(decode)?),
        ProductDetails {
            name: row.try_get("name").map_err(decode)?,
            brand: row.try_get("brand").map_err(decode)?,
            category: row.try_get("category").map_err(decode)?,
            price: row.try_get("price").map_err(decode)?,
        },
        row.try_get("quantity").map_err(decode)?,
        operator_from_row(row, "created_by")?,
        row.try_get("created_at").map_err(decode)?,
    ))
}

fn stock_in_from_row(row: &PgRow) -> Result<StockInEntry, StoreError> {
    let decode = |e| map_sqlx_error("decode_stock_in", e);
    Ok(StockInEntry {
        id: EntryId::new(row.try_get("id").map_err(decode)?),
        product_id: ProductId::new(row.try_get("product_id").map_err(decode)?),
        original_quantity: row.try_get("original_quantity").map_err(decode)?,
        quantity: row.try_get("quantity").map_err(decode)?,
        operator_id: operator_from_row(row, "operator_id")?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

fn stock_out_from_row(row: &PgRow) -> Result<StockOutEntry, StoreError> {
    let decode = |e| map_sqlx_error("decode_stock_out", e);
    Ok(StockOutEntry {
        id: EntryId::new(row.try_get("id").map_err(decode)?),
        product_id: ProductId::new(row.try_get("product_id").map_err(decode)?),
        quantity: row.try_get("quantity").map_err(decode)?,
        stock_in_id: EntryId::new(row.try_get("stock_in_id").map_err(decode)?),
        operator_id: operator_from_row(row, "operator_id")?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

fn map_sqlx_error(op: &'static str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("40001") | Some("40P01") => StoreError::Conflict(format!("{op}: {db}")),
            Some("23514") | Some("22003") => StoreError::Corrupt(format!("{op}: {db}")),
            _ => StoreError::Unavailable(format!("{op}: {db}")),
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("{op}: {err}"))
        }
        _ => StoreError::Unavailable(format!("{op}: {err}")),
    }
}
