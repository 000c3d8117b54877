use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    CatalogItem, CustomerDetails, ItemId, Money, Order, OrderOrigin, OrderPatch, OrderStatus,
    PaymentSignal, PricedLine, RepricePatch, SizeOption, to_major_units,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OrderId, Result, StoreError,
    store::{CatalogStore, OrderStore, UpsertOutcome},
};

const ORDER_COLUMNS: &str = "order_id, status, items, purchase_cost, purchase_cost_minor, \
     customer, charge_id, expire_at, origin, created_at, updated_at";

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?);

        let status: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status).ok_or_else(|| StoreError::Corrupt {
            key: order_id.to_string(),
            reason: format!("unknown status '{status}'"),
        })?;

        let origin: String = row.try_get("origin")?;
        let origin = OrderOrigin::parse(&origin).ok_or_else(|| StoreError::Corrupt {
            key: order_id.to_string(),
            reason: format!("unknown origin '{origin}'"),
        })?;

        let items: Vec<PricedLine> = serde_json::from_value(row.try_get("items")?)?;
        let customer: Option<CustomerDetails> = row
            .try_get::<Option<serde_json::Value>, _>("customer")?
            .map(serde_json::from_value)
            .transpose()?;

        Ok(Order {
            order_id,
            status,
            items,
            purchase_cost: row.try_get("purchase_cost")?,
            purchase_cost_minor: Money::from_minor(row.try_get("purchase_cost_minor")?),
            customer,
            charge_id: row.try_get("charge_id")?,
            expire_at: row.try_get("expire_at")?,
            origin,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn reprice(
        &self,
        order_id: OrderId,
        patch: &RepricePatch,
        now: DateTime<Utc>,
    ) -> Result<Option<UpsertOutcome>> {
        let items = serde_json::to_value(&patch.items)?;
        let customer = patch
            .customer
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        // Same precondition as `Order::is_resumable`.
        let sql = format!(
            r#"
            UPDATE orders
            SET items = $2,
                purchase_cost_minor = $3,
                purchase_cost = $4,
                customer = COALESCE($5::JSONB, customer),
                expire_at = $6,
                updated_at = $7
            WHERE order_id = $1 AND status = 'pending' AND expire_at IS NOT NULL
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .bind(items)
            .bind(patch.purchase_cost_minor.minor_units())
            .bind(to_major_units(patch.purchase_cost_minor))
            .bind(customer)
            .bind(patch.expire_at)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(UpsertOutcome {
                order: Self::row_to_order(&row)?,
                changed: true,
            })
        })
        .transpose()
    }

    /// One statement: the CTE locks the row and captures its prior values,
    /// the UPDATE applies status precedence (see `order_status_rank`).
    async fn apply_signal(
        &self,
        order_id: OrderId,
        signal: &PaymentSignal,
        now: DateTime<Utc>,
    ) -> Result<Option<UpsertOutcome>> {
        let sql = r#"
            WITH prev AS (
                SELECT order_id, status, charge_id, expire_at
                FROM orders
                WHERE order_id = $1
                FOR UPDATE
            )
            UPDATE orders AS o
            SET status = CASE
                    WHEN order_status_rank($2) >= order_status_rank(o.status) THEN $2
                    ELSE o.status
                END,
                charge_id = CASE
                    WHEN $3::TEXT IS NOT NULL
                         AND order_status_rank($2) >= order_status_rank(o.status) THEN $3
                    ELSE o.charge_id
                END,
                expire_at = NULL,
                updated_at = CASE
                    WHEN o.expire_at IS NOT NULL
                         OR (order_status_rank($2) >= order_status_rank(o.status)
                             AND (o.status <> $2
                                  OR ($3::TEXT IS NOT NULL AND o.charge_id IS DISTINCT FROM $3)))
                    THEN $4
                    ELSE o.updated_at
                END
            FROM prev
            WHERE o.order_id = prev.order_id
            RETURNING o.order_id, o.status, o.items, o.purchase_cost, o.purchase_cost_minor, o.customer,
                      o.charge_id, o.expire_at, o.origin, o.created_at, o.updated_at,
                      prev.status AS prev_status,
                      prev.charge_id AS prev_charge_id,
                      prev.expire_at AS prev_expire_at
        "#;

        let row = sqlx::query(sql)
            .bind(order_id.as_uuid())
            .bind(signal.target_status().as_str())
            .bind(signal.charge_id())
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let order = Self::row_to_order(&row)?;
        let prev_status: String = row.try_get("prev_status")?;
        let prev_charge_id: Option<String> = row.try_get("prev_charge_id")?;
        let prev_expire_at: Option<DateTime<Utc>> = row.try_get("prev_expire_at")?;

        let changed = prev_expire_at.is_some()
            || prev_status != order.status.as_str()
            || prev_charge_id != order.charge_id;

        Ok(Some(UpsertOutcome { order, changed }))
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn find_pending_by_order_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 AND status = 'pending'"
        );
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn create(&self, order: Order) -> Result<()> {
        let items = serde_json::to_value(&order.items)?;
        let customer = order
            .customer
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let order_id = order.order_id;

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, status, items, purchase_cost_minor, purchase_cost,
                                customer, charge_id, expire_at, origin, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(order.status.as_str())
        .bind(items)
        .bind(order.purchase_cost_minor.minor_units())
        .bind(order.purchase_cost)
        .bind(customer)
        .bind(&order.charge_id)
        .bind(order.expire_at)
        .bind(order.origin.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_id")
            {
                return StoreError::DuplicateOrder(order_id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn upsert(
        &self,
        order_id: OrderId,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<UpsertOutcome>> {
        match patch {
            OrderPatch::Reprice(reprice) => self.reprice(order_id, reprice, now).await,
            OrderPatch::Signal(signal) => self.apply_signal(order_id, signal, now).await,
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM orders WHERE expire_at IS NOT NULL AND expire_at <= $1")
                .bind(now)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}

/// PostgreSQL-backed catalog.
#[derive(Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    /// Creates a new PostgreSQL catalog store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_item(row: &PgRow) -> Result<CatalogItem> {
        let sizes: Vec<SizeOption> = serde_json::from_value(row.try_get("sizes")?)?;
        Ok(CatalogItem {
            id: ItemId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            image: row.try_get("image")?,
            published: row.try_get("published")?,
            sizes,
        })
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn list_published_items(&self) -> Result<Vec<CatalogItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, image, published, sizes
            FROM catalog_items
            WHERE published
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn find_item_by_id(&self, item_id: &ItemId) -> Result<Option<CatalogItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, image, published, sizes
            FROM catalog_items
            WHERE id = $1
            "#,
        )
        .bind(item_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn put_item(&self, item: CatalogItem) -> Result<()> {
        item.validate()?;
        let sizes = serde_json::to_value(&item.sizes)?;

        sqlx::query(
            r#"
            INSERT INTO catalog_items (id, name, image, published, sizes, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                image = EXCLUDED.image,
                published = EXCLUDED.published,
                sizes = EXCLUDED.sizes,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(item.id.as_str())
        .bind(&item.name)
        .bind(&item.image)
        .bind(item.published)
        .bind(sizes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

