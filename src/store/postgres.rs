//! PostgreSQL backend
//!
//! Orders are stored as a JSON document with the columns needed for
//! filtering, ordering, revenue and optimistic versioning lifted out.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine, Order, OrderStatus, Product};
use crate::domain::value_objects::{Money, OrderId, ProductId, Quantity, UserId};
use crate::store::{CartStore, OrderFilter, OrderSlice, OrderStore, PageRequest, ProductCatalog};
use crate::{EngineError, Result};

#[derive(Clone, Debug)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EngineError::StorageError(e.to_string()))
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => EngineError::NotFound("Record".into()),
            other => EngineError::StorageError(other.to_string()),
        }
    }
}

fn quantity_from_row(raw: i32) -> Result<Quantity> {
    u32::try_from(raw)
        .ok()
        .and_then(|q| Quantity::new(q).ok())
        .ok_or_else(|| EngineError::StorageError(format!("invalid stored quantity {raw}")))
}

fn quantity_to_row(quantity: Quantity) -> Result<i32> {
    i32::try_from(quantity.value()).map_err(|_| EngineError::InvalidArgument(format!("quantity {quantity} is too large")))
}

fn version_to_row(version: u64) -> Result<i64> {
    i64::try_from(version).map_err(|_| EngineError::StorageError(format!("version {version} out of range")))
}

fn status_counts(rows: Vec<(String, i64)>) -> Result<Vec<(OrderStatus, u64)>> {
    rows.into_iter()
        .map(|(status, count)| {
            let status = status.parse::<OrderStatus>().map_err(|e| EngineError::StorageError(e.to_string()))?;
            Ok((status, u64::try_from(count).unwrap_or(0)))
        })
        .collect()
}

#[async_trait]
impl ProductCatalog for PgStore {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row: Option<(Uuid, String, Decimal, Decimal, String, bool)> = sqlx::query_as(
            "SELECT id, name, price, offer_price, currency, in_stock FROM products WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, price, offer_price, currency, in_stock)| {
            Product::new(id.into(), name, Money::new(price, &currency), Money::new(offer_price, &currency), in_stock)
        }))
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn load_cart(&self, owner: &UserId) -> Result<Cart> {
        let rows: Vec<(Uuid, i32)> = sqlx::query_as(
            "SELECT product_id, quantity FROM cart_items WHERE owner_id = $1 ORDER BY created_at, product_id",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;
        let lines = rows
            .into_iter()
            .map(|(product_id, quantity)| Ok(CartLine { product_id: product_id.into(), quantity: quantity_from_row(quantity)? }))
            .collect::<Result<Vec<_>>>()?;
        Ok(Cart::from_lines(owner.clone(), lines))
    }

    async fn add_line(&self, owner: &UserId, product_id: ProductId, quantity: Quantity) -> Result<Quantity> {
        let (new_quantity,): (i32,) = sqlx::query_as(
            "INSERT INTO cart_items (owner_id, product_id, quantity, created_at) VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (owner_id, product_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
             RETURNING quantity",
        )
        .bind(owner.as_str())
        .bind(product_id.as_uuid())
        .bind(quantity_to_row(quantity)?)
        .fetch_one(&self.pool)
        .await?;
        quantity_from_row(new_quantity)
    }

    async fn set_line_quantity(&self, owner: &UserId, product_id: ProductId, quantity: Quantity) -> Result<bool> {
        let result = sqlx::query("UPDATE cart_items SET quantity = $3 WHERE owner_id = $1 AND product_id = $2")
            .bind(owner.as_str())
            .bind(product_id.as_uuid())
            .bind(quantity_to_row(quantity)?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_line(&self, owner: &UserId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE owner_id = $1 AND product_id = $2")
            .bind(owner.as_str())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, owner: &UserId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE owner_id = $1").bind(owner.as_str()).execute(&self.pool).await?;
        Ok(())
    }

    /// Lines holding no more than the snapshot are deleted before the rest are
    /// decremented, since `quantity >= 1` is checked on every row write.
    async fn remove_lines(&self, owner: &UserId, lines: &[CartLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            let quantity = quantity_to_row(line.quantity)?;
            sqlx::query("DELETE FROM cart_items WHERE owner_id = $1 AND product_id = $2 AND quantity <= $3")
                .bind(owner.as_str())
                .bind(line.product_id.as_uuid())
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "UPDATE cart_items SET quantity = quantity - $3 WHERE owner_id = $1 AND product_id = $2 AND quantity > $3",
            )
            .bind(owner.as_str())
            .bind(line.product_id.as_uuid())
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, owner_id, status, total, currency, created_at, updated_at, version, document) \
             VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8)",
        )
        .bind(order.id().as_uuid())
        .bind(order.owner().as_str())
        .bind(order.status().as_str())
        .bind(order.total().amount())
        .bind(order.total().currency())
        .bind(order.created_at())
        .bind(version_to_row(order.version())?)
        .bind(Json(order))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row: Option<(Json<Order>,)> = sqlx::query_as("SELECT document FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(order),)| order))
    }

    async fn update_order(&self, order: &Order, expected_version: u64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, document = $3, version = $4, updated_at = NOW() \
             WHERE id = $1 AND version = $5",
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(Json(order))
        .bind(version_to_row(order.version())?)
        .bind(version_to_row(expected_version)?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
            .bind(order.id().as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Err(EngineError::Conflict(order.id())),
            None => Err(EngineError::NotFound(format!("Order {}", order.id()))),
        }
    }

    async fn list_orders(&self, filter: &OrderFilter, page: Option<PageRequest>) -> Result<OrderSlice> {
        let owner = filter.owner.as_ref().map(UserId::as_str);
        let status = filter.status.map(|s| s.as_str());
        let (limit, offset) = match page {
            Some(p) => (Some(i64::from(p.limit)), i64::try_from(p.offset()).unwrap_or(i64::MAX)),
            None => (None, 0),
        };
        let rows: Vec<(Json<Order>,)> = sqlx::query_as(
            "SELECT document FROM orders \
             WHERE ($1::text IS NULL OR owner_id = $1) AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
        )
        .bind(owner)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR owner_id = $1) AND ($2::text IS NULL OR status = $2)",
        )
        .bind(owner)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(OrderSlice {
            orders: rows.into_iter().map(|(Json(order),)| order).collect(),
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn count_by_status(&self) -> Result<Vec<(OrderStatus, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        status_counts(rows)
    }

    async fn revenue(&self, statuses: &[OrderStatus], currency: &str) -> Result<Money> {
        let statuses: Vec<&str> = statuses.iter().map(OrderStatus::as_str).collect();
        let (sum,): (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(total), 0) FROM orders WHERE status = ANY($1) AND currency = $2",
        )
        .bind(&statuses)
        .bind(currency)
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::new(sum, currency))
    }
}
