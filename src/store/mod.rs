//! Storage seams
//!
//! The catalog is a read-only collaborator. Carts and orders are written
//! through single-statement operations so each one is atomic per owner or
//! per order on every backend.

use async_trait::async_trait;

use crate::domain::aggregates::{Cart, CartLine, Order, OrderStatus, Product};
use crate::domain::value_objects::{Money, OrderId, ProductId, Quantity, UserId};
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Product lookup. Must return the price in effect at the time of the call.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns an empty cart for owners that have never added anything.
    async fn load_cart(&self, owner: &UserId) -> Result<Cart>;

    /// Atomically adds `quantity` to the owner's line for `product_id`,
    /// creating the cart and the line as needed. Returns the line's new quantity.
    async fn add_line(&self, owner: &UserId, product_id: ProductId, quantity: Quantity) -> Result<Quantity>;

    /// Returns `false` when the owner has no line for `product_id`.
    async fn set_line_quantity(&self, owner: &UserId, product_id: ProductId, quantity: Quantity) -> Result<bool>;

    /// Returns `false` when there was nothing to remove.
    async fn remove_line(&self, owner: &UserId, product_id: ProductId) -> Result<bool>;

    async fn clear_cart(&self, owner: &UserId) -> Result<()>;

    /// Atomically subtracts each given line's quantity from the owner's cart,
    /// deleting lines that reach zero. Units added since `lines` were read stay.
    async fn remove_lines(&self, owner: &UserId, lines: &[CartLine]) -> Result<()>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub owner: Option<UserId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.owner.as_ref().map_or(true, |o| o == order.owner())
            && self.status.map_or(true, |s| s == order.status())
    }
}

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest { pub page: u32, pub limit: u32 }

impl PageRequest {
    /// Page defaults to 1, limit to 10; limit is clamped to 1..=100.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }
    pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.limit) }
    pub fn total_pages(&self, total: u64) -> u64 { total.div_ceil(u64::from(self.limit)) }
}

impl Default for PageRequest { fn default() -> Self { Self::new(None, None) } }

/// One page of orders plus the number of orders matching the filter.
#[derive(Clone, Debug)]
pub struct OrderSlice { pub orders: Vec<Order>, pub total: u64 }

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<()>;

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Writes `order` only if the stored copy is still at `expected_version`.
    /// Fails with `Conflict` otherwise, or `NotFound` if the order is gone.
    async fn update_order(&self, order: &Order, expected_version: u64) -> Result<()>;

    /// Newest first. `page: None` returns every match.
    async fn list_orders(&self, filter: &OrderFilter, page: Option<PageRequest>) -> Result<OrderSlice>;

    /// Only statuses with at least one order are returned.
    async fn count_by_status(&self) -> Result<Vec<(OrderStatus, u64)>>;

    /// Sum of order totals over orders currently in one of `statuses`.
    async fn revenue(&self, statuses: &[OrderStatus], currency: &str) -> Result<Money>;
}
