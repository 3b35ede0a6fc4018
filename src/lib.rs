//! Storefront Orders
//!
//! Cart aggregate and order lifecycle engine for the storefront.
//!
//! ## Features
//! - Per-shopper carts priced from the live catalog
//! - Checkout into an immutable, priced order snapshot
//! - Order status lifecycle with tracking history and cancellation rules
//! - Seller order listing and revenue statistics
//! - In-memory and PostgreSQL storage, optional NATS event publishing

use thiserror::Error;

pub mod api;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use domain::aggregates::{
    Cart, CartLine, CartSnapshot, LineItem, Order, OrderStatus, OrderView, PaymentMethod, PaymentStatus,
    Product, TransitionPolicy,
};
pub use domain::value_objects::{
    Caller, Money, OrderId, ProductId, Quantity, SellerId, ShippingAddress, UserId,
};
pub use services::{CartService, Checkout, OrderPage, OrderQuery, OrderService, OrderStats};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Order {0} was modified concurrently")]
    Conflict(OrderId),

    #[error("Order {order_id} was placed but the cart could not be cleared: {reason}")]
    CartNotCleared { order_id: OrderId, reason: String },

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
