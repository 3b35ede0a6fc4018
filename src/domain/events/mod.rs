//! Domain events
use crate::domain::aggregates::order::{CancelledBy, OrderStatus};
use crate::domain::value_objects::{OrderId, ProductId, UserId};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DomainEvent {
    Cart(CartEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CartEvent {
    ItemAdded { owner: UserId, product_id: ProductId, quantity: u32 },
    QuantityChanged { owner: UserId, product_id: ProductId, quantity: u32 },
    ItemRemoved { owner: UserId, product_id: ProductId },
    Cleared { owner: UserId },
    /// The lines snapshotted into `order_id` were taken out of the cart.
    CheckedOut { owner: UserId, order_id: OrderId },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OrderEvent {
    Placed { order_id: OrderId, owner: UserId, total: Decimal },
    StatusChanged { order_id: OrderId, from: OrderStatus, to: OrderStatus },
    Cancelled { order_id: OrderId, by: CancelledBy },
}

impl DomainEvent {
    /// NATS subject under `prefix`, e.g. `storefront.orders.placed`.
    pub fn subject(&self, prefix: &str) -> String {
        let (stream, kind) = match self {
            Self::Cart(CartEvent::ItemAdded { .. }) => ("carts", "item_added"),
            Self::Cart(CartEvent::QuantityChanged { .. }) => ("carts", "quantity_changed"),
            Self::Cart(CartEvent::ItemRemoved { .. }) => ("carts", "item_removed"),
            Self::Cart(CartEvent::Cleared { .. }) => ("carts", "cleared"),
            Self::Cart(CartEvent::CheckedOut { .. }) => ("carts", "checked_out"),
            Self::Order(OrderEvent::Placed { .. }) => ("orders", "placed"),
            Self::Order(OrderEvent::StatusChanged { .. }) => ("orders", "status_changed"),
            Self::Order(OrderEvent::Cancelled { .. }) => ("orders", "cancelled"),
        };
        format!("{prefix}.{stream}.{kind}")
    }
}
