//! Order lifecycle engine
//!
//! Checkout reads each cart line's current offer price once, freezes it into
//! the order, persists the order and only then takes the ordered lines out of
//! the cart. A catalog price change committed after those reads is not
//! reflected in the order, and units added to the cart meanwhile stay there.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::aggregates::{LineItem, NewOrder, Order, OrderStatus, OrderView, PaymentMethod, Product, TransitionPolicy};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{Caller, Money, OrderId, ProductId, ShippingAddress, UserId};
use crate::messaging::{publish_all, EventPublisher};
use crate::store::{CartStore, OrderFilter, OrderStore, PageRequest, ProductCatalog};
use crate::{EngineError, Result};

/// Buyer input for `place_order`.
#[derive(Clone, Debug, Default)]
pub struct Checkout {
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    /// `None` returns every matching order on a single page.
    pub page: Option<PageRequest>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<OrderView>,
    pub total_pages: u64,
    pub current_page: u32,
    pub total: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub confirmed_orders: u64,
    pub processing_orders: u64,
    pub shipped_orders: u64,
    pub delivered_orders: u64,
    pub cancelled_orders: u64,
    pub total_revenue: Money,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn ProductCatalog>,
    publisher: Arc<dyn EventPublisher>,
    policy: TransitionPolicy,
    currency: String,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        carts: Arc<dyn CartStore>,
        catalog: Arc<dyn ProductCatalog>,
        publisher: Arc<dyn EventPublisher>,
        currency: impl Into<String>,
    ) -> Self {
        Self { orders, carts, catalog, publisher, policy: TransitionPolicy::default(), currency: currency.into() }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self { self.policy = policy; self }

    /// Converts the buyer's cart into a priced order and takes the ordered
    /// units out of the cart.
    ///
    /// If the order write fails the cart is untouched. If the order is written
    /// but the cart cannot be updated, `CartNotCleared` carries the new order's
    /// ID; until the cart is emptied a repeated checkout would place a second order.
    pub async fn place_order(&self, buyer: &UserId, checkout: Checkout) -> Result<OrderView> {
        let shipping_address = checkout
            .shipping_address
            .ok_or_else(|| EngineError::InvalidArgument("Shipping address is required".into()))?;
        shipping_address.ensure_complete()?;

        let cart = self.carts.load_cart(buyer).await?;
        if cart.is_empty() { return Err(EngineError::EmptyCart); }

        let mut items = Vec::with_capacity(cart.lines().len());
        for line in cart.lines() {
            let product = self
                .catalog
                .find_product(line.product_id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("Product {}", line.product_id)))?;
            if !product.is_in_stock() {
                return Err(EngineError::InvalidState(format!("{} is out of stock", product.name())));
            }
            items.push(LineItem::from_product(&product, line.quantity));
        }

        let mut order = Order::place(NewOrder {
            owner: buyer.clone(),
            items,
            shipping_address,
            payment_method: checkout.payment_method,
            notes: checkout.notes.filter(|n| !n.trim().is_empty()),
            currency: self.currency.clone(),
        })?;

        self.orders.insert_order(&order).await?;
        info!(order_id = %order.id(), owner = %buyer, total = %order.total(), "order placed");

        if let Err(e) = self.carts.remove_lines(buyer, cart.lines()).await {
            warn!(order_id = %order.id(), owner = %buyer, error = %e, "order placed but cart not cleared");
            publish_all(self.publisher.as_ref(), order.take_events()).await;
            return Err(EngineError::CartNotCleared { order_id: order.id(), reason: e.to_string() });
        }

        let mut events = order.take_events();
        events.push(DomainEvent::Cart(CartEvent::CheckedOut { owner: buyer.clone(), order_id: order.id() }));
        publish_all(self.publisher.as_ref(), events).await;
        self.resolve(order).await
    }

    pub async fn get_order(&self, caller: &Caller, id: OrderId) -> Result<OrderView> {
        let order = self.load(id).await?;
        order.ensure_visible_to(caller)?;
        self.resolve(order).await
    }

    /// Buyers only ever see their own orders; sellers see all of them.
    pub async fn list_orders(&self, caller: &Caller, query: OrderQuery) -> Result<OrderPage> {
        let filter = OrderFilter {
            owner: match caller {
                Caller::Buyer(user) => Some(user.clone()),
                Caller::Seller(_) => None,
            },
            status: query.status,
        };
        let slice = self.orders.list_orders(&filter, query.page).await?;
        let (total_pages, current_page) = match query.page {
            Some(p) => (p.total_pages(slice.total), p.page),
            None => (u64::from(slice.total > 0), 1),
        };
        let mut lookups = HashMap::new();
        let mut orders = Vec::with_capacity(slice.orders.len());
        for order in slice.orders {
            orders.push(self.resolve_with(order, &mut lookups).await?);
        }
        Ok(OrderPage { orders, total_pages, current_page, total: slice.total })
    }

    /// Seller-only status change.
    pub async fn advance_status(&self, caller: &Caller, id: OrderId, new_status: OrderStatus) -> Result<OrderView> {
        let Caller::Seller(seller) = caller else {
            return Err(EngineError::Forbidden("Only sellers can update order status".into()));
        };
        let mut order = self.load(id).await?;
        order.advance_to(new_status, self.policy)?;
        let expected = order.bump_version();
        self.orders.update_order(&order, expected).await?;
        info!(order_id = %id, seller = %seller, status = %new_status, "order status updated");
        publish_all(self.publisher.as_ref(), order.take_events()).await;
        self.resolve(order).await
    }

    /// Buyer cancellation of their own order before it ships.
    pub async fn cancel_order(&self, caller: &Caller, id: OrderId, reason: Option<String>) -> Result<OrderView> {
        let mut order = self.load(id).await?;
        let Caller::Buyer(buyer) = caller else {
            return Err(EngineError::Forbidden("Not authorized to cancel this order".into()));
        };
        order.cancel_by_owner(buyer, reason)?;
        let expected = order.bump_version();
        self.orders.update_order(&order, expected).await?;
        info!(order_id = %id, owner = %buyer, "order cancelled");
        publish_all(self.publisher.as_ref(), order.take_events()).await;
        self.resolve(order).await
    }

    /// Aggregated on demand from persisted orders. Revenue counts only
    /// shipped and delivered orders.
    pub async fn compute_stats(&self) -> Result<OrderStats> {
        let counts = self.orders.count_by_status().await?;
        let count = |status: OrderStatus| counts.iter().filter(|(s, _)| *s == status).map(|(_, n)| *n).sum::<u64>();
        let revenue_statuses: Vec<OrderStatus> =
            OrderStatus::ALL.into_iter().filter(OrderStatus::counts_toward_revenue).collect();
        let total_revenue = self.orders.revenue(&revenue_statuses, &self.currency).await?;
        Ok(OrderStats {
            total_orders: counts.iter().map(|(_, n)| n).sum(),
            pending_orders: count(OrderStatus::Pending),
            confirmed_orders: count(OrderStatus::Confirmed),
            processing_orders: count(OrderStatus::Processing),
            shipped_orders: count(OrderStatus::Shipped),
            delivered_orders: count(OrderStatus::Delivered),
            cancelled_orders: count(OrderStatus::Cancelled),
            total_revenue,
        })
    }

    async fn load(&self, id: OrderId) -> Result<Order> {
        self.orders.find_order(id).await?.ok_or_else(|| EngineError::NotFound(format!("Order {id}")))
    }

    async fn resolve(&self, order: Order) -> Result<OrderView> {
        self.resolve_with(order, &mut HashMap::new()).await
    }

    /// Pairs each line item with its current catalog entry. `lookups` caches
    /// products already fetched for other orders on the same page.
    async fn resolve_with(
        &self,
        order: Order,
        lookups: &mut HashMap<ProductId, Option<Product>>,
    ) -> Result<OrderView> {
        let mut products = Vec::with_capacity(order.items().len());
        for item in order.items() {
            let product = match lookups.get(&item.product_id) {
                Some(cached) => cached.clone(),
                None => {
                    let found = self.catalog.find_product(item.product_id).await?;
                    lookups.insert(item.product_id, found.clone());
                    found
                }
            };
            products.push(product);
        }
        Ok(OrderView::new(order, products))
    }
}
