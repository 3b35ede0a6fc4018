//! Cart service

use std::sync::Arc;

use tracing::info;

use crate::domain::aggregates::CartSnapshot;
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{ProductId, Quantity, UserId};
use crate::messaging::{publish_all, EventPublisher};
use crate::store::{CartStore, ProductCatalog};
use crate::{EngineError, Result};

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn ProductCatalog>,
    publisher: Arc<dyn EventPublisher>,
    currency: String,
}

impl CartService {
    pub fn new(
        carts: Arc<dyn CartStore>,
        catalog: Arc<dyn ProductCatalog>,
        publisher: Arc<dyn EventPublisher>,
        currency: impl Into<String>,
    ) -> Self {
        Self { carts, catalog, publisher, currency: currency.into() }
    }

    /// Adds to an existing line or appends a new one. Repeated calls accumulate.
    pub async fn add_item(&self, owner: &UserId, product_id: ProductId, quantity: u32) -> Result<CartSnapshot> {
        let quantity = Quantity::new(quantity)?;
        let product = self
            .catalog
            .find_product(product_id)
            .await?
            .filter(|p| p.is_in_stock())
            .ok_or_else(|| EngineError::NotFound(format!("In-stock product {product_id}")))?;
        let line_quantity = self.carts.add_line(owner, product.id(), quantity).await?;
        info!(owner = %owner, product_id = %product_id, quantity = line_quantity.value(), "cart item added");
        publish_all(self.publisher.as_ref(), vec![DomainEvent::Cart(CartEvent::ItemAdded {
            owner: owner.clone(), product_id, quantity: quantity.value(),
        })]).await;
        self.snapshot(owner).await
    }

    pub async fn set_quantity(&self, owner: &UserId, product_id: ProductId, quantity: u32) -> Result<CartSnapshot> {
        let quantity = Quantity::new(quantity)?;
        if !self.carts.set_line_quantity(owner, product_id, quantity).await? {
            return Err(EngineError::NotFound(format!("Cart item {product_id}")));
        }
        publish_all(self.publisher.as_ref(), vec![DomainEvent::Cart(CartEvent::QuantityChanged {
            owner: owner.clone(), product_id, quantity: quantity.value(),
        })]).await;
        self.snapshot(owner).await
    }

    /// Removing an absent line is not an error.
    pub async fn remove_item(&self, owner: &UserId, product_id: ProductId) -> Result<CartSnapshot> {
        if self.carts.remove_line(owner, product_id).await? {
            publish_all(self.publisher.as_ref(), vec![DomainEvent::Cart(CartEvent::ItemRemoved {
                owner: owner.clone(), product_id,
            })]).await;
        }
        self.snapshot(owner).await
    }

    pub async fn clear(&self, owner: &UserId) -> Result<CartSnapshot> {
        self.carts.clear_cart(owner).await?;
        publish_all(self.publisher.as_ref(), vec![DomainEvent::Cart(CartEvent::Cleared { owner: owner.clone() })]).await;
        self.snapshot(owner).await
    }

    /// Current lines priced at current catalog prices. Does not mutate.
    pub async fn snapshot(&self, owner: &UserId) -> Result<CartSnapshot> {
        let cart = self.carts.load_cart(owner).await?;
        let mut resolved = Vec::with_capacity(cart.lines().len());
        for line in cart.lines() {
            let product = self.catalog.find_product(line.product_id).await?;
            resolved.push((line.clone(), product));
        }
        Ok(CartSnapshot::build(owner.clone(), resolved, &self.currency)?)
    }

    pub async fn item_count(&self, owner: &UserId) -> Result<u32> {
        Ok(self.carts.load_cart(owner).await?.item_count())
    }
}
