//! Cart Aggregate
//!
//! A cart holds product lines only. Its total is never stored; it is derived
//! from the lines and the catalog's current prices each time it is read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::Product;
use crate::domain::value_objects::{Money, MoneyError, ProductId, Quantity, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

#[derive(Clone, Debug)]
pub struct Cart {
    owner: UserId,
    lines: Vec<CartLine>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(owner: UserId) -> Self {
        Self { owner, lines: vec![], updated_at: Utc::now() }
    }

    pub fn from_lines(owner: UserId, lines: Vec<CartLine>) -> Self {
        Self { owner, lines, updated_at: Utc::now() }
    }

    pub fn owner(&self) -> &UserId { &self.owner }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Total units across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines.iter().fold(0u32, |acc, l| acc.saturating_add(l.quantity.value()))
    }

    /// Adds `quantity` to the product's line, appending a new line if absent.
    /// Returns the line's resulting quantity.
    pub fn add_item(&mut self, product_id: ProductId, quantity: Quantity) -> Quantity {
        let result = if let Some(existing) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            existing.quantity = existing.quantity.add(quantity);
            existing.quantity
        } else {
            self.lines.push(CartLine { product_id, quantity });
            quantity
        };
        self.touch();
        result
    }

    pub fn set_quantity(&mut self, product_id: ProductId, quantity: Quantity) -> Result<(), CartError> {
        let line = self.lines.iter_mut().find(|l| l.product_id == product_id).ok_or(CartError::ItemNotFound)?;
        line.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Returns whether a line was removed.
    pub fn remove_item(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        let removed = self.lines.len() != before;
        if removed { self.touch(); }
        removed
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    /// Takes `quantity` units off the product's line and drops the line once
    /// nothing is left. Units added after a checkout snapshot survive.
    pub fn take_units(&mut self, product_id: ProductId, quantity: Quantity) {
        let Some(pos) = self.lines.iter().position(|l| l.product_id == product_id) else { return };
        match Quantity::new(self.lines[pos].quantity.value().saturating_sub(quantity.value())) {
            Ok(rest) => self.lines[pos].quantity = rest,
            Err(_) => { self.lines.remove(pos); }
        }
        self.touch();
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Item not found in cart") }
}

/// A cart line joined with its current catalog entry.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// `None` when the product no longer exists in the catalog.
    pub product: Option<Product>,
    /// `None` unless the product exists and is in stock.
    pub line_total: Option<Money>,
}

/// Read-only view of a cart priced at the current catalog prices.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub owner: UserId,
    pub lines: Vec<PricedLine>,
    pub item_count: u32,
    pub total: Money,
}

impl CartSnapshot {
    /// `resolved` pairs each cart line, in cart order, with its catalog lookup.
    /// Only in-stock products contribute to the total.
    pub fn build(
        owner: UserId,
        resolved: Vec<(CartLine, Option<Product>)>,
        currency: &str,
    ) -> Result<Self, MoneyError> {
        let mut total = Money::zero(currency);
        let mut item_count = 0u32;
        let mut lines = Vec::with_capacity(resolved.len());
        for (line, product) in resolved {
            item_count = item_count.saturating_add(line.quantity.value());
            let line_total = product
                .as_ref()
                .filter(|p| p.is_in_stock())
                .map(|p| p.offer_price().multiply(line.quantity.value()));
            if let Some(amount) = &line_total {
                total = total.add(amount)?;
            }
            lines.push(PricedLine { product_id: line.product_id, quantity: line.quantity, product, line_total });
        }
        Ok(Self { owner, lines, item_count, total })
    }
}
