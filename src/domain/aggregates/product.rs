//! Product catalog view
//!
//! Products are owned by the catalog; this service only reads the current
//! offer price and stock flag.

use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{Money, ProductId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: ProductId,
    name: String,
    price: Money,
    offer_price: Money,
    in_stock: bool,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, offer_price: Money, in_stock: bool) -> Self {
        Self { id, name: name.into(), price, offer_price, in_stock }
    }

    pub fn id(&self) -> ProductId { self.id }
    pub fn name(&self) -> &str { &self.name }
    /// List price, shown struck through next to the offer price.
    pub fn price(&self) -> &Money { &self.price }
    /// Price actually charged.
    pub fn offer_price(&self) -> &Money { &self.offer_price }
    pub fn is_in_stock(&self) -> bool { self.in_stock }

    pub fn update_offer_price(&mut self, offer_price: Money) { self.offer_price = offer_price; }
    pub fn set_in_stock(&mut self, in_stock: bool) { self.in_stock = in_stock; }
}
