//! Shared fixtures for unit tests.

use rust_decimal::Decimal;

use crate::domain::aggregates::{LineItem, NewOrder, Order, PaymentMethod, Product};
use crate::domain::value_objects::{Money, ProductId, Quantity, ShippingAddress, UserId};

pub(crate) fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Asha Rao".into(),
        phone: "9876543210".into(),
        street: "12 MG Road".into(),
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        zipcode: "560001".into(),
        country: "India".into(),
    }
}

/// In-stock flag aside, list price is always ten above the offer price.
pub(crate) fn product(offer: i64, in_stock: bool) -> Product {
    Product::new(
        ProductId::generate(),
        format!("Widget {offer}"),
        Money::new(Decimal::new(offer + 10, 0), "INR"),
        Money::new(Decimal::new(offer, 0), "INR"),
        in_stock,
    )
}

pub(crate) fn cod_order(owner: &str, price: i64, qty: u32) -> Order {
    let item = LineItem::from_product(&product(price, true), Quantity::new(qty).unwrap());
    Order::place(NewOrder {
        owner: UserId::new(owner),
        items: vec![item],
        shipping_address: address(),
        payment_method: PaymentMethod::Cod,
        notes: None,
        currency: "INR".into(),
    })
    .unwrap()
}
