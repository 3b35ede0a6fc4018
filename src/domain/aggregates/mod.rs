//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::Product;
pub use order::{
    Cancellation, CancelledBy, LineItem, NewOrder, Order, OrderStatus, OrderView, Payment, PaymentMethod,
    PaymentStatus, Pricing, Tracking, TrackingUpdate, TransitionPolicy,
};
pub use cart::{Cart, CartError, CartLine, CartSnapshot, PricedLine};
