//! Application services
//!
//! Each service owns its store handles and publisher and is cheap to clone
//! into request handlers.

pub mod cart;
pub mod orders;

pub use cart::CartService;
pub use orders::{Checkout, OrderPage, OrderQuery, OrderService, OrderStats};
