//! Sales domain module.
//!
//! Shopping carts and placed orders, each with a join record per product.

pub mod cart;
pub mod order;

pub use cart::{Cart, CartProduct};
pub use order::{Order, OrderProduct};
