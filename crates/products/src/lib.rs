//! Products domain module.
//!
//! Catalog products plus the user-curated collections that reference them
//! (product lists and wishlists). Records only; no IO.

pub mod product;
pub mod product_list;
pub mod wishlist;

pub use product::Product;
pub use product_list::{ProductList, ProductListProduct};
pub use wishlist::Wishlist;
