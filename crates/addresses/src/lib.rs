//! Addresses domain module.
//!
//! Billing and shipping addresses referenced by orders. Pure records with
//! validation rules; persistence and indexing live in `storefront-infra`.

pub mod address;

pub use address::{BillingAddress, ShippingAddress};
