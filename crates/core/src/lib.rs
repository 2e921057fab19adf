//! `storefront-core`: shared building blocks for the storefront admin backend.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! store-assigned identities, the `Entity` contract every entity kind implements,
//! and the domain error model.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{require_reference, same_identity, Entity};
pub use error::{DomainError, DomainResult};
pub use id::{EntityId, UserId};
