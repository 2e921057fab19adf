//! Authoritative record storage.
//!
//! The record store owns entity identity: it assigns an identity on first
//! save and is the source of truth the search index is derived from.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryRecordStore;
pub use postgres::PostgresRecordStore;
pub use r#trait::{RecordStore, RecordStoreError};
