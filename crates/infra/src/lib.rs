//! Infrastructure layer: record stores, search indexes and the synchronization
//! core that keeps them consistent.
//!
//! - [`record_store`]: authoritative storage (in-memory, Postgres)
//! - [`search_index`]: derived free-text index (in-memory, Elasticsearch behind
//!   the `elasticsearch` feature)
//! - [`sync`]: per-kind synchronizer, retry queue, reconciliation and workers

pub mod record_store;
pub mod search_index;
pub mod sync;

#[cfg(test)]
mod integration_tests;
