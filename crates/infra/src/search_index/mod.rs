//! Derived, eventually-consistent free-text index.
//!
//! The index only ever holds copies of record-store records; it is safe to
//! drop and rebuild at any time (see `sync::EntitySynchronizer::reconcile`).

pub mod document;
pub mod elastic;
pub mod in_memory;
pub mod r#trait;

pub use document::DocumentFields;
pub use in_memory::InMemorySearchIndex;
pub use r#trait::{SearchIndex, SearchIndexError};

#[cfg(feature = "elasticsearch")]
pub use elastic::{ElasticsearchClient, ElasticsearchIndex, build_client};
