//! Elasticsearch-backed search index.
//!
//! One index per entity kind, named `{prefix}-{kind}` in lowercase, with the
//! record's identity as document id and the record itself as `_source`.
//! Query text is passed through to Elasticsearch's `query_string` query.

pub mod wire;

#[cfg(feature = "elasticsearch")]
mod client;

#[cfg(feature = "elasticsearch")]
pub use client::{ElasticsearchIndex, build_client};

#[cfg(feature = "elasticsearch")]
pub use ::elasticsearch::Elasticsearch as ElasticsearchClient;
