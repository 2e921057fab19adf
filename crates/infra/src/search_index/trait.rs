use std::sync::Arc;

use thiserror::Error;

use storefront_core::{Entity, EntityId};

/// Search index operation error.
#[derive(Debug, Error)]
pub enum SearchIndexError {
    /// The query text could not be parsed.
    #[error("malformed query: {0}")]
    InvalidQuery(String),

    #[error("search index unavailable: {0}")]
    Unavailable(String),

    #[error("search index failure: {0}")]
    Index(String),
}

/// Free-text index over the records of one entity kind.
///
/// No transactionality is assumed: every call stands alone and callers must
/// tolerate the index lagging behind the record store.
#[async_trait::async_trait]
pub trait SearchIndex<E: Entity>: Send + Sync {
    /// Index `record` under its identity, replacing any previous document.
    async fn upsert(&self, record: &E) -> Result<(), SearchIndexError>;

    /// Remove the document for `id`; removing an absent document succeeds.
    async fn delete_by_id(&self, id: EntityId) -> Result<(), SearchIndexError>;

    /// Records whose document matches `query`, in ascending identity order.
    ///
    /// `query` uses Lucene query-string syntax: `term`, `field:term`,
    /// `"a phrase"`, `prefix*`, `+required`, `-excluded`. A blank query or `*`
    /// matches everything.
    async fn search(&self, query: &str) -> Result<Vec<E>, SearchIndexError>;

    /// Identities of every indexed document.
    async fn indexed_ids(&self) -> Result<Vec<EntityId>, SearchIndexError>;
}

#[async_trait::async_trait]
impl<E, S> SearchIndex<E> for Arc<S>
where
    E: Entity,
    S: SearchIndex<E> + ?Sized,
{
    async fn upsert(&self, record: &E) -> Result<(), SearchIndexError> {
        (**self).upsert(record).await
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<(), SearchIndexError> {
        (**self).delete_by_id(id).await
    }

    async fn search(&self, query: &str) -> Result<Vec<E>, SearchIndexError> {
        (**self).search(query).await
    }

    async fn indexed_ids(&self) -> Result<Vec<EntityId>, SearchIndexError> {
        (**self).indexed_ids().await
    }
}

/// Identity of a record about to be indexed.
pub(crate) fn document_id<E: Entity>(record: &E) -> Result<EntityId, SearchIndexError> {
    record.id().ok_or_else(|| {
        SearchIndexError::Index(format!("cannot index a {} record without identity", E::KIND))
    })
}
