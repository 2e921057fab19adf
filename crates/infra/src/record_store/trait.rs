use std::sync::Arc;

use thiserror::Error;

use storefront_core::{Entity, EntityId};

/// Record store operation error.
///
/// - **Conflict**: a uniqueness constraint rejected the write
/// - **Unavailable**: the store could not be reached; the call may succeed later
/// - **Storage**: any other failure (encoding, unexpected database error)
#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("constraint violation: {0}")]
    Conflict(String),

    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("record store failure: {0}")]
    Storage(String),
}

/// Durable, authoritative storage for one entity kind.
///
/// Each call is transactional on its own; there is no cross-call transaction.
///
/// Implementations must:
/// - assign a fresh identity when saving a record without one
/// - never hand out an identity twice, including after a delete
/// - return `find_all` results ordered by identity ascending
/// - treat `delete_by_id` of an unknown identity as a no-op
/// - reject a save that would duplicate one of the record's
///   [`Entity::unique_references`] with [`RecordStoreError::Conflict`]
#[async_trait::async_trait]
pub trait RecordStore<E: Entity>: Send + Sync {
    /// Persist `record`, assigning an identity if it has none and otherwise
    /// replacing whatever is stored under its identity.
    async fn save(&self, record: E) -> Result<E, RecordStoreError>;

    async fn find_by_id(&self, id: EntityId) -> Result<Option<E>, RecordStoreError>;

    async fn find_all(&self) -> Result<Vec<E>, RecordStoreError>;

    async fn exists_by_id(&self, id: EntityId) -> Result<bool, RecordStoreError> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<(), RecordStoreError>;
}

#[async_trait::async_trait]
impl<E, S> RecordStore<E> for Arc<S>
where
    E: Entity,
    S: RecordStore<E> + ?Sized,
{
    async fn save(&self, record: E) -> Result<E, RecordStoreError> {
        (**self).save(record).await
    }

    async fn find_by_id(&self, id: EntityId) -> Result<Option<E>, RecordStoreError> {
        (**self).find_by_id(id).await
    }

    async fn find_all(&self) -> Result<Vec<E>, RecordStoreError> {
        (**self).find_all().await
    }

    async fn exists_by_id(&self, id: EntityId) -> Result<bool, RecordStoreError> {
        (**self).exists_by_id(id).await
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<(), RecordStoreError> {
        (**self).delete_by_id(id).await
    }
}
