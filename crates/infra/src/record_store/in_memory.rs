use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use storefront_core::{Entity, EntityId};

use super::r#trait::{RecordStore, RecordStoreError};

/// In-memory record store.
///
/// Intended for tests/dev. Identities come from a counter that starts at 1
/// and only moves forward, so a deleted identity is never handed out again.
#[derive(Debug)]
pub struct InMemoryRecordStore<E> {
    records: RwLock<BTreeMap<EntityId, E>>,
    last_id: AtomicI64,
}

impl<E> InMemoryRecordStore<E> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            last_id: AtomicI64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for InMemoryRecordStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> RecordStoreError {
    RecordStoreError::Storage("record store lock poisoned".to_string())
}

/// Reject `candidate` if another record already holds one of its unique references.
fn check_unique_references<E: Entity>(
    records: &BTreeMap<EntityId, E>,
    candidate: &E,
) -> Result<(), RecordStoreError> {
    let wanted = candidate.unique_references();
    if wanted.is_empty() {
        return Ok(());
    }

    for (id, existing) in records {
        if candidate.id() == Some(*id) {
            continue;
        }
        if let Some((field, value)) = existing
            .unique_references()
            .into_iter()
            .find(|pair| wanted.contains(pair))
        {
            return Err(RecordStoreError::Conflict(format!(
                "{} {field}={value} is already used by id {id}",
                E::KIND
            )));
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl<E: Entity> RecordStore<E> for InMemoryRecordStore<E> {
    async fn save(&self, mut record: E) -> Result<E, RecordStoreError> {
        let mut map = self.records.write().map_err(|_| poisoned())?;
        check_unique_references(&map, &record)?;

        let id = match record.id() {
            Some(id) => {
                // Keep generated identities ahead of explicitly supplied ones.
                self.last_id.fetch_max(id.get(), Ordering::SeqCst);
                id
            }
            None => {
                // The map's write lock serializes generation.
                let next = self
                    .last_id
                    .load(Ordering::SeqCst)
                    .checked_add(1)
                    .ok_or_else(|| {
                        RecordStoreError::Storage(format!("{} identity space exhausted", E::KIND))
                    })?;
                self.last_id.store(next, Ordering::SeqCst);
                let id = EntityId::new(next);
                record.assign_id(id);
                id
            }
        };

        map.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: EntityId) -> Result<Option<E>, RecordStoreError> {
        let map = self.records.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<E>, RecordStoreError> {
        let map = self.records.read().map_err(|_| poisoned())?;
        Ok(map.values().cloned().collect())
    }

    async fn exists_by_id(&self, id: EntityId) -> Result<bool, RecordStoreError> {
        let map = self.records.read().map_err(|_| poisoned())?;
        Ok(map.contains_key(&id))
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<(), RecordStoreError> {
        let mut map = self.records.write().map_err(|_| poisoned())?;
        map.remove(&id);
        Ok(())
    }
}
