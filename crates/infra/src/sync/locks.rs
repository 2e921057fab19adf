//! Per-identity advisory locks.
//!
//! Serializes writes to the same identity within one process so the record
//! store and index steps of two operations on one identity never interleave.
//! Different identities never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use storefront_core::EntityId;

type LockMap = HashMap<EntityId, Arc<AsyncMutex<()>>>;

#[derive(Debug, Default)]
pub struct IdentityLocks {
    inner: Arc<Mutex<LockMap>>,
}

/// Held lock on one identity; released on drop.
#[derive(Debug)]
pub struct IdentityGuard {
    id: EntityId,
    map: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn lock(&self, id: EntityId) -> IdentityGuard {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(id).or_default().clone()
        };

        IdentityGuard {
            id,
            map: self.inner.clone(),
            guard: Some(slot.lock_owned().await),
        }
    }

    /// Number of identities currently locked or waited on.
    pub fn active(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        // Release first so a waiter's clone is the only other reference left.
        self.guard.take();
        if let Some(slot) = map.get(&self.id) {
            if Arc::strong_count(slot) == 1 {
                map.remove(&self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_identity_is_serialized() {
        let locks = Arc::new(IdentityLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(EntityId::new(1)).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn different_identities_do_not_block() {
        let locks = IdentityLocks::new();
        let _a = locks.lock(EntityId::new(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(EntityId::new(2))).await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn released_slots_are_removed() {
        let locks = IdentityLocks::new();
        {
            let _guard = locks.lock(EntityId::new(3)).await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }
}
