//! Integration tests for the dual-store write path.
//!
//! Tests: Synchronizer → RecordStore → SearchIndex (→ RetryQueue → Reconcile)
//!
//! Verifies:
//! - Identity preconditions reject calls before any store is touched
//! - Each write produces exactly one index call with the persisted record
//! - Index failures never fail the caller and converge through retry/reconcile

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::Utc;

    use storefront_addresses::ShippingAddress;
    use storefront_core::{Entity, EntityId, UserId};
    use storefront_sales::{Cart, CartProduct, Order};

    use crate::record_store::{InMemoryRecordStore, RecordStore};
    use crate::search_index::{InMemorySearchIndex, SearchIndex, SearchIndexError};
    use crate::sync::{EntitySynchronizer, RetryPolicy, SyncError, UpdatePolicy};

    /// Search index that records every call and can be switched offline.
    struct RecordingIndex<E> {
        inner: InMemorySearchIndex<E>,
        upserts: Mutex<Vec<E>>,
        deletes: Mutex<Vec<EntityId>>,
        offline: AtomicBool,
    }

    impl<E: Entity> RecordingIndex<E> {
        fn new() -> Self {
            Self {
                inner: InMemorySearchIndex::new(),
                upserts: Mutex::new(Vec::new()),
                deletes: Mutex::new(Vec::new()),
                offline: AtomicBool::new(false),
            }
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn upserts(&self) -> Vec<E> {
            self.upserts.lock().unwrap().clone()
        }

        fn deletes(&self) -> Vec<EntityId> {
            self.deletes.lock().unwrap().clone()
        }

        fn check_online(&self) -> Result<(), SearchIndexError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(SearchIndexError::Unavailable("index offline".into()));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl<E: Entity> SearchIndex<E> for RecordingIndex<E> {
        async fn upsert(&self, record: &E) -> Result<(), SearchIndexError> {
            self.upserts.lock().unwrap().push(record.clone());
            self.check_online()?;
            self.inner.upsert(record).await
        }

        async fn delete_by_id(&self, id: EntityId) -> Result<(), SearchIndexError> {
            self.deletes.lock().unwrap().push(id);
            self.check_online()?;
            self.inner.delete_by_id(id).await
        }

        async fn search(&self, query: &str) -> Result<Vec<E>, SearchIndexError> {
            self.check_online()?;
            self.inner.search(query).await
        }

        async fn indexed_ids(&self) -> Result<Vec<EntityId>, SearchIndexError> {
            self.inner.indexed_ids().await
        }
    }

    type Synchronizer<E> = EntitySynchronizer<E, InMemoryRecordStore<E>, RecordingIndex<E>>;

    fn setup<E: Entity>() -> Synchronizer<E> {
        EntitySynchronizer::new(InMemoryRecordStore::new(), RecordingIndex::new())
            .with_retry_policy(RetryPolicy::fixed(3, Duration::ZERO))
    }

    fn address(phone: &str) -> ShippingAddress {
        ShippingAddress::new().with_phone_number(phone)
    }

    fn invalid_argument_key(err: &SyncError) -> Option<&'static str> {
        match err {
            SyncError::InvalidArgument { key, .. } => Some(*key),
            _ => None,
        }
    }

    #[tokio::test]
    async fn create_assigns_identity_and_get_returns_the_record() {
        let sync = setup::<ShippingAddress>();

        let created = sync
            .create(address("AAAAAAAAAA").with_alternative_phone_number("CCCCCCCCCC"))
            .await
            .unwrap();
        let id = created.id.expect("identity assigned");

        let fetched = sync.get(id).await.unwrap();
        assert_eq!(fetched.phone_number.as_deref(), Some("AAAAAAAAAA"));
        assert_eq!(fetched.alternative_phone_number.as_deref(), Some("CCCCCCCCCC"));

        let second = sync.create(address("BBBBBBBBBB")).await.unwrap();
        assert_ne!(second.id, Some(id));
    }

    #[tokio::test]
    async fn create_with_identity_touches_no_store() {
        let sync = setup::<ShippingAddress>();
        sync.create(address("1111111111")).await.unwrap();
        let before = sync.list_all().await.unwrap().len();
        let upserts_before = sync.index().upserts().len();

        let candidate = ShippingAddress {
            id: Some(EntityId::new(1)),
            ..address("2222222222")
        };
        let err = sync.create(candidate).await.unwrap_err();

        assert_eq!(invalid_argument_key(&err), Some("idexists"));
        assert_eq!(sync.list_all().await.unwrap().len(), before);
        assert_eq!(sync.index().upserts().len(), upserts_before);
    }

    #[tokio::test]
    async fn update_without_identity_is_rejected() {
        let sync = setup::<ShippingAddress>();
        let err = sync.update(address("1111111111")).await.unwrap_err();

        assert_eq!(invalid_argument_key(&err), Some("idnull"));
        assert!(sync.list_all().await.unwrap().is_empty());
        assert!(sync.index().upserts().is_empty());
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let sync = setup::<ShippingAddress>();
        let id = sync.create(address("1111111111")).await.unwrap().id.unwrap();

        sync.delete(id).await.unwrap();
        assert_eq!(sync.index().deletes(), vec![id]);
        assert!(matches!(
            sync.get(id).await,
            Err(SyncError::NotFound { kind: "shippingAddress", .. })
        ));

        // Deleting again is not an error.
        sync.delete(id).await.unwrap();
        assert!(sync.index().inner.is_empty());
    }

    #[tokio::test]
    async fn update_replaces_fields_and_reindexes_once() {
        let sync = setup::<ShippingAddress>();
        let created = sync.create(address("AAAAAAAAAA")).await.unwrap();
        let id = created.id.unwrap();

        let updated = sync
            .update(ShippingAddress {
                phone_number: Some("BBBBBBBBBB".into()),
                ..created
            })
            .await
            .unwrap();

        assert_eq!(updated.phone_number.as_deref(), Some("BBBBBBBBBB"));
        assert_eq!(
            sync.get(id).await.unwrap().phone_number.as_deref(),
            Some("BBBBBBBBBB")
        );

        let upserts = sync.index().upserts();
        assert_eq!(upserts.len(), 2);
        assert_eq!(upserts[1].id, Some(id));
        assert_eq!(upserts[1].phone_number.as_deref(), Some("BBBBBBBBBB"));

        assert!(sync.search("AAAAAAAAAA").await.unwrap().is_empty());
        assert_eq!(sync.search("BBBBBBBBBB").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_indexes_exactly_the_persisted_record() {
        let sync = setup::<ShippingAddress>();
        let created = sync.create(address("1234567890")).await.unwrap();

        let upserts = sync.index().upserts();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].id, created.id);
        assert_eq!(upserts[0].phone_number, created.phone_number);
    }

    #[tokio::test]
    async fn get_of_max_identity_is_not_found() {
        let sync = setup::<ShippingAddress>();
        assert!(matches!(
            sync.get(EntityId::new(i64::MAX)).await,
            Err(SyncError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn update_of_unknown_identity_follows_policy() {
        let unknown = ShippingAddress {
            id: Some(EntityId::new(42)),
            ..address("1111111111")
        };

        let strict = setup::<ShippingAddress>();
        assert!(matches!(
            strict.update(unknown.clone()).await,
            Err(SyncError::NotFound { .. })
        ));
        assert!(strict.index().upserts().is_empty());

        let lenient = setup::<ShippingAddress>().with_update_policy(UpdatePolicy::Upsert);
        let stored = lenient.update(unknown).await.unwrap();
        assert_eq!(stored.id, Some(EntityId::new(42)));
        assert!(lenient.get(EntityId::new(42)).await.is_ok());

        // Fresh identities never collide with the one the caller chose.
        let next = lenient.create(address("2222222222")).await.unwrap();
        assert!(next.id.unwrap() > EntityId::new(42));
    }

    #[tokio::test]
    async fn upsert_rejects_identities_outside_the_assignable_range() {
        let sync = setup::<ShippingAddress>().with_update_policy(UpdatePolicy::Upsert);

        for raw in [0, -7, EntityId::MAX_ASSIGNABLE + 1, i64::MAX] {
            let candidate = ShippingAddress {
                id: Some(EntityId::new(raw)),
                ..address("1111111111")
            };
            let err = sync.update(candidate).await.unwrap_err();
            assert_eq!(invalid_argument_key(&err), Some("invalidid"), "id {raw}");
        }
        assert!(sync.list_all().await.unwrap().is_empty());
        assert!(sync.index().upserts().is_empty());

        // The largest assignable identity is accepted and generation continues past it.
        let top = ShippingAddress {
            id: Some(EntityId::new(EntityId::MAX_ASSIGNABLE)),
            ..address("1111111111")
        };
        sync.update(top).await.unwrap();
        let next = sync.create(address("2222222222")).await.unwrap();
        assert_eq!(next.id, Some(EntityId::new(EntityId::MAX_ASSIGNABLE + 1)));
        assert_eq!(sync.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_and_unconstrained_fields_are_stored() {
        let addresses = setup::<ShippingAddress>();
        let created = addresses
            .create(address("").with_alternative_phone_number("  "))
            .await
            .unwrap();
        assert_eq!(created.phone_number.as_deref(), Some(""));

        let carts = setup::<Cart>();
        let cart = carts
            .create(Cart::for_user(UserId::new(1)).with_status(-1))
            .await
            .unwrap();
        assert_eq!(carts.get(cart.id.unwrap()).await.unwrap().status, Some(-1));
    }

    #[tokio::test]
    async fn validation_failure_touches_no_store() {
        let sync = setup::<CartProduct>();
        let candidate = CartProduct {
            cart_id: None,
            ..CartProduct::new(EntityId::new(1), EntityId::new(2))
        };

        assert!(matches!(
            sync.create(candidate).await,
            Err(SyncError::Validation(_))
        ));
        assert!(sync.list_all().await.unwrap().is_empty());
        assert!(sync.index().upserts().is_empty());
    }

    #[tokio::test]
    async fn index_failure_does_not_fail_create_and_is_retried() {
        let sync = setup::<ShippingAddress>();
        sync.index().set_offline(true);

        let created = sync.create(address("1111111111")).await.unwrap();
        let id = created.id.unwrap();
        assert!(sync.get(id).await.is_ok());
        assert_eq!(sync.retry_queue().stats().pending, 1);
        assert!(sync.index().inner.get(id).is_none());

        sync.index().set_offline(false);
        let round = sync.retry_due(Utc::now()).await;

        assert_eq!(round.attempted, 1);
        assert_eq!(round.recovered, 1);
        assert_eq!(sync.index().inner.get(id), Some(created));
        let stats = sync.retry_queue().stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.recovered_total, 1);
    }

    #[tokio::test]
    async fn failed_index_delete_is_replayed_as_removal() {
        let sync = setup::<ShippingAddress>();
        let id = sync.create(address("1111111111")).await.unwrap().id.unwrap();

        sync.index().set_offline(true);
        sync.delete(id).await.unwrap();
        assert!(sync.index().inner.get(id).is_some());

        sync.index().set_offline(false);
        let round = sync.retry_due(Utc::now()).await;
        assert_eq!(round.recovered, 1);
        assert!(sync.index().inner.is_empty());
    }

    #[tokio::test]
    async fn replay_publishes_current_state_not_the_failed_snapshot() {
        let sync = setup::<ShippingAddress>();
        sync.index().set_offline(true);
        let created = sync.create(address("AAAAAAAAAA")).await.unwrap();
        let id = created.id.unwrap();

        // Record store moves on while the index is still offline.
        sync.update(ShippingAddress {
            phone_number: Some("BBBBBBBBBB".into()),
            ..created
        })
        .await
        .unwrap();
        assert_eq!(sync.retry_queue().stats().pending, 1);

        sync.index().set_offline(false);
        sync.retry_due(Utc::now()).await;
        let indexed = sync.index().inner.get(id).unwrap();
        assert_eq!(indexed.phone_number.as_deref(), Some("BBBBBBBBBB"));
    }

    #[tokio::test]
    async fn successful_write_discards_pending_retry() {
        let sync = setup::<ShippingAddress>();
        sync.index().set_offline(true);
        let created = sync.create(address("1111111111")).await.unwrap();
        assert_eq!(sync.retry_queue().stats().pending, 1);

        sync.index().set_offline(false);
        sync.update(created).await.unwrap();
        assert_eq!(sync.retry_queue().stats().pending, 0);
    }

    #[tokio::test]
    async fn exhausted_retries_are_dead_lettered_then_reconciled() {
        let sync = EntitySynchronizer::new(
            InMemoryRecordStore::<ShippingAddress>::new(),
            RecordingIndex::new(),
        )
        .with_retry_policy(RetryPolicy::fixed(2, Duration::ZERO));
        sync.index().set_offline(true);

        let id = sync.create(address("1111111111")).await.unwrap().id.unwrap();
        let round = sync.retry_due(Utc::now()).await;
        assert_eq!(round.dead_lettered, 1);

        let stats = sync.retry_queue().stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.dead_lettered, 1);
        assert_eq!(sync.retry_queue().dead_letters()[0].id, id);

        sync.index().set_offline(false);
        let report = sync.reconcile().await.unwrap();
        assert_eq!(report.upserted, 1);
        assert!(sync.index().inner.get(id).is_some());
        assert_eq!(sync.retry_queue().stats().dead_lettered, 0);
        assert!(sync.retry_queue().dead_letters().is_empty());
    }

    #[tokio::test]
    async fn reconcile_repairs_missing_and_orphaned_entries() {
        let sync = setup::<ShippingAddress>();
        let mut ids = Vec::new();
        for phone in ["1111111111", "2222222222", "3333333333"] {
            ids.push(sync.create(address(phone)).await.unwrap().id.unwrap());
        }

        // Orphan: gone from the record store, still indexed.
        sync.records().delete_by_id(ids[0]).await.unwrap();
        // Missing: stored, but not indexed.
        sync.index().inner.delete_by_id(ids[1]).await.unwrap();

        let report = sync.reconcile().await.unwrap();
        assert_eq!(report.kind, "shippingAddress");
        assert_eq!(report.upserted, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(
            sync.index().indexed_ids().await.unwrap(),
            vec![ids[1], ids[2]]
        );
    }

    #[tokio::test]
    async fn carts_are_listed_by_owner() {
        let sync = setup::<Cart>();
        for (user, status) in [(1, 0), (2, 1), (1, 2)] {
            sync.create(Cart::for_user(UserId::new(user)).with_status(status))
                .await
                .unwrap();
        }

        let carts = sync.list_by_owner(UserId::new(1)).await.unwrap();
        assert_eq!(carts.len(), 2);
        assert!(carts.iter().all(|c| c.user_id == Some(UserId::new(1))));
        assert_eq!(sync.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn orders_cannot_share_a_shipping_address() {
        let sync = setup::<Order>();
        sync.create(Order::for_user(UserId::new(1)).with_shipping_address(EntityId::new(5)))
            .await
            .unwrap();

        let err = sync
            .create(Order::for_user(UserId::new(2)).with_shipping_address(EntityId::new(5)))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Conflict(_)));
        assert_eq!(sync.list_all().await.unwrap().len(), 1);
        assert_eq!(sync.index().upserts().len(), 1);
    }

    #[tokio::test]
    async fn search_by_identity_and_malformed_query() {
        let sync = setup::<ShippingAddress>();
        let mut ids = Vec::new();
        for phone in ["1111111111", "2222222222", "3333333333"] {
            ids.push(sync.create(address(phone)).await.unwrap().id.unwrap());
        }

        let hits = sync.search(&format!("id:{}", ids[1])).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].phone_number.as_deref(), Some("2222222222"));

        let err = sync.search("phone_number:\"open").await.unwrap_err();
        assert_eq!(invalid_argument_key(&err), Some("badquery"));

        sync.index().set_offline(true);
        assert!(matches!(
            sync.search("*").await,
            Err(SyncError::SearchUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_updates_leave_both_stores_agreeing() {
        let sync = Arc::new(setup::<ShippingAddress>());
        let created = sync.create(address("0000000000")).await.unwrap();
        let id = created.id.unwrap();

        let mut tasks = Vec::new();
        for n in 0..16 {
            let sync = sync.clone();
            let record = ShippingAddress {
                phone_number: Some(format!("{n:010}")),
                ..created.clone()
            };
            tasks.push(tokio::spawn(async move { sync.update(record).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = sync.get(id).await.unwrap();
        let indexed = sync.index().inner.get(id).unwrap();
        assert_eq!(stored.phone_number, indexed.phone_number);
    }
}
