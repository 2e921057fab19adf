//! Per-kind dual-store synchronizer.
//!
//! ```text
//! create / update                      delete
//!   ↓                                    ↓
//! 1. identity precondition             1. identity lock
//!   ↓                                    ↓
//! 2. validation hook                   2. record store delete
//!   ↓                                    ↓
//! 3. identity lock (+ existence        3. index delete
//!    check, or range check under         (failure → retry queue)
//!    Upsert, for update)
//!   ↓
//! 4. record store save (authoritative)
//!   ↓
//! 5. index upsert of the stored record
//!    (failure → retry queue)
//! ```
//!
//! Reads never cross stores: `get` and `list_*` hit the record store, `search`
//! hits the index and may be stale.

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn, Span};

use storefront_core::{Entity, EntityId, UserId};

use super::error::SyncError;
use super::locks::IdentityLocks;
use super::retry::RetryPolicy;
use super::retry_queue::{IndexOperation, IndexRetryQueue, Rescheduled};
use crate::record_store::{RecordStore, RecordStoreError};
use crate::search_index::SearchIndex;

/// How `update` treats an identity the record store does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Fail with `NotFound`.
    #[default]
    RejectUnknown,
    /// Store the record under the caller's identity.
    Upsert,
}

impl FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject_unknown" => Ok(Self::RejectUnknown),
            "upsert" => Ok(Self::Upsert),
            other => Err(format!(
                "unknown update policy '{other}' (expected reject_unknown or upsert)"
            )),
        }
    }
}

/// Index action taken by a resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resynced {
    Upserted,
    Removed,
}

/// Outcome of one pass over the due retry tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryRound {
    pub attempted: usize,
    pub recovered: usize,
    pub rescheduled: usize,
    pub dead_lettered: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub kind: &'static str,
    pub upserted: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Coordinates writes of one entity kind across the record store `R` and the
/// search index `S`.
pub struct EntitySynchronizer<E, R, S> {
    records: R,
    index: S,
    policy: UpdatePolicy,
    locks: IdentityLocks,
    retries: Arc<IndexRetryQueue>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R, S> std::fmt::Debug for EntitySynchronizer<E, R, S>
where
    E: Entity,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySynchronizer")
            .field("kind", &E::KIND)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<E, R, S> EntitySynchronizer<E, R, S>
where
    E: Entity,
    R: RecordStore<E>,
    S: SearchIndex<E>,
{
    pub fn new(records: R, index: S) -> Self {
        Self {
            records,
            index,
            policy: UpdatePolicy::default(),
            locks: IdentityLocks::new(),
            retries: Arc::new(IndexRetryQueue::default()),
            _entity: PhantomData,
        }
    }

    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the retry queue with an empty one using `policy`.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retries = Arc::new(IndexRetryQueue::new(policy));
        self
    }

    pub fn update_policy(&self) -> UpdatePolicy {
        self.policy
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn index(&self) -> &S {
        &self.index
    }

    pub fn retry_queue(&self) -> &IndexRetryQueue {
        &self.retries
    }

    #[instrument(skip_all, fields(kind = E::KIND, id = tracing::field::Empty))]
    pub async fn create(&self, candidate: E) -> Result<E, SyncError> {
        if candidate.id().is_some() {
            return Err(SyncError::id_exists(E::KIND));
        }
        candidate.validate()?;

        let persisted = self.records.save(candidate).await?;
        let id = persisted.id().ok_or_else(|| {
            SyncError::RecordStore(RecordStoreError::Storage(format!(
                "record store returned a {} without identity",
                E::KIND
            )))
        })?;
        Span::current().record("id", id.get());

        // A delete may have run between the save and the lock; index the
        // record store's current state, not the saved snapshot.
        let _guard = self.locks.lock(id).await;
        match self.records.find_by_id(id).await {
            Ok(Some(current)) => self.index_upsert(id, &current).await,
            Ok(None) => debug!(kind = E::KIND, id = %id, "record deleted before indexing"),
            Err(err) => {
                warn!(kind = E::KIND, id = %id, error = %err, "re-read before indexing failed; queued for retry");
                self.retries
                    .enqueue(id, IndexOperation::Upsert, &err, Utc::now());
            }
        }
        Ok(persisted)
    }

    /// Replace the stored record under the candidate's identity.
    #[instrument(skip_all, fields(kind = E::KIND, id = tracing::field::Empty))]
    pub async fn update(&self, candidate: E) -> Result<E, SyncError> {
        let id = candidate.id().ok_or_else(|| SyncError::id_null(E::KIND))?;
        Span::current().record("id", id.get());
        candidate.validate()?;

        if self.policy == UpdatePolicy::Upsert && !id.is_assignable() {
            return Err(SyncError::id_out_of_range(E::KIND, id));
        }

        let _guard = self.locks.lock(id).await;
        if self.policy == UpdatePolicy::RejectUnknown && !self.records.exists_by_id(id).await? {
            return Err(SyncError::not_found(E::KIND, id));
        }

        let persisted = self.records.save(candidate).await?;
        self.index_upsert(id, &persisted).await;
        Ok(persisted)
    }

    /// Delete `id` from both stores. Unknown identities are not an error.
    #[instrument(skip(self, id), fields(kind = E::KIND, id = %id))]
    pub async fn delete(&self, id: EntityId) -> Result<(), SyncError> {
        let _guard = self.locks.lock(id).await;
        self.records.delete_by_id(id).await?;
        self.index_delete(id).await;
        Ok(())
    }

    pub async fn get(&self, id: EntityId) -> Result<E, SyncError> {
        self.records
            .find_by_id(id)
            .await?
            .ok_or_else(|| SyncError::not_found(E::KIND, id))
    }

    /// Every record, ordered by identity ascending.
    pub async fn list_all(&self) -> Result<Vec<E>, SyncError> {
        Ok(self.records.find_all().await?)
    }

    /// Records owned by `user`. Empty for kinds without an owner.
    pub async fn list_by_owner(&self, user: UserId) -> Result<Vec<E>, SyncError> {
        let all = self.records.find_all().await?;
        Ok(all
            .into_iter()
            .filter(|r| r.owner() == Some(user))
            .collect())
    }

    pub async fn search(&self, query: &str) -> Result<Vec<E>, SyncError> {
        Ok(self.index.search(query).await?)
    }

    /// Bring the index entry for `id` in line with the record store.
    pub async fn resync(&self, id: EntityId) -> Result<Resynced, SyncError> {
        let _guard = self.locks.lock(id).await;

        let outcome = match self.records.find_by_id(id).await? {
            Some(record) => {
                self.index.upsert(&record).await?;
                Resynced::Upserted
            }
            None => {
                self.index.delete_by_id(id).await?;
                Resynced::Removed
            }
        };
        self.retries.discard(id);
        Ok(outcome)
    }

    /// Replay every retry task due at `now`.
    pub async fn retry_due(&self, now: DateTime<Utc>) -> RetryRound {
        let mut round = RetryRound::default();

        for task in self.retries.take_due(now) {
            round.attempted += 1;
            let id = task.id;
            let operation = task.operation;

            match self.resync(id).await {
                Ok(_) => {
                    self.retries.record_recovery();
                    round.recovered += 1;
                    debug!(kind = E::KIND, id = %id, ?operation, "index resync recovered");
                }
                Err(err) => match self.retries.reschedule(task, &err, now) {
                    Rescheduled::Retrying { next_due } => {
                        round.rescheduled += 1;
                        debug!(kind = E::KIND, id = %id, error = %err, %next_due, "index resync rescheduled");
                    }
                    Rescheduled::Superseded => round.rescheduled += 1,
                    Rescheduled::DeadLettered => {
                        round.dead_lettered += 1;
                        warn!(
                            kind = E::KIND,
                            id = %id,
                            ?operation,
                            error = %err,
                            "index resync exhausted its retries; dead-lettered"
                        );
                    }
                },
            }
        }

        round
    }

    /// Resync every identity known to either store.
    #[instrument(skip(self), fields(kind = E::KIND))]
    pub async fn reconcile(&self) -> Result<ReconcileReport, SyncError> {
        let mut ids: BTreeSet<EntityId> = self
            .records
            .find_all()
            .await?
            .iter()
            .filter_map(|r| r.id())
            .collect();
        ids.extend(self.index.indexed_ids().await?);

        let mut report = ReconcileReport {
            kind: E::KIND,
            upserted: 0,
            removed: 0,
            failed: 0,
        };
        for id in ids {
            match self.resync(id).await {
                Ok(Resynced::Upserted) => report.upserted += 1,
                Ok(Resynced::Removed) => report.removed += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(kind = E::KIND, id = %id, error = %err, "reconcile failed for record");
                }
            }
        }

        info!(
            kind = E::KIND,
            upserted = report.upserted,
            removed = report.removed,
            failed = report.failed,
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn index_upsert(&self, id: EntityId, record: &E) {
        match self.index.upsert(record).await {
            Ok(()) => {
                self.retries.discard(id);
            }
            Err(err) => {
                warn!(kind = E::KIND, id = %id, error = %err, "index upsert failed; queued for retry");
                self.retries
                    .enqueue(id, IndexOperation::Upsert, &err, Utc::now());
            }
        }
    }

    async fn index_delete(&self, id: EntityId) {
        match self.index.delete_by_id(id).await {
            Ok(()) => {
                self.retries.discard(id);
            }
            Err(err) => {
                warn!(kind = E::KIND, id = %id, error = %err, "index delete failed; queued for retry");
                self.retries
                    .enqueue(id, IndexOperation::Delete, &err, Utc::now());
            }
        }
    }
}
