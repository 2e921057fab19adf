//! Queue of identities whose index entry fell behind the record store.
//!
//! Entries name an identity, not a record snapshot: replaying one re-reads the
//! record store, so the queue only has to remember *that* an identity needs a
//! resync. A newer failure for the same identity replaces the older entry.
//! Dead letters are kept per identity, cleared once the identity syncs again,
//! and capped at [`DEAD_LETTER_CAPACITY`] with the oldest evicted first.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use storefront_core::EntityId;

use super::retry::RetryPolicy;

pub const DEAD_LETTER_CAPACITY: usize = 1_000;

/// Index write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOperation {
    Upsert,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResync {
    pub id: EntityId,
    pub operation: IndexOperation,
    /// Failed attempts so far, counting the original write.
    pub attempts: u32,
    pub next_due: DateTime<Utc>,
    pub last_error: String,
}

/// Entry that exhausted its retry budget.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterEntry {
    pub id: EntityId,
    pub operation: IndexOperation,
    pub attempts: u32,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetryQueueStats {
    pub pending: usize,
    pub dead_lettered: usize,
    pub enqueued_total: u64,
    pub recovered_total: u64,
}

/// What happened to a task handed back after another failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rescheduled {
    Retrying { next_due: DateTime<Utc> },
    DeadLettered,
    /// A newer entry for the same identity arrived meanwhile; this one was dropped.
    Superseded,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: BTreeMap<EntityId, PendingResync>,
    dead: VecDeque<DeadLetterEntry>,
    enqueued_total: u64,
    recovered_total: u64,
}

#[derive(Debug)]
pub struct IndexRetryQueue {
    policy: RetryPolicy,
    state: Mutex<QueueState>,
}

impl QueueState {
    fn bury(&mut self, entry: DeadLetterEntry) {
        self.dead.retain(|e| e.id != entry.id);
        self.dead.push_back(entry);
        while self.dead.len() > DEAD_LETTER_CAPACITY {
            self.dead.pop_front();
        }
    }
}

fn after(now: DateTime<Utc>, delay: std::time::Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero())
}

impl IndexRetryQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failed index write for `id`.
    pub fn enqueue(
        &self,
        id: EntityId,
        operation: IndexOperation,
        error: impl ToString,
        now: DateTime<Utc>,
    ) {
        let error = error.to_string();
        let mut state = self.state();
        state.enqueued_total += 1;

        if !self.policy.should_retry(1) {
            state.pending.remove(&id);
            state.bury(DeadLetterEntry {
                id,
                operation,
                attempts: 1,
                reason: error,
                dead_lettered_at: now,
            });
            return;
        }

        state.dead.retain(|e| e.id != id);

        state.pending.insert(
            id,
            PendingResync {
                id,
                operation,
                attempts: 1,
                next_due: after(now, self.policy.delay_after(1)),
                last_error: error,
            },
        );
    }

    /// Forget `id` once its index entry is in sync: drops its pending entry
    /// and any dead letter. Returns whether a pending entry existed.
    pub fn discard(&self, id: EntityId) -> bool {
        let mut state = self.state();
        state.dead.retain(|e| e.id != id);
        state.pending.remove(&id).is_some()
    }

    /// Remove and return every entry due at `now`.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<PendingResync> {
        let mut state = self.state();
        let due: Vec<EntityId> = state
            .pending
            .values()
            .filter(|t| t.next_due <= now)
            .map(|t| t.id)
            .collect();
        due.iter()
            .filter_map(|id| state.pending.remove(id))
            .collect()
    }

    /// Hand back a task whose replay failed again.
    pub fn reschedule(
        &self,
        mut task: PendingResync,
        error: impl ToString,
        now: DateTime<Utc>,
    ) -> Rescheduled {
        let mut state = self.state();
        if state.pending.contains_key(&task.id) {
            return Rescheduled::Superseded;
        }

        task.attempts += 1;
        task.last_error = error.to_string();

        if self.policy.should_retry(task.attempts) {
            let next_due = after(now, self.policy.delay_after(task.attempts));
            task.next_due = next_due;
            state.pending.insert(task.id, task);
            Rescheduled::Retrying { next_due }
        } else {
            state.bury(DeadLetterEntry {
                id: task.id,
                operation: task.operation,
                attempts: task.attempts,
                reason: task.last_error,
                dead_lettered_at: now,
            });
            Rescheduled::DeadLettered
        }
    }

    pub fn record_recovery(&self) {
        self.state().recovered_total += 1;
    }

    pub fn stats(&self) -> RetryQueueStats {
        let state = self.state();
        RetryQueueStats {
            pending: state.pending.len(),
            dead_lettered: state.dead.len(),
            enqueued_total: state.enqueued_total,
            recovered_total: state.recovered_total,
        }
    }

    pub fn pending(&self) -> Vec<PendingResync> {
        self.state().pending.values().cloned().collect()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetterEntry> {
        self.state().dead.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.state().pending.is_empty()
    }
}

impl Default for IndexRetryQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
