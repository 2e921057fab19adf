//! Dual-store synchronization.
//!
//! The record store is written first and is authoritative; the search index
//! follows. A failed index write never fails the caller's operation: it is
//! logged and queued for retry, and reconciliation can rebuild the index from
//! the record store at any time.

pub mod error;
pub mod locks;
pub mod retry;
pub mod retry_queue;
pub mod synchronizer;
pub mod workers;

pub use error::SyncError;
pub use locks::{IdentityGuard, IdentityLocks};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use retry_queue::{
    DEAD_LETTER_CAPACITY, DeadLetterEntry, IndexOperation, IndexRetryQueue, PendingResync, RetryQueueStats, Rescheduled,
};
pub use synchronizer::{
    EntitySynchronizer, ReconcileReport, Resynced, RetryRound, UpdatePolicy,
};
pub use workers::{IndexRetryWorker, ReconcileWorker, SyncTarget, WorkerHandle};
