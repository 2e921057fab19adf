//! Background workers that keep the search index converging on the record store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use storefront_core::Entity;

use super::error::SyncError;
use super::retry_queue::RetryQueueStats;
use super::synchronizer::{EntitySynchronizer, ReconcileReport, RetryRound};
use crate::record_store::RecordStore;
use crate::search_index::SearchIndex;

/// Kind-erased view of a synchronizer, as driven by the workers and the admin API.
#[async_trait::async_trait]
pub trait SyncTarget: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn retry_due(&self, now: DateTime<Utc>) -> RetryRound;

    async fn reconcile(&self) -> Result<ReconcileReport, SyncError>;

    fn retry_stats(&self) -> RetryQueueStats;
}

#[async_trait::async_trait]
impl<E, R, S> SyncTarget for EntitySynchronizer<E, R, S>
where
    E: Entity,
    R: RecordStore<E>,
    S: SearchIndex<E>,
{
    fn kind(&self) -> &'static str {
        E::KIND
    }

    async fn retry_due(&self, now: DateTime<Utc>) -> RetryRound {
        EntitySynchronizer::retry_due(self, now).await
    }

    async fn reconcile(&self) -> Result<ReconcileReport, SyncError> {
        EntitySynchronizer::reconcile(self).await
    }

    fn retry_stats(&self) -> RetryQueueStats {
        self.retry_queue().stats()
    }
}

/// Handle to stop and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request graceful shutdown and wait for the worker to stop.
    ///
    /// A tick already in progress is allowed to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                warn!(worker = self.name, error = ?err, "worker task ended abnormally");
            }
        }
    }
}

fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> WorkerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let period = period.max(Duration::from_millis(1));

    let join = tokio::spawn(async move {
        info!(worker = name, period_ms = period.as_millis() as u64, "worker started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => tick().await,
            }
        }

        info!(worker = name, "worker stopped");
    });

    WorkerHandle {
        name,
        shutdown: shutdown_tx,
        join: Some(join),
    }
}

/// Periodically replays due index retry tasks for every kind.
#[derive(Debug)]
pub struct IndexRetryWorker;

impl IndexRetryWorker {
    pub fn spawn(targets: Vec<Arc<dyn SyncTarget>>, period: Duration) -> WorkerHandle {
        let targets = Arc::new(targets);
        spawn_periodic("index-retry", period, move || {
            let targets = targets.clone();
            async move {
                let now = Utc::now();
                for target in targets.iter() {
                    let round = target.retry_due(now).await;
                    if round.attempted > 0 {
                        debug!(
                            worker = "index-retry",
                            kind = target.kind(),
                            attempted = round.attempted,
                            recovered = round.recovered,
                            rescheduled = round.rescheduled,
                            dead_lettered = round.dead_lettered,
                            "retry round finished"
                        );
                    }
                }
            }
        })
    }
}

/// Periodically rebuilds every kind's index from its record store.
#[derive(Debug)]
pub struct ReconcileWorker;

impl ReconcileWorker {
    pub fn spawn(targets: Vec<Arc<dyn SyncTarget>>, period: Duration) -> WorkerHandle {
        let targets = Arc::new(targets);
        spawn_periodic("reconcile", period, move || {
            let targets = targets.clone();
            async move {
                for target in targets.iter() {
                    if let Err(err) = target.reconcile().await {
                        warn!(worker = "reconcile", kind = target.kind(), error = %err, "reconciliation failed");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingTarget {
        retries: AtomicUsize,
        reconciles: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SyncTarget for CountingTarget {
        fn kind(&self) -> &'static str {
            "counting"
        }

        async fn retry_due(&self, _now: DateTime<Utc>) -> RetryRound {
            self.retries.fetch_add(1, Ordering::SeqCst);
            RetryRound::default()
        }

        async fn reconcile(&self) -> Result<ReconcileReport, SyncError> {
            self.reconciles.fetch_add(1, Ordering::SeqCst);
            Ok(ReconcileReport {
                kind: "counting",
                upserted: 0,
                removed: 0,
                failed: 0,
            })
        }

        fn retry_stats(&self) -> RetryQueueStats {
            RetryQueueStats::default()
        }
    }

    #[tokio::test]
    async fn retry_worker_ticks_until_shutdown() {
        let target = Arc::new(CountingTarget::default());
        let targets: Vec<Arc<dyn SyncTarget>> = vec![target.clone()];
        let handle = IndexRetryWorker::spawn(targets, Duration::from_millis(5));
        assert_eq!(handle.name(), "index-retry");

        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.shutdown().await;

        let ticks = target.retries.load(Ordering::SeqCst);
        assert!(ticks >= 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(target.retries.load(Ordering::SeqCst), ticks);
        assert_eq!(target.reconciles.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reconcile_worker_drives_every_target() {
        let a = Arc::new(CountingTarget::default());
        let b = Arc::new(CountingTarget::default());
        let targets: Vec<Arc<dyn SyncTarget>> = vec![a.clone(), b.clone()];
        let handle = ReconcileWorker::spawn(targets, Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.shutdown().await;

        assert!(a.reconciles.load(Ordering::SeqCst) >= 1);
        assert!(b.reconciles.load(Ordering::SeqCst) >= 1);
    }
}
