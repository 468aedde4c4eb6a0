//! Background sync worker with a tokio mpsc command/notification pattern.
//!
//! The registry never talks to the network. It hands full shift snapshots to
//! a [`SyncHandle`], which forwards them over an unbounded channel, so
//! enqueueing never blocks. The worker task owns the outbox:
//!
//! - snapshots coalesce per shift (the newest local snapshot supersedes older ones)
//! - every push is bounded by a timeout and retried with exponential backoff
//! - snapshots that still fail stay queued and are retried on a periodic tick
//! - with a [`Database`] attached, the outbox and local snapshots survive restarts
//!
//! Failures never roll back local state; they are reported as
//! [`SyncNotification::PushFailed`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use valet_shared::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_PUSH_MAX_ATTEMPTS,
    DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_SYNC_TIMEOUT_MS,
};
use valet_shared::{merge_shift, ShiftId, ShiftRecord};
use valet_store::{Database, StoreError};

use crate::backoff::Backoff;
use crate::error::SyncError;
use crate::gateway::SyncGateway;

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the sync worker.
#[derive(Debug)]
pub enum SyncCommand {
    /// Queue a full snapshot for upsert.
    Push(ShiftRecord),
    /// Attempt delivery of everything queued, then reply with the number of
    /// snapshots still pending.
    Flush(oneshot::Sender<usize>),
    /// Stop the worker. Pending snapshots stay in the durable outbox.
    Shutdown,
}

/// Notifications sent *from* the sync worker.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncNotification {
    /// The remote store accepted a snapshot; `merged` is its merged view,
    /// including additions made by other devices.
    Pushed {
        shift_id: ShiftId,
        merged: ShiftRecord,
    },
    /// A delivery round failed. `will_retry` is `false` when the remote
    /// rejected the snapshot outright and it was dropped from the outbox.
    PushFailed {
        shift_id: ShiftId,
        attempts: u32,
        error: SyncError,
        will_retry: bool,
    },
    /// A delivery round emptied the outbox.
    Idle,
}

/// Tunables for the worker.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound for a single push.
    pub timeout: Duration,
    /// Attempts per delivery round before the snapshot is parked.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// How often parked snapshots are retried.
    pub retry_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_SYNC_TIMEOUT_MS),
            max_attempts: DEFAULT_PUSH_MAX_ATTEMPTS,
            backoff: Backoff::new(
                Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
                Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
            ),
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Sending side used by the registry.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncCommand>,
}

impl SyncHandle {
    /// Create a handle and the command receiver to hand to
    /// [`spawn_sync_worker`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a snapshot. Never blocks and never fails: if the worker is gone
    /// the local state is still authoritative and the loss is logged.
    pub fn push(&self, record: ShiftRecord) {
        let shift_id = record.id;
        if self.tx.send(SyncCommand::Push(record)).is_err() {
            warn!(shift_id = %shift_id, "Sync worker stopped, snapshot not queued");
        }
    }

    /// Ask the worker to deliver everything queued. Returns the number of
    /// snapshots still pending afterwards.
    pub async fn flush(&self) -> Result<usize, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::Flush(reply_tx))
            .map_err(|_| SyncError::WorkerStopped)?;
        reply_rx.await.map_err(|_| SyncError::WorkerStopped)
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(SyncCommand::Shutdown);
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Spawn the sync worker in a background tokio task.
///
/// Returns the task handle and the notification receiver. Snapshots left in
/// `database`'s outbox by a previous run are queued first.
pub fn spawn_sync_worker(
    gateway: Arc<dyn SyncGateway>,
    commands: mpsc::UnboundedReceiver<SyncCommand>,
    config: SyncConfig,
    database: Option<Database>,
) -> (JoinHandle<()>, mpsc::Receiver<SyncNotification>) {
    let (notif_tx, notif_rx) = mpsc::channel(256);

    let mut worker = SyncWorker {
        gateway,
        config,
        database,
        pending: Vec::new(),
        notif_tx,
    };
    worker.load_outbox();

    let handle = tokio::spawn(worker.run(commands));
    (handle, notif_rx)
}

struct SyncWorker {
    gateway: Arc<dyn SyncGateway>,
    config: SyncConfig,
    database: Option<Database>,
    /// Queued snapshots in first-enqueued order, one per shift.
    pending: Vec<ShiftRecord>,
    notif_tx: mpsc::Sender<SyncNotification>,
}

impl SyncWorker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SyncCommand>) {
        let mut retry_tick = tokio::time::interval(self.config.retry_interval);
        retry_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(pending = self.pending.len(), "Sync worker started");

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(SyncCommand::Push(record)) => {
                            self.enqueue(record);
                            self.drain().await;
                        }
                        Some(SyncCommand::Flush(reply)) => {
                            self.drain().await;
                            let _ = reply.send(self.pending.len());
                        }
                        Some(SyncCommand::Shutdown) => {
                            info!("Sync worker shutdown requested");
                            break;
                        }
                        None => {
                            info!("Command channel closed, shutting down sync worker");
                            break;
                        }
                    }
                }

                _ = retry_tick.tick() => {
                    if !self.pending.is_empty() {
                        debug!(pending = self.pending.len(), "Retrying parked snapshots");
                        self.drain().await;
                    }
                }
            }
        }

        info!(pending = self.pending.len(), "Sync worker terminated");
    }

    fn load_outbox(&mut self) {
        let Some(db) = self.database.as_ref() else {
            return;
        };
        match db.pending_pushes() {
            Ok(entries) => {
                self.pending = entries.into_iter().map(|e| e.record).collect();
                if !self.pending.is_empty() {
                    info!(count = self.pending.len(), "Restored snapshots from outbox");
                }
            }
            Err(e) => error!(error = %e, "Failed to read outbox"),
        }
    }

    fn enqueue(&mut self, record: ShiftRecord) {
        if let Some(db) = self.database.as_ref() {
            if let Err(e) = db
                .enqueue_push(&record)
                .and_then(|_| db.save_shift(&record))
            {
                error!(shift_id = %record.id, error = %e, "Failed to persist snapshot");
            }
        }

        match self.pending.iter_mut().find(|p| p.id == record.id) {
            Some(slot) => *slot = record,
            None => self.pending.push(record),
        }
    }

    /// One delivery round over every queued snapshot.
    async fn drain(&mut self) {
        let had_pending = !self.pending.is_empty();
        let ids: Vec<ShiftId> = self.pending.iter().map(|p| p.id).collect();
        for id in ids {
            let Some(record) = self.pending.iter().find(|p| p.id == id).cloned() else {
                continue;
            };

            match self.deliver(&record).await {
                Ok(merged) => {
                    self.pending.retain(|p| p.id != id);
                    self.on_delivered(&merged);
                    self.notify(SyncNotification::Pushed {
                        shift_id: id,
                        merged,
                    });
                }
                Err((attempts, err)) => {
                    let will_retry = err.is_transient();
                    if !will_retry {
                        error!(
                            shift_id = %id,
                            error = %err,
                            "Remote rejected snapshot, dropping it"
                        );
                        self.pending.retain(|p| p.id != id);
                        self.forget(id);
                    } else {
                        warn!(
                            shift_id = %id,
                            attempts,
                            error = %err,
                            "Push failed, parked for retry"
                        );
                    }
                    self.notify(SyncNotification::PushFailed {
                        shift_id: id,
                        attempts,
                        error: err,
                        will_retry,
                    });
                }
            }
        }

        if had_pending && self.pending.is_empty() {
            self.notify(SyncNotification::Idle);
        }
    }

    /// Push one snapshot with timeout and backoff. On failure returns the
    /// number of attempts made and the last error.
    async fn deliver(&mut self, record: &ShiftRecord) -> Result<ShiftRecord, (u32, SyncError)> {
        let gateway = Arc::clone(&self.gateway);
        let timeout = self.config.timeout;
        let max_attempts = self.config.max_attempts.max(1);
        let backoff = self.config.backoff;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, gateway.push(record)).await {
                Ok(result) => result,
                Err(_) => Err(SyncError::Timeout(timeout)),
            };

            match result {
                Ok(merged) => {
                    debug!(shift_id = %record.id, attempt, "Snapshot delivered");
                    return Ok(merged);
                }
                Err(err) => {
                    self.record_failure(record.id, &err);
                    if !err.is_transient() || attempt >= max_attempts {
                        return Err((attempt, err));
                    }
                    let delay = backoff.delay(attempt);
                    debug!(
                        shift_id = %record.id,
                        attempt,
                        ?delay,
                        error = %err,
                        "Push failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn on_delivered(&self, merged: &ShiftRecord) {
        let Some(db) = self.database.as_ref() else {
            return;
        };
        // A newer local snapshot may already be queued; keep both sides.
        let local = match db.get_shift(merged.id) {
            Ok(local) => merge_shift(&local, merged),
            Err(StoreError::NotFound) => merged.clone(),
            Err(e) => {
                error!(shift_id = %merged.id, error = %e, "Failed to read local snapshot");
                return;
            }
        };
        let still_pending = self.pending.iter().any(|p| p.id == merged.id);
        let result = db.save_shift(&local).and_then(|_| {
            if still_pending {
                Ok(())
            } else {
                db.complete_push(merged.id).map(|_| ())
            }
        });
        if let Err(e) = result {
            error!(shift_id = %merged.id, error = %e, "Failed to update outbox");
        }
    }

    fn record_failure(&self, id: ShiftId, err: &SyncError) {
        if let Some(db) = self.database.as_ref() {
            if let Err(e) = db.record_push_failure(id, &err.to_string()) {
                debug!(shift_id = %id, error = %e, "Could not record push failure");
            }
        }
    }

    fn forget(&self, id: ShiftId) {
        if let Some(db) = self.database.as_ref() {
            if let Err(e) = db.complete_push(id) {
                error!(shift_id = %id, error = %e, "Failed to drop outbox entry");
            }
        }
    }

    fn notify(&self, notification: SyncNotification) {
        if let Err(e) = self.notif_tx.try_send(notification) {
            debug!(error = %e, "Sync notification dropped");
        }
    }
}
