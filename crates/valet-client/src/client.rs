//! Client façade: one device's identity, registry, join protocol and sync
//! worker wired together.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use valet_shared::{CarId, Identity, ReturnConfirmation, ReturnOutcome, Shift, ShiftId, ValetError};
use valet_store::{Database, StoreError};
use valet_sync::{
    spawn_sync_worker, HttpGateway, MemoryGateway, SyncError, SyncGateway, SyncHandle,
    SyncNotification,
};

use crate::config::ClientConfig;
use crate::join::{JoinOutcome, JoinProtocol};
use crate::registry::ShiftStore;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Local storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

pub struct ValetClient {
    store: ShiftStore,
    join: JoinProtocol,
    sync: SyncHandle,
    notifications: mpsc::Receiver<SyncNotification>,
    worker: JoinHandle<()>,
    confirmation: ReturnConfirmation,
}

impl ValetClient {
    /// Start a client from configuration. With a `server_url` the remote is
    /// the HTTP shift store; otherwise a private in-memory remote is used and
    /// nothing leaves the device.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: ClientConfig, identity: Identity) -> Result<Self, ClientError> {
        let gateway: Arc<dyn SyncGateway> = match config.server_url.as_deref() {
            Some(url) => {
                info!(server = %url, "Using remote shift store");
                Arc::new(HttpGateway::new(url, config.sync_timeout)?)
            }
            None => {
                info!("No server configured, shifts stay on this device");
                Arc::new(MemoryGateway::new())
            }
        };
        Self::with_gateway(config, identity, gateway)
    }

    /// Start a client against an explicit remote, e.g. a `MemoryGateway`
    /// shared by several simulated devices.
    pub fn with_gateway(
        config: ClientConfig,
        identity: Identity,
        gateway: Arc<dyn SyncGateway>,
    ) -> Result<Self, ClientError> {
        let database = if config.persist {
            let db = match config.db_path.as_deref() {
                Some(path) => Database::open_at(path)?,
                None => Database::new()?,
            };
            Some(db)
        } else {
            None
        };

        let (sync, commands) = SyncHandle::channel();
        let mut store = ShiftStore::new(identity, sync.clone());

        if let Some(db) = database.as_ref() {
            store.restore(db.list_shifts()?);
        }

        let (worker, notifications) =
            spawn_sync_worker(gateway.clone(), commands, config.sync_config(), database);

        info!(
            participant = %store.identity().name(),
            participant_id = %store.identity().participant_id(),
            shifts = store.shifts().len(),
            "Valet client started"
        );

        Ok(Self {
            store,
            join: JoinProtocol::new(gateway, config.sync_timeout),
            sync,
            notifications,
            worker,
            confirmation: ReturnConfirmation::new(config.return_hold),
        })
    }

    pub fn identity(&self) -> &Identity {
        self.store.identity()
    }

    pub fn registry(&self) -> &ShiftStore {
        &self.store
    }

    pub fn registry_mut(&mut self) -> &mut ShiftStore {
        &mut self.store
    }

    /// Join a shift by code as this device's participant.
    pub async fn join(&mut self, code: &str) -> Result<JoinOutcome, ValetError> {
        let name = self.store.identity().name().to_string();
        self.join_as(code, &name).await
    }

    /// Join a shift by code under another display name, e.g. a colleague
    /// sharing this device.
    pub async fn join_as(&mut self, code: &str, name: &str) -> Result<JoinOutcome, ValetError> {
        self.join.join(&mut self.store, code, name).await
    }

    /// Pull the remote's current view of a known shift and merge it in.
    pub async fn refresh(&mut self, shift_id: ShiftId) -> Result<Shift, ValetError> {
        let code = self
            .store
            .shift(shift_id)
            .map(|s| s.code().to_string())
            .ok_or(ValetError::ShiftNotFound(shift_id))?;
        let record = self.join.resolve(&code).await?;
        if record.id != shift_id {
            // another shift reuses the code remotely; ours is the source of truth
            debug!(
                shift_id = %shift_id,
                other = %record.id,
                "Code resolves to a different shift"
            );
            return self
                .store
                .shift(shift_id)
                .cloned()
                .ok_or(ValetError::ShiftNotFound(shift_id));
        }
        self.store.adopt_remote(&record)
    }

    // -- Return confirmation ---------------------------------------------------

    /// Start holding the return control for `car`.
    pub fn begin_return(&mut self, car: CarId) {
        self.confirmation.begin(car, Instant::now());
    }

    pub fn cancel_return(&mut self) {
        self.confirmation.cancel();
    }

    /// Release the return control. The car is returned only if the same car
    /// was held long enough; otherwise `Ok(None)` and nothing changes.
    pub fn confirm_return(
        &mut self,
        shift_id: ShiftId,
        car_id: CarId,
    ) -> Result<Option<ReturnOutcome>, ValetError> {
        match self.confirmation.confirm(car_id, Instant::now()) {
            Some(car) => self.store.return_car(shift_id, car).map(Some),
            None => {
                debug!(car_id = %car_id, "Return not confirmed");
                Ok(None)
            }
        }
    }

    pub fn return_hold(&self) -> Duration {
        self.confirmation.hold()
    }

    // -- Sync ----------------------------------------------------------------

    /// Drain worker notifications and fold merged remote snapshots into the
    /// registry. Returns how many snapshots were applied.
    pub fn apply_sync_notifications(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(notification) = self.notifications.try_recv() {
            match notification {
                SyncNotification::Pushed { shift_id, merged } => {
                    match self.store.adopt_remote(&merged) {
                        Ok(_) => applied += 1,
                        Err(e) => error!(
                            shift_id = %shift_id,
                            error = %e,
                            "Failed to apply merged snapshot"
                        ),
                    }
                }
                SyncNotification::PushFailed {
                    shift_id,
                    attempts,
                    error,
                    will_retry,
                } => {
                    warn!(
                        shift_id = %shift_id,
                        attempts,
                        error = %error,
                        will_retry,
                        "Shift not synced"
                    );
                }
                SyncNotification::Idle => debug!("Outbox empty"),
            }
        }
        applied
    }

    /// Deliver everything queued. Returns the number of snapshots still
    /// pending.
    pub async fn flush(&self) -> Result<usize, ClientError> {
        Ok(self.sync.flush().await?)
    }

    /// Flush, fold in the remote's merged view and return the number of
    /// snapshots still pending.
    pub async fn sync_now(&mut self) -> Result<usize, ClientError> {
        let pending = self.flush().await?;
        self.apply_sync_notifications();
        Ok(pending)
    }

    /// Stop the sync worker. Undelivered snapshots stay in the outbox when
    /// persistence is enabled.
    pub async fn shutdown(self) {
        self.sync.shutdown();
        if let Err(e) = self.worker.await {
            error!(error = %e, "Sync worker panicked");
        }
        info!("Valet client stopped");
    }
}
