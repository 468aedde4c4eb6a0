//! In-process remote store.
//!
//! Every clone shares the same table, so several registries wired to clones
//! of one `MemoryGateway` behave like devices talking to one backend. The
//! gateway can be taken offline or slowed down to exercise failure paths.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use valet_shared::{ShiftCode, ShiftId, ShiftRecord, ShiftTable};

use crate::error::SyncError;
use crate::gateway::SyncGateway;

#[derive(Debug, Clone)]
pub struct MemoryGateway {
    table: Arc<RwLock<ShiftTable>>,
    online: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
    pushes: Arc<AtomicU64>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(ShiftTable::new())),
            online: Arc::new(AtomicBool::new(true)),
            latency_ms: Arc::new(AtomicU64::new(0)),
            pushes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Delay applied before every response.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of accepted pushes.
    pub fn push_count(&self) -> u64 {
        self.pushes.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self, id: ShiftId) -> Option<ShiftRecord> {
        self.table.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }

    async fn simulate_network(&self) -> Result<(), SyncError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(SyncError::Offline);
        }
        Ok(())
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncGateway for MemoryGateway {
    async fn push(&self, shift: &ShiftRecord) -> Result<ShiftRecord, SyncError> {
        self.simulate_network().await?;
        if let Err(e) = shift.to_shift(&[]) {
            return Err(SyncError::Rejected {
                status: 400,
                message: e.to_string(),
            });
        }
        let merged = self.table.write().await.upsert(shift.clone());
        self.pushes.fetch_add(1, Ordering::SeqCst);
        Ok(merged)
    }

    async fn fetch_by_code(&self, code: &ShiftCode) -> Result<Option<ShiftRecord>, SyncError> {
        self.simulate_network().await?;
        let table = self.table.read().await;
        Ok(table.find_by_code(code.as_str()).cloned())
    }
}
