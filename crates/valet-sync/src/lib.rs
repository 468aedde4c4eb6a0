// Sync gateway: propagation of local shift snapshots to a remote store.

pub mod backoff;
pub mod error;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod worker;

pub use backoff::Backoff;
pub use error::SyncError;
pub use gateway::{fetch_with_timeout, SyncGateway};
pub use http::HttpGateway;
pub use memory::MemoryGateway;
pub use worker::{spawn_sync_worker, SyncCommand, SyncConfig, SyncHandle, SyncNotification};
