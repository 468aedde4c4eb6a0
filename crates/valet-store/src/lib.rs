//! # valet-store
//!
//! Local SQLite storage for a valet device.
//!
//! Two tables live here: the sync **outbox**, holding shift snapshots that
//! have not yet been accepted by the remote store, and the **shifts** table,
//! holding the latest local snapshot of every shift so the session registry
//! can be rebuilt after a restart. Snapshots are stored as bincode blobs of
//! [`valet_shared::ShiftRecord`].

pub mod database;
pub mod migrations;
pub mod models;
pub mod outbox;
pub mod shifts;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
