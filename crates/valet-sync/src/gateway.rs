//! The replaceable sync gateway contract.
//!
//! An implementation offers an eventually-consistent upsert of a full shift
//! snapshot keyed by shift id, and a case-insensitive point lookup by shift
//! code returning at most one match. Remote stores merge rather than
//! overwrite (see [`valet_shared::merge`]).

use std::time::Duration;

use async_trait::async_trait;

use valet_shared::{ShiftCode, ShiftRecord};

use crate::error::SyncError;

#[async_trait]
pub trait SyncGateway: Send + Sync {
    /// Upsert a snapshot. Returns the remote's merged view of the shift.
    async fn push(&self, shift: &ShiftRecord) -> Result<ShiftRecord, SyncError>;

    /// Look a shift up by code. `Ok(None)` when no shift matches.
    async fn fetch_by_code(&self, code: &ShiftCode) -> Result<Option<ShiftRecord>, SyncError>;
}

/// Lookup bounded by `timeout`, so an unresponsive remote surfaces as
/// [`SyncError::Timeout`] instead of hanging the caller.
pub async fn fetch_with_timeout(
    gateway: &dyn SyncGateway,
    code: &ShiftCode,
    timeout: Duration,
) -> Result<Option<ShiftRecord>, SyncError> {
    match tokio::time::timeout(timeout, gateway.fetch_by_code(code)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(code = %code, ?timeout, "Shift lookup timed out");
            Err(SyncError::Timeout(timeout))
        }
    }
}
