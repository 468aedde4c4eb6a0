//! Rows persisted in the local database.

use chrono::{DateTime, Utc};

use valet_shared::{ShiftId, ShiftRecord};

/// A snapshot waiting in the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub shift_id: ShiftId,
    pub record: ShiftRecord,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}
