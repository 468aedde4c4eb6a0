//! Durable sync outbox.

use chrono::{DateTime, Utc};
use rusqlite::params;

use valet_shared::{ShiftId, ShiftRecord};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::OutboxEntry;

impl Database {
    /// Queue a snapshot for delivery, replacing any pending snapshot of the
    /// same shift. The attempt counter restarts for the new snapshot.
    pub fn enqueue_push(&self, record: &ShiftRecord) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO outbox (shift_id, payload, attempts, last_error, enqueued_at, updated_at)
             VALUES (?1, ?2, 0, NULL, ?3, ?3)
             ON CONFLICT(shift_id) DO UPDATE SET
                 payload = excluded.payload,
                 attempts = 0,
                 last_error = NULL,
                 updated_at = excluded.updated_at",
            params![record.id.to_string(), record.to_bytes()?, now],
        )?;
        Ok(())
    }

    /// All pending snapshots, oldest first.
    pub fn pending_pushes(&self) -> Result<Vec<OutboxEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT shift_id, payload, attempts, last_error, enqueued_at
             FROM outbox
             ORDER BY enqueued_at ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, payload, attempts, last_error, enqueued) = row?;
            let enqueued_at: DateTime<Utc> =
                DateTime::parse_from_rfc3339(&enqueued)?.with_timezone(&Utc);
            entries.push(OutboxEntry {
                shift_id: ShiftId::parse(&id)?,
                record: ShiftRecord::from_bytes(&payload)?,
                attempts,
                last_error,
                enqueued_at,
            });
        }
        Ok(entries)
    }

    /// Record a failed delivery attempt.
    pub fn record_push_failure(&self, shift_id: ShiftId, error: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE outbox
             SET attempts = attempts + 1, last_error = ?2, updated_at = ?3
             WHERE shift_id = ?1",
            params![shift_id.to_string(), error, Utc::now().to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Drop a delivered snapshot.  Returns `true` if a row was deleted.
    pub fn complete_push(&self, shift_id: ShiftId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM outbox WHERE shift_id = ?1",
            params![shift_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    pub fn outbox_len(&self) -> Result<usize> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use valet_shared::protocol::now;
    use valet_shared::{NewCar, Shift, ShiftCode};

    use super::*;

    fn record() -> (Shift, ShiftRecord) {
        let shift = Shift::start("Smith", "123 Main St", ShiftCode::generate(), now()).unwrap();
        let record = ShiftRecord::from(&shift);
        (shift, record)
    }

    #[test]
    fn test_enqueue_and_complete() {
        let db = Database::open_in_memory().unwrap();
        let (_, rec) = record();

        db.enqueue_push(&rec).unwrap();
        let pending = db.pending_pushes().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record, rec);
        assert_eq!(pending[0].attempts, 0);

        assert!(db.complete_push(rec.id).unwrap());
        assert!(!db.complete_push(rec.id).unwrap());
        assert_eq!(db.outbox_len().unwrap(), 0);
    }

    #[test]
    fn test_newer_snapshot_replaces_pending() {
        let db = Database::open_in_memory().unwrap();
        let (mut shift, first) = record();
        db.enqueue_push(&first).unwrap();
        db.record_push_failure(first.id, "connection refused")
            .unwrap();

        let car = NewCar::new("ABC123", "Toyota", "Corolla", "Silver", "Row 3");
        shift.check_in(car, now()).unwrap();
        let second = ShiftRecord::from(&shift);
        db.enqueue_push(&second).unwrap();

        let pending = db.pending_pushes().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record.cars.len(), 1);
        assert_eq!(pending[0].attempts, 0);
        assert!(pending[0].last_error.is_none());
    }

    #[test]
    fn test_failure_is_counted() {
        let db = Database::open_in_memory().unwrap();
        let (_, rec) = record();
        db.enqueue_push(&rec).unwrap();

        db.record_push_failure(rec.id, "timeout").unwrap();
        db.record_push_failure(rec.id, "timeout again").unwrap();

        let entry = &db.pending_pushes().unwrap()[0];
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.last_error.as_deref(), Some("timeout again"));
    }

    #[test]
    fn test_failure_on_unknown_shift() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.record_push_failure(ShiftId::new(), "x"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_outbox_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valet.db");
        let (_, rec) = record();

        {
            let db = Database::open_at(&path).unwrap();
            db.enqueue_push(&rec).unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.pending_pushes().unwrap()[0].shift_id, rec.id);
    }
}
