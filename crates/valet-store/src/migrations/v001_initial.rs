//! v001 -- Initial schema creation.
//!
//! Creates the `outbox` and `shifts` tables.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Outbox: snapshots waiting to be accepted by the remote store.
-- One row per shift; a newer snapshot replaces an older one.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS outbox (
    shift_id    TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    payload     BLOB NOT NULL,               -- bincode ShiftRecord
    attempts    INTEGER NOT NULL DEFAULT 0,
    last_error  TEXT,
    enqueued_at TEXT NOT NULL,               -- RFC-3339
    updated_at  TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Shifts: latest local snapshot of every known shift.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS shifts (
    id         TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    code       TEXT NOT NULL,
    ended      INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    payload    BLOB NOT NULL,                -- bincode ShiftRecord
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_shifts_code ON shifts(code);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
