//! Latest local snapshot of every shift known to the device.

use rusqlite::params;

use valet_shared::{ShiftId, ShiftRecord};

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Insert or replace the snapshot of a shift.
    pub fn save_shift(&self, record: &ShiftRecord) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO shifts (id, code, ended, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id.to_string(),
                record.shift_code.as_str(),
                record.is_ended(),
                record.to_bytes()?,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_shift(&self, id: ShiftId) -> Result<ShiftRecord> {
        let payload: Vec<u8> = self
            .conn()
            .query_row(
                "SELECT payload FROM shifts WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;
        Ok(ShiftRecord::from_bytes(&payload)?)
    }

    /// All stored shifts, oldest start first.
    pub fn list_shifts(&self) -> Result<Vec<ShiftRecord>> {
        let mut stmt = self.conn().prepare("SELECT payload FROM shifts")?;
        let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

        let mut shifts = Vec::new();
        for payload in rows {
            shifts.push(ShiftRecord::from_bytes(&payload?)?);
        }
        shifts.sort_by_key(|s| s.start_time);
        Ok(shifts)
    }
}

#[cfg(test)]
mod tests {
    use valet_shared::protocol::now;
    use valet_shared::{Shift, ShiftCode};

    use super::*;

    #[test]
    fn test_save_and_list() {
        let db = Database::open_in_memory().unwrap();
        let mut shift = Shift::start("Smith", "123 Main St", ShiftCode::generate(), now()).unwrap();
        db.save_shift(&ShiftRecord::from(&shift)).unwrap();

        shift.end(now());
        db.save_shift(&ShiftRecord::from(&shift)).unwrap();

        let all = db.list_shifts().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_ended());
        assert_eq!(db.get_shift(shift.id).unwrap(), all[0]);
    }

    #[test]
    fn test_get_missing_shift() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_shift(ShiftId::new()),
            Err(StoreError::NotFound)
        ));
    }
}
