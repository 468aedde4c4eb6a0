use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use valet_shared::{ShiftId, ShiftRecord, ShiftTable};

use crate::error::ServerError;

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let mut resolved = base.to_path_buf();
    for component in target.strip_prefix(base).unwrap_or(target).components() {
        match component {
            std::path::Component::Normal(c) => resolved.push(c),
            std::path::Component::ParentDir => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(base) {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

/// The remote shift store: every snapshot ever pushed, merged per shift id
/// and archived as `<data_dir>/<shift-id>.json`.
#[derive(Debug)]
pub struct ShiftRepository {
    data_dir: PathBuf,
    table: RwLock<ShiftTable>,
}

impl ShiftRepository {
    /// Open the archive, creating the directory if missing and loading every
    /// readable snapshot in it.
    pub async fn open(data_dir: PathBuf) -> Result<Self, ServerError> {
        fs::create_dir_all(&data_dir).await.map_err(|e| {
            ServerError::Storage(format!(
                "Failed to create data directory '{}': {}",
                data_dir.display(),
                e
            ))
        })?;

        let table = load_archive(&data_dir).await?;
        info!(path = %data_dir.display(), shifts = table.len(), "Shift repository initialized");

        Ok(Self {
            data_dir,
            table: RwLock::new(table),
        })
    }

    /// Merge a snapshot into the stored shift and archive the result.
    pub async fn upsert(&self, record: ShiftRecord) -> Result<ShiftRecord, ServerError> {
        let path = self.shift_path(record.id)?;

        // Held across the write so archive order matches merge order.
        let mut table = self.table.write().await;
        let merged = table.upsert(record);

        let json = serde_json::to_vec_pretty(&merged)
            .map_err(|e| ServerError::Internal(format!("Failed to encode shift: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json).await.map_err(|e| {
            ServerError::Storage(format!("Failed to write shift {}: {}", merged.id, e))
        })?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            ServerError::Storage(format!("Failed to archive shift {}: {}", merged.id, e))
        })?;

        debug!(
            shift_id = %merged.id,
            cars = merged.cars.len(),
            employees = merged.employees.len(),
            ended = merged.is_ended(),
            "Stored shift snapshot"
        );
        Ok(merged)
    }

    pub async fn get(&self, id: ShiftId) -> Result<ShiftRecord, ServerError> {
        self.table
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ServerError::ShiftNotFound(id))
    }

    pub async fn find_by_code(&self, code: &str) -> Result<ShiftRecord, ServerError> {
        self.table
            .read()
            .await
            .find_by_code(code)
            .cloned()
            .ok_or_else(|| ServerError::CodeNotFound(code.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    fn shift_path(&self, id: ShiftId) -> Result<PathBuf, ServerError> {
        let raw = self.data_dir.join(format!("{id}.json"));
        ensure_within(&self.data_dir, &raw)
    }
}

async fn load_archive(dir: &Path) -> Result<ShiftTable, ServerError> {
    let mut table = ShiftTable::new();
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| ServerError::Storage(format!("Failed to list shifts: {}", e)))?;

    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        ServerError::Storage(format!("Failed to read directory entry: {}", e))
    })? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let record = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<ShiftRecord>(&bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable shift file, skipping");
                continue;
            }
        };
        match record {
            Ok(record) => {
                table.upsert(record);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Corrupt shift file, skipping"),
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use valet_shared::protocol::now;
    use valet_shared::{NewCar, Shift, ShiftCode};

    async fn test_repo() -> (ShiftRepository, TempDir) {
        let dir = TempDir::new().unwrap();
        let repo = open(&dir).await;
        (repo, dir)
    }

    async fn open(dir: &TempDir) -> ShiftRepository {
        let path = dir.path().to_path_buf();
        ShiftRepository::open(path).await.unwrap()
    }

    fn shift() -> Shift {
        let code = ShiftCode::parse("AB23XZ").unwrap();
        Shift::start("Smith", "123 Main St", code, now()).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let (repo, _dir) = test_repo().await;
        let shift = shift();

        repo.upsert(ShiftRecord::from(&shift)).await.unwrap();
        assert_eq!(repo.get(shift.id).await.unwrap().id, shift.id);
        assert_eq!(repo.find_by_code("ab23xz").await.unwrap().id, shift.id);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_not_found() {
        let (repo, _dir) = test_repo().await;
        assert!(matches!(
            repo.get(ShiftId::new()).await,
            Err(ServerError::ShiftNotFound(_))
        ));
        assert!(matches!(
            repo.find_by_code("QQQQQQ").await,
            Err(ServerError::CodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_archive_is_reloaded() {
        let dir = TempDir::new().unwrap();
        let mut shift = shift();
        {
            let repo = open(&dir).await;
            repo.upsert(ShiftRecord::from(&shift)).await.unwrap();
            let car = NewCar::new("ABC123", "Toyota", "Corolla", "Silver", "Row 3");
            shift.check_in(car, now()).unwrap();
            repo.upsert(ShiftRecord::from(&shift)).await.unwrap();
        }

        // junk next to the archive is ignored
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("broken.json"), b"{").unwrap();

        let repo = open(&dir).await;
        assert_eq!(repo.len().await, 1);
        assert_eq!(repo.get(shift.id).await.unwrap().cars.len(), 1);
    }

    #[test]
    fn test_path_traversal_rejected() {
        let base = Path::new("/srv/shifts");
        assert!(ensure_within(base, &base.join("../etc/passwd")).is_err());
        assert_eq!(
            ensure_within(base, &base.join("a.json")).unwrap(),
            base.join("a.json")
        );
    }
}
