use crate::common::{FaceLinkError, Result};
use crate::storage::{validate_key, write_atomic, CustomerId, CustomerRecord, RecordStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const STORAGE_VERSION: u32 = 1;
const RECORD_EXT: &str = "bincode";

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    version: u32,
    record: CustomerRecord,
}

/// One bincode file per customer under `<root>/tables/<table_name>/`.
pub struct FileRecordStore {
    table_dir: PathBuf,
}

fn unavailable(context: &str, path: &Path, e: std::io::Error) -> FaceLinkError {
    FaceLinkError::StoreUnavailable(format!("{} {}: {}", context, path.display(), e))
}

impl FileRecordStore {
    pub fn open(data_root: &Path, table_name: &str) -> Result<Self> {
        validate_key(table_name)?;
        let table_dir = data_root.join("tables").join(table_name);
        fs::create_dir_all(&table_dir).map_err(|e| unavailable("creating table", &table_dir, e))?;

        tracing::debug!("Record store table at {:?}", table_dir);
        Ok(Self { table_dir })
    }

    fn record_path(&self, customer_id: &str) -> Result<PathBuf> {
        validate_key(customer_id)?;
        Ok(self.table_dir.join(format!("{}.{}", customer_id, RECORD_EXT)))
    }
}

impl RecordStore for FileRecordStore {
    fn get(&self, customer_id: &str) -> Result<Option<CustomerRecord>> {
        let path = self.record_path(customer_id)?;
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable("reading", &path, e)),
        };

        let stored: StoredRecord = bincode::deserialize(&data)
            .map_err(|e| FaceLinkError::Storage(format!("Failed to deserialize: {}", e)))?;

        if stored.version > STORAGE_VERSION {
            return Err(FaceLinkError::Storage(format!(
                "Record {} has unsupported version {}",
                customer_id, stored.version
            )));
        }

        Ok(Some(stored.record))
    }

    fn put(&self, record: &CustomerRecord) -> Result<()> {
        let path = self.record_path(&record.customer_id)?;
        let stored = StoredRecord {
            version: STORAGE_VERSION,
            record: record.clone(),
        };
        let encoded = bincode::serialize(&stored)
            .map_err(|e| FaceLinkError::Storage(format!("Failed to serialize: {}", e)))?;

        write_atomic(&path, &encoded).map_err(|e| unavailable("writing", &path, e))?;
        tracing::debug!("Stored customer record {}", record.customer_id);
        Ok(())
    }

    fn exists(&self, customer_id: &str) -> Result<bool> {
        let path = self.record_path(customer_id)?;
        path.try_exists().map_err(|e| unavailable("checking", &path, e))
    }

    fn keys(&self) -> Result<Vec<CustomerId>> {
        let entries =
            fs::read_dir(&self.table_dir).map_err(|e| unavailable("listing", &self.table_dir, e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| unavailable("listing", &self.table_dir, e))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(stem) if validate_key(stem).is_ok() => keys.push(stem.to_string()),
                _ => tracing::warn!("Ignoring stray file in table: {:?}", path),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
