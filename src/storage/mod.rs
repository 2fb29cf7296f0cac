pub mod blob;
pub mod record_store;

pub use blob::{BlobStore, FsBlobStore};
pub use record_store::FileRecordStore;

use crate::common::{FaceLinkError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Always equal to the `FaceId` of the customer's template in the index.
pub type CustomerId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: CustomerId,
    pub name: String,
    /// Blob key of the enrollment image (a placeholder for recovered records).
    #[serde(rename = "s3_key")]
    pub image_key: String,
    pub member_id: Option<String>,
    pub registration_date: DateTime<Utc>,
}

impl CustomerRecord {
    pub fn new(
        customer_id: impl Into<CustomerId>,
        name: impl Into<String>,
        image_key: impl Into<String>,
        member_id: Option<String>,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            name: name.into(),
            image_key: image_key.into(),
            member_id,
            registration_date: Utc::now(),
        }
    }

    pub fn enrollment_image_key(face_id: &str) -> String {
        format!("faces/{}.jpg", face_id)
    }

    /// Stand-in key for records rebuilt after the original image was lost.
    pub fn recovered_image_key(face_id: &str) -> String {
        format!("recovered_faces/{}.jpg", face_id)
    }
}

/// Keyed customer record store. Every method fails with `StoreUnavailable`
/// when the store cannot be reached.
pub trait RecordStore {
    fn get(&self, customer_id: &str) -> Result<Option<CustomerRecord>>;

    /// Upsert: replaces any record with the same `customer_id`.
    fn put(&self, record: &CustomerRecord) -> Result<()>;

    fn exists(&self, customer_id: &str) -> Result<bool> {
        Ok(self.get(customer_id)?.is_some())
    }

    /// Every stored customer id, sorted.
    fn keys(&self) -> Result<Vec<CustomerId>>;
}

/// Keys double as file names: ASCII alphanumerics, `-` and `_` only.
pub fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(FaceLinkError::InvalidKey(key.to_string()))
    }
}

/// Write-then-rename so readers only ever see a complete file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    {
        let mut file = fs::File::create(tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)
}
