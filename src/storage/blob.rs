use crate::common::{FaceLinkError, Result};
use crate::storage::write_atomic;
use std::path::{Component, Path, PathBuf};

/// Opaque object storage used for enrollment source images.
pub trait BlobStore {
    fn put_object(&self, bytes: &[u8], key: &str) -> Result<()>;
}

/// Objects as files under `<root>/buckets/<bucket_name>/<key>`.
pub struct FsBlobStore {
    bucket_dir: PathBuf,
}

impl FsBlobStore {
    pub fn open(data_root: &Path, bucket_name: &str) -> Result<Self> {
        let mut components = Path::new(bucket_name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(FaceLinkError::InvalidKey(bucket_name.to_string()));
        }

        let bucket_dir = data_root.join("buckets").join(bucket_name);
        std::fs::create_dir_all(&bucket_dir)?;
        Ok(Self { bucket_dir })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !plain {
            return Err(FaceLinkError::InvalidKey(key.to_string()));
        }
        Ok(self.bucket_dir.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    fn put_object(&self, bytes: &[u8], key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        write_atomic(&path, bytes)
            .map_err(|e| FaceLinkError::Blob(format!("Failed to write {}: {}", path.display(), e)))?;

        tracing::info!("Uploaded {} bytes as {}", bytes.len(), key);
        Ok(())
    }
}
