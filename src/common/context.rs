use crate::common::{paths, Config, DevMode, Result};
use crate::core::enrollment::Enrollment;
use crate::core::reconciler::Reconciler;
use crate::core::resolver::IdentityResolver;
use crate::index::{BiometricIndex, LocalFaceIndex, OnnxEmbedder};
use crate::storage::{BlobStore, FileRecordStore, FsBlobStore, RecordStore};
use std::path::PathBuf;

/// Configuration plus the three adapters every operation works against.
///
/// Components borrow the adapters from here for the duration of a call.
/// The context assumes it is the only writer to its collection and table:
/// the stores are not locked, and an orphan cleanup running next to an
/// enrollment can delete a face whose record is about to be written.
pub struct AppContext {
    pub config: Config,
    pub dev_mode: DevMode,
    index: Box<dyn BiometricIndex>,
    store: Box<dyn RecordStore>,
    blobs: Box<dyn BlobStore>,
}

impl AppContext {
    pub fn new(
        config: Config,
        dev_mode: DevMode,
        index: Box<dyn BiometricIndex>,
        store: Box<dyn RecordStore>,
        blobs: Box<dyn BlobStore>,
    ) -> Self {
        Self {
            config,
            dev_mode,
            index,
            store,
            blobs,
        }
    }

    /// Builds the local adapters: ONNX-backed index, file record store and
    /// file blob store, all under the data root.
    pub fn open(config: Config, dev_mode: DevMode) -> Result<Self> {
        let data_root = dev_mode.data_root(config.storage.data_dir.as_ref())?;
        tracing::info!("Using data root {}", data_root.display());

        let embedder = OnnxEmbedder::new(&config, &models_base(&dev_mode))?;
        let index = LocalFaceIndex::open(&data_root, &config.index.collection_id, embedder)?;
        let store = FileRecordStore::open(&data_root, &config.store.table_name)?;
        let blobs = FsBlobStore::open(&data_root, &config.blob.bucket_name)?;

        Ok(Self::new(
            config,
            dev_mode,
            Box::new(index),
            Box::new(store),
            Box::new(blobs),
        ))
    }

    pub fn models_base(&self) -> PathBuf {
        models_base(&self.dev_mode)
    }

    pub fn index(&self) -> &dyn BiometricIndex {
        self.index.as_ref()
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn resolver(&self) -> IdentityResolver<'_> {
        IdentityResolver::new(
            self.index.as_ref(),
            self.store.as_ref(),
            self.config.index.similarity_threshold,
        )
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.index.as_ref(), self.store.as_ref())
    }

    pub fn enrollment(&self) -> Enrollment<'_> {
        Enrollment::new(
            self.index.as_ref(),
            self.store.as_ref(),
            self.blobs.as_ref(),
            self.config.index.similarity_threshold,
        )
    }
}

// Dev runs use the models checked out next to the working directory.
fn models_base(dev_mode: &DevMode) -> PathBuf {
    if dev_mode.is_enabled() {
        PathBuf::from(".")
    } else {
        paths::system_share_dir()
    }
}
