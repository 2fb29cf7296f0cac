// Core modules
pub mod camera;
pub mod cli;
pub mod common;
pub mod core;
pub mod index;
pub mod membership;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use common::{AppContext, Config, DevMode, FaceLinkError, Result};
pub use core::{
    CaptureGate, CaptureSettings, CapturedFace, EnrollOutcome, Enrollment, FaceBox,
    IdentityAttributes, IdentityResolver, Reconciler, RepairOutcome, Resolution,
};
pub use index::{BiometricIndex, FaceId, LocalFaceIndex, MatchResult};
pub use storage::{BlobStore, CustomerRecord, FileRecordStore, FsBlobStore, RecordStore};
