//! Biometric index contract: a similarity-searchable collection of face templates.

pub mod embedder;
pub mod local;

pub use embedder::{FaceEmbedder, FaceSample, OnnxEmbedder};
pub use local::LocalFaceIndex;

use crate::common::Result;
use crate::core::detector::FaceBox;
use crate::core::recognizer::Embedding;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Identifier the index assigns to a template at enrollment.
pub type FaceId = String;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Best candidate for a probe image. `similarity` is a percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub face_id: FaceId,
    pub similarity: f32,
}

/// Immutable once written; owned by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceTemplate {
    pub face_id: FaceId,
    pub embedding: Embedding,
    pub bounding_box: FaceBox,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacePage {
    pub face_ids: Vec<FaceId>,
    /// Pass back to `list_page` to continue; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Every method fails with `IndexUnavailable` when the index cannot be reached.
pub trait BiometricIndex {
    /// Best match at or above `threshold` percent. `Ok(None)` is a normal outcome.
    fn search(&self, image: &DynamicImage, threshold: f32) -> Result<Option<MatchResult>>;

    /// Adds a template for the face in `image`. Fails with `FaceLinkError::Index`
    /// when the image holds no usable face.
    fn enroll(&self, image: &DynamicImage) -> Result<FaceId>;

    fn fetch(&self, face_id: &str) -> Result<Option<FaceTemplate>>;

    fn list_page(&self, cursor: Option<&str>, limit: usize) -> Result<FacePage>;

    /// Deleting an id that is not present is not an error.
    fn delete(&self, face_id: &str) -> Result<()>;

    /// All face ids, walking every page.
    fn list_all(&self) -> Result<Vec<FaceId>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.list_page(cursor.as_deref(), DEFAULT_PAGE_SIZE)?;
            all.extend(page.face_ids);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }
    }
}
