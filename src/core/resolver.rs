use crate::common::Result;
use crate::index::{BiometricIndex, FaceId};
use crate::storage::{CustomerRecord, RecordStore};
use image::DynamicImage;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Identified {
        record: CustomerRecord,
        similarity: f32,
    },
    NoMatch,
    /// The index knows this face but the store has no record for it.
    OrphanedMatch {
        face_id: FaceId,
        similarity: f32,
    },
}

/// Maps a captured face to a customer record through the index.
///
/// Only the top-ranked candidate is considered, and only when it reaches
/// `threshold` percent. Transport failures propagate as `*Unavailable`
/// errors; they are never turned into `NoMatch`.
pub struct IdentityResolver<'a> {
    index: &'a dyn BiometricIndex,
    store: &'a dyn RecordStore,
    threshold: f32,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(index: &'a dyn BiometricIndex, store: &'a dyn RecordStore, threshold: f32) -> Self {
        Self { index, store, threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn resolve(&self, image: &DynamicImage) -> Result<Resolution> {
        let Some(candidate) = self.index.search(image, self.threshold)? else {
            tracing::info!("No face in the index matched");
            return Ok(Resolution::NoMatch);
        };

        // The adapter applies the threshold too; the policy lives here.
        if candidate.similarity < self.threshold {
            tracing::debug!(
                "Discarding candidate {} at {:.2}% (threshold {:.2}%)",
                candidate.face_id,
                candidate.similarity,
                self.threshold
            );
            return Ok(Resolution::NoMatch);
        }

        tracing::info!(
            "Face matched {} with {:.2}% similarity",
            candidate.face_id,
            candidate.similarity
        );

        match self.store.get(&candidate.face_id)? {
            Some(record) => Ok(Resolution::Identified {
                record,
                similarity: candidate.similarity,
            }),
            None => {
                tracing::warn!("Face {} has no customer record", candidate.face_id);
                Ok(Resolution::OrphanedMatch {
                    face_id: candidate.face_id,
                    similarity: candidate.similarity,
                })
            }
        }
    }
}
