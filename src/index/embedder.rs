use crate::common::{Config, Result};
use crate::core::detector::{FaceBox, FaceDetector};
use crate::core::quality::largest_face;
use crate::core::recognizer::{Embedding, FaceRecognizer};
use image::DynamicImage;
use std::path::Path;

/// Embedding of the dominant face in an image, and where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSample {
    pub embedding: Embedding,
    pub face: FaceBox,
}

pub trait FaceEmbedder {
    /// `Ok(None)` when the image contains no usable face.
    fn embed(&self, image: &DynamicImage) -> Result<Option<FaceSample>>;
}

/// Detector + recognizer pair backed by ONNX models.
pub struct OnnxEmbedder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxEmbedder {
    pub fn new(config: &Config, models_base: &Path) -> Result<Self> {
        Ok(Self {
            detector: FaceDetector::new(config, models_base)?,
            recognizer: FaceRecognizer::new(config, models_base)?,
        })
    }
}

impl FaceEmbedder for OnnxEmbedder {
    fn embed(&self, image: &DynamicImage) -> Result<Option<FaceSample>> {
        let faces = self.detector.detect(image)?;
        let Some(face) = largest_face(&faces).copied() else {
            return Ok(None);
        };

        let embedding = self.recognizer.get_embedding(image, &face)?;
        Ok(Some(FaceSample { embedding, face }))
    }
}
