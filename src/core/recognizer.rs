use crate::common::{Config, FaceLinkError, Result};
use crate::core::detector::{optimization_level, FaceBox};
use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array4, CowArray};
use ort::{Environment, Session, SessionBuilder, Value};
use std::path::Path;
use std::sync::Arc;

pub type Embedding = Vec<f32>;

pub struct FaceRecognizer {
    session: Session,
    _environment: Arc<Environment>,
    config: Config,
}

impl FaceRecognizer {
    pub fn new(config: &Config, models_base: &Path) -> Result<Self> {
        let mut model_path = config.models.recognizer_path.clone();
        if model_path.is_relative() {
            model_path = models_base.join(&model_path);
        }

        let environment = Arc::new(
            Environment::builder()
                .with_name("face_recognizer")
                .build()
                .map_err(|e| FaceLinkError::Model(format!("Failed to create environment: {}", e)))?,
        );

        if !model_path.exists() {
            return Err(FaceLinkError::Model(format!(
                "Recognition model not found at: {:?}",
                model_path
            )));
        }

        let session = SessionBuilder::new(&environment)?
            .with_optimization_level(optimization_level(config.performance.optimization_level))?
            .with_model_from_file(model_path)?;

        Ok(Self {
            session,
            _environment: environment,
            config: config.clone(),
        })
    }

    pub fn get_embedding(&self, image: &DynamicImage, face: &FaceBox) -> Result<Embedding> {
        let face_img = crop_face(image, face);

        let size = self.config.recognizer.input_size;
        let resized = face_img.resize_exact(size, size, FilterType::Triangle);

        let input_array = self.preprocess_face(&resized);
        let cow_array = CowArray::from(input_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        let first = outputs
            .first()
            .ok_or_else(|| FaceLinkError::Model("Recognizer produced no output".into()))?;

        let embedding: Embedding = first.try_extract::<f32>()?.view().iter().copied().collect();
        Ok(embedding)
    }

    fn preprocess_face(&self, img: &DynamicImage) -> Array4<f32> {
        let gray = img.to_luma8();
        let size = self.config.recognizer.input_size as usize;
        let norm_val = self.config.recognizer.normalization_value;
        let mut array = Array4::<f32>::zeros((1, 1, size, size));

        for (x, y, pixel) in gray.enumerate_pixels() {
            // ArcFace normalization
            array[[0, 0, y as usize, x as usize]] = (pixel[0] as f32 - norm_val) / norm_val;
        }

        array
    }
}

fn crop_face(image: &DynamicImage, face: &FaceBox) -> DynamicImage {
    let x = face.x1.max(0.0) as u32;
    let y = face.y1.max(0.0) as u32;
    let width = face.width().max(1.0) as u32;
    let height = face.height().max(1.0) as u32;

    image.crop_imm(x, y, width, height)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Cosine similarity on the 0-100 scale used for match thresholds.
/// Anti-correlated embeddings score 0.
pub fn similarity_percent(a: &[f32], b: &[f32]) -> f32 {
    (cosine_similarity(a, b).clamp(0.0, 1.0)) * 100.0
}
