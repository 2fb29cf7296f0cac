use crate::common::{Config, FaceLinkError, Result};
use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array4, CowArray};
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Axis-aligned face region in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self { x1, y1, x2, y2, confidence }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Anything that can find face regions in a frame.
pub trait FaceLocator {
    fn locate(&self, image: &DynamicImage) -> Result<Vec<FaceBox>>;
}

pub struct FaceDetector {
    session: Session,
    _environment: Arc<Environment>,
    config: Config,
}

impl FaceDetector {
    pub fn new(config: &Config, models_base: &Path) -> Result<Self> {
        let mut model_path = config.models.detector_path.clone();
        if model_path.is_relative() {
            model_path = models_base.join(&model_path);
        }

        let environment = Arc::new(
            Environment::builder()
                .with_name("face_detector")
                .build()
                .map_err(|e| FaceLinkError::Model(format!("Failed to create environment: {}", e)))?,
        );

        if !model_path.exists() {
            return Err(FaceLinkError::Model(format!(
                "Detector model not found at: {:?}",
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

    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let orig_width = image.width() as f32;
        let orig_height = image.height() as f32;
        let input_width = self.config.detector.input_width;
        let input_height = self.config.detector.input_height;

        let img_array = if image.width() == input_width && image.height() == input_height {
            image_to_array(image)
        } else {
            let resized = image.resize_exact(input_width, input_height, FilterType::Nearest);
            image_to_array(&resized)
        };

        let cow_array = CowArray::from(img_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let mut faces = self.parse_detections(&outputs)?;

        let scale_x = orig_width / input_width as f32;
        let scale_y = orig_height / input_height as f32;
        for face in &mut faces {
            face.x1 *= scale_x;
            face.x2 *= scale_x;
            face.y1 *= scale_y;
            face.y2 *= scale_y;
        }

        Ok(faces)
    }

    fn parse_detections(&self, outputs: &[Value]) -> Result<Vec<FaceBox>> {
        let mut faces = Vec::new();
        let Some(first) = outputs.first() else {
            return Ok(faces);
        };

        // YOLOv8 output: [1, N, 5] or transposed [1, 5, N]
        let output = first.try_extract::<f32>()?.view().to_owned();
        let shape = output.shape().to_vec();
        let values: Vec<f32> = output.iter().copied().collect();

        let (num_predictions, prediction_length, is_transposed) = match shape.len() {
            3 if shape[2] > shape[1] && shape[1] <= 10 => (shape[2], shape[1], true),
            3 => (shape[1], shape[2], false),
            2 => (shape[0], shape[1], false),
            _ => {
                tracing::warn!("Unexpected detector output shape: {:?}", shape);
                return Ok(faces);
            }
        };
        if prediction_length < 4 {
            return Ok(faces);
        }

        let input_width = self.config.detector.input_width as f32;
        let input_height = self.config.detector.input_height as f32;

        for i in 0..num_predictions {
            let at = |field: usize| -> f32 {
                if is_transposed {
                    values[field * num_predictions + i]
                } else {
                    values[i * prediction_length + field]
                }
            };

            let confidence = if prediction_length > 4 { at(4) } else { 0.0 };
            if confidence <= 0.001 {
                continue;
            }

            let (cx, cy, w, h) = (at(0), at(1), at(2), at(3));
            // Normalized outputs are scaled up to detector input space
            let scale = if cx > 1.0 || cy > 1.0 || w > 1.0 || h > 1.0 {
                1.0
            } else {
                input_width
            };
            let (cx, cy, w, h) = (cx * scale, cy * scale, w * scale, h * scale);

            let x1 = (cx - w / 2.0).max(0.0);
            let y1 = (cy - h / 2.0).max(0.0);
            let x2 = (cx + w / 2.0).min(input_width);
            let y2 = (cy + h / 2.0).min(input_height);

            if x2 - x1 > 10.0 && y2 - y1 > 10.0 {
                faces.push(FaceBox::new(x1, y1, x2, y2, confidence));
            }
        }

        // NMS on everything first, then the real confidence cut
        let mut faces = apply_nms(faces, self.config.detector.nms_iou);
        faces.retain(|face| face.confidence >= self.config.detector.confidence_threshold);
        faces.truncate(5);

        Ok(faces)
    }
}

impl FaceLocator for FaceDetector {
    fn locate(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        self.detect(image)
    }
}

pub(crate) fn optimization_level(level: u32) -> GraphOptimizationLevel {
    match level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

fn image_to_array(img: &DynamicImage) -> Array4<f32> {
    let gray = img.to_luma8();
    let width = gray.width() as usize;
    let height = gray.height() as usize;
    let mut array = Array4::<f32>::zeros((1, 3, height, width));

    let norm_factor = 1.0 / 255.0;
    for (x, y, pixel) in gray.enumerate_pixels() {
        let value = pixel[0] as f32 * norm_factor;
        let (x, y) = (x as usize, y as usize);
        array[[0, 0, y, x]] = value;
        array[[0, 1, y, x]] = value;
        array[[0, 2, y, x]] = value;
    }

    array
}

/// Greedy non-maximum suppression, highest confidence first.
pub fn apply_nms(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if keep.iter().all(|kept| kept.iou(&candidate) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}
