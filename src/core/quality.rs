use crate::core::detector::FaceBox;
use image::DynamicImage;

/// Picks the face with the largest box area; equal areas go to the higher confidence.
pub fn largest_face(faces: &[FaceBox]) -> Option<&FaceBox> {
    faces.iter().max_by(|a, b| {
        a.area()
            .total_cmp(&b.area())
            .then(a.confidence.total_cmp(&b.confidence))
    })
}

/// Whether the face is close enough to the camera to be worth tracking.
pub fn meets_min_area(face: &FaceBox, min_area_px: f32) -> bool {
    face.area() >= min_area_px
}

/// Crops `face` out of `image`, padded by `margin` (fraction of the box size)
/// on every side and clamped to the frame.
pub fn crop_with_margin(image: &DynamicImage, face: &FaceBox, margin: f32) -> DynamicImage {
    let pad_x = face.width() * margin;
    let pad_y = face.height() * margin;

    let x1 = (face.x1 - pad_x).max(0.0).floor() as u32;
    let y1 = (face.y1 - pad_y).max(0.0).floor() as u32;
    let x2 = ((face.x2 + pad_x).ceil() as u32).min(image.width());
    let y2 = ((face.y2 + pad_y).ceil() as u32).min(image.height());

    let width = x2.saturating_sub(x1).max(1);
    let height = y2.saturating_sub(y1).max(1);
    image.crop_imm(x1, y1, width, height)
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualityMetrics {
    pub detection_confidence: f32,
    pub face_size_ratio: f32,
    pub brightness_score: f32,
    pub contrast_score: f32,
}

impl QualityMetrics {
    pub fn calculate(image: &DynamicImage, face: &FaceBox) -> Self {
        let image_area = (image.width() * image.height()).max(1) as f32;
        let face_size_ratio = (face.area() / image_area).min(1.0);
        let (brightness_score, contrast_score) = calculate_image_quality(image, face);

        QualityMetrics {
            detection_confidence: face.confidence,
            face_size_ratio,
            brightness_score,
            contrast_score,
        }
    }

    pub fn get_improvement_suggestions(&self) -> Vec<String> {
        let mut suggestions = Vec::new();

        if self.brightness_score < 0.5 {
            suggestions.push("Increase lighting - the image is too dark or too bright".to_string());
        }
        if self.contrast_score < 0.5 {
            suggestions.push("Improve lighting conditions for better contrast".to_string());
        }
        if self.face_size_ratio > 0.6 {
            suggestions.push("Face is too large - move back from the camera".to_string());
        }

        suggestions
    }
}

// Brightness and contrast scores for the face region
fn calculate_image_quality(image: &DynamicImage, face: &FaceBox) -> (f32, f32) {
    let gray = image.to_luma8();

    let x1 = face.x1.max(0.0) as u32;
    let y1 = face.y1.max(0.0) as u32;
    let x2 = face.x2.min(gray.width() as f32) as u32;
    let y2 = face.y2.min(gray.height() as f32) as u32;

    if x2 <= x1 || y2 <= y1 {
        return (0.5, 0.5);
    }

    let mut sum = 0u64;
    let mut sum_sq = 0u64;
    let mut count = 0u64;

    for y in y1..y2 {
        for x in x1..x2 {
            let pixel = gray.get_pixel(x, y)[0] as u64;
            sum += pixel;
            sum_sq += pixel * pixel;
            count += 1;
        }
    }

    let mean = sum as f32 / count as f32;
    let variance = ((sum_sq as f32 / count as f32) - mean * mean).max(0.0);
    let std_dev = variance.sqrt();

    // Ideal mean around 127.5 for 8-bit images
    let brightness_score = 1.0 - ((mean - 127.5).abs() / 127.5).min(1.0);
    let contrast_score = (std_dev / 64.0).min(1.0);

    (brightness_score, contrast_score)
}
