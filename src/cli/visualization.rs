use crate::common::{DevMode, Result};
use crate::core::capture::CapturedFace;
use crate::core::detector::FaceBox;
use image::{DynamicImage, Rgb};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::PathBuf;

const TRACKED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Copy of `frame` with `face` outlined, two pixels thick.
pub fn annotate_face(frame: &DynamicImage, face: &FaceBox) -> DynamicImage {
    let mut img = frame.to_rgb8();

    let x1 = face.x1.max(0.0) as i32;
    let y1 = face.y1.max(0.0) as i32;
    let x2 = face.x2.min(img.width() as f32) as i32;
    let y2 = face.y2.min(img.height() as f32) as i32;

    let rect_width = (x2 - x1).max(1) as u32;
    let rect_height = (y2 - y1).max(1) as u32;
    draw_hollow_rect_mut(&mut img, Rect::at(x1, y1).of_size(rect_width, rect_height), TRACKED_COLOR);

    if rect_width > 2 && rect_height > 2 {
        let inner = Rect::at(x1 + 1, y1 + 1).of_size(rect_width - 2, rect_height - 2);
        draw_hollow_rect_mut(&mut img, inner, TRACKED_COLOR);
    }

    DynamicImage::ImageRgb8(img)
}

/// Saves the crop and the annotated frame under the dev data dir.
/// Returns the paths written; nothing is saved outside dev mode.
pub fn save_capture(dev_mode: &DevMode, captured: &CapturedFace) -> Result<Vec<PathBuf>> {
    if !dev_mode.is_enabled() {
        return Ok(Vec::new());
    }

    let crop_path = dev_mode.get_capture_path("face_crop");
    captured.crop.save(&crop_path)?;

    let frame_path = dev_mode.get_debug_path("accepted_frame");
    annotate_face(&captured.frame, &captured.face).save(&frame_path)?;

    tracing::debug!("Saved capture to {:?} and {:?}", crop_path, frame_path);
    Ok(vec![crop_path, frame_path])
}
