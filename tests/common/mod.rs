#![allow(dead_code)]

use facelink::core::FaceBox;
use facelink::index::{FaceEmbedder, FaceSample};
use facelink::Result;
use image::{DynamicImage, Rgb, RgbImage};

/// Embeds an image as its mean colour. Black images have no face.
pub struct ColourEmbedder;

impl FaceEmbedder for ColourEmbedder {
    fn embed(&self, image: &DynamicImage) -> Result<Option<FaceSample>> {
        let rgb = image.to_rgb8();
        let pixels = (rgb.width() * rgb.height()).max(1) as f32;
        let mut sum = [0f32; 3];
        for pixel in rgb.pixels() {
            for (acc, channel) in sum.iter_mut().zip(pixel.0) {
                *acc += channel as f32;
            }
        }
        let mean: Vec<f32> = sum.iter().map(|s| s / pixels).collect();
        if mean.iter().all(|c| *c < 8.0) {
            return Ok(None);
        }

        Ok(Some(FaceSample {
            embedding: mean,
            face: FaceBox::new(0.0, 0.0, rgb.width() as f32, rgb.height() as f32, 0.99),
        }))
    }
}

pub fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([r, g, b])))
}
