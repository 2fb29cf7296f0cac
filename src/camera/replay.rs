use crate::camera::{Frame, FrameSource};
use crate::common::{FaceLinkError, Result};
use image::DynamicImage;
use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};

/// Replays stored images as if they came from a camera at a fixed frame interval.
///
/// Timestamps are synthetic (`start + n * interval`), so dwell timing is
/// reproducible regardless of how fast frames are consumed.
pub struct ReplayFrames {
    images: VecDeque<DynamicImage>,
    start: Instant,
    interval: Duration,
    emitted: u32,
}

impl ReplayFrames {
    pub fn from_images(images: Vec<DynamicImage>, interval: Duration) -> Self {
        Self::starting_at(images, Instant::now(), interval)
    }

    pub fn starting_at(images: Vec<DynamicImage>, start: Instant, interval: Duration) -> Self {
        Self {
            images: images.into(),
            start,
            interval,
            emitted: 0,
        }
    }

    /// Loads every `.jpg`, `.jpeg` and `.png` in `dir`, in file-name order.
    pub fn from_dir(dir: &Path, interval: Duration) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
                .unwrap_or(false);
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(FaceLinkError::Camera(format!(
                "No replay images found in {}",
                dir.display()
            )));
        }

        let images = paths
            .iter()
            .map(image::open)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::info!("Replaying {} frames from {}", images.len(), dir.display());

        Ok(Self::from_images(images, interval))
    }

    pub fn remaining(&self) -> usize {
        self.images.len()
    }
}

impl FrameSource for ReplayFrames {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(image) = self.images.pop_front() else {
            return Ok(None);
        };

        let captured_at = self.start + self.interval * self.emitted;
        self.emitted += 1;
        Ok(Some(Frame { image, captured_at }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn frames_are_spaced_by_interval_then_end() {
        let start = Instant::now();
        let images = vec![DynamicImage::ImageLuma8(GrayImage::new(2, 2)); 3];
        let mut replay = ReplayFrames::starting_at(images, start, Duration::from_millis(250));

        let times: Vec<Instant> = std::iter::from_fn(|| replay.next_frame().unwrap())
            .map(|frame| frame.captured_at)
            .collect();

        assert_eq!(
            times,
            vec![
                start,
                start + Duration::from_millis(250),
                start + Duration::from_millis(500)
            ]
        );
        assert!(replay.next_frame().unwrap().is_none());
    }

    #[test]
    fn loads_images_from_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        GrayImage::new(3, 3).save(dir.path().join("b.png")).unwrap();
        GrayImage::new(5, 5).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut replay = ReplayFrames::from_dir(dir.path(), Duration::from_millis(100)).unwrap();
        assert_eq!(replay.remaining(), 2);
        assert_eq!(replay.next_frame().unwrap().unwrap().image.width(), 5);
        assert_eq!(replay.next_frame().unwrap().unwrap().image.width(), 3);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ReplayFrames::from_dir(dir.path(), Duration::from_millis(100)).is_err());
    }
}
