pub mod replay;
pub mod v4l2;

pub use replay::ReplayFrames;
pub use v4l2::{Camera, CameraSession};

use crate::common::Result;
use image::DynamicImage;
use std::time::Instant;

/// A single frame and the moment it was acquired.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub captured_at: Instant,
}

/// A live or replayed sequence of frames. `Ok(None)` marks end of stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
