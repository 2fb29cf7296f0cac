use crate::camera::{Frame, FrameSource};
use crate::common::{Config, FaceLinkError, Result};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use std::time::{Duration, Instant};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

pub struct Camera {
    device: Device,
    config: Config,
}

/// Streaming session over an open camera; frames are timestamped on arrival.
pub struct CameraSession<'a> {
    stream: v4l::io::mmap::Stream<'a>,
    format: v4l::Format,
}

impl Camera {
    pub fn new(config: &Config) -> Result<Self> {
        Self::new_with_device(config.camera.device_index, config.clone())
    }

    pub fn new_with_device(index: u32, config: Config) -> Result<Self> {
        tracing::info!("Opening camera device {}...", index);

        let device = Device::new(index as usize)
            .map_err(|e| FaceLinkError::Camera(format!("Failed to open camera {}: {}", index, e)))?;

        let caps = device
            .query_caps()
            .map_err(|e| FaceLinkError::Camera(format!("Failed to query capabilities: {}", e)))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            tracing::warn!("Device {} may not support standard video capture", index);
        }

        let mut fmt = device
            .format()
            .map_err(|e| FaceLinkError::Camera(format!("Failed to get format: {}", e)))?;

        fmt.width = config.camera.width;
        fmt.height = config.camera.height;
        // Keep GREY for IR cameras, otherwise ask for MJPG
        if fmt.fourcc != FourCC::new(b"GREY") {
            fmt.fourcc = FourCC::new(b"MJPG");
        }

        if let Err(e) = device.set_format(&fmt) {
            tracing::warn!("Could not set exact format: {}. Using device defaults.", e);
        }

        let final_fmt = device
            .format()
            .map_err(|e| FaceLinkError::Camera(format!("Failed to get final format: {}", e)))?;
        tracing::info!(
            "Camera format: {}x{} {}",
            final_fmt.width,
            final_fmt.height,
            final_fmt.fourcc
        );
        if final_fmt.width != config.camera.width || final_fmt.height != config.camera.height {
            tracing::warn!(
                "Camera resolution {}x{} differs from requested {}x{}",
                final_fmt.width,
                final_fmt.height,
                config.camera.width,
                config.camera.height
            );
        }

        Ok(Self { device, config })
    }

    pub fn start_session(&self) -> Result<CameraSession<'_>> {
        let format = self
            .device
            .format()
            .map_err(|e| FaceLinkError::Camera(format!("Failed to get format: {}", e)))?;

        let mut stream = v4l::io::mmap::Stream::with_buffers(&self.device, Type::VideoCapture, 8)
            .map_err(|e| FaceLinkError::Camera(format!("Failed to create stream: {}", e)))?;

        tracing::debug!("Warming up camera...");
        let delay = Duration::from_millis(self.config.camera.warmup_delay_ms);
        for i in 0..self.config.camera.warmup_frames {
            stream.next().map_err(|e| {
                FaceLinkError::Camera(format!("Failed to capture warmup frame {}: {}", i, e))
            })?;
            std::thread::sleep(delay);
        }
        tracing::debug!("Camera ready");

        Ok(CameraSession { stream, format })
    }
}

impl<'a> CameraSession<'a> {
    pub fn capture_frame(&mut self) -> Result<DynamicImage> {
        let (buf, _meta) = self
            .stream
            .next()
            .map_err(|e| FaceLinkError::Camera(format!("Failed to capture: {}", e)))?;

        decode_frame(buf, &self.format)
    }
}

impl<'a> FrameSource for CameraSession<'a> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let image = self.capture_frame()?;
        Ok(Some(Frame {
            image,
            captured_at: Instant::now(),
        }))
    }
}

fn decode_frame(buf: &[u8], format: &v4l::Format) -> Result<DynamicImage> {
    if format.fourcc == FourCC::new(b"GREY") {
        grey_to_image(buf, format.width, format.height)
    } else if format.fourcc == FourCC::new(b"MJPG") {
        Ok(image::load_from_memory_with_format(buf, ImageFormat::Jpeg)?)
    } else {
        Err(FaceLinkError::Camera(format!(
            "Unsupported pixel format: {}",
            format.fourcc
        )))
    }
}

fn grey_to_image(data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    let expected = (width * height) as usize;
    let pixels = data.get(..expected).ok_or_else(|| {
        FaceLinkError::Camera(format!(
            "Short GREY frame: {} bytes for {}x{}",
            data.len(),
            width,
            height
        ))
    })?;

    let img_buffer = ImageBuffer::<Luma<u8>, _>::from_raw(width, height, pixels.to_vec())
        .ok_or_else(|| FaceLinkError::Camera("Failed to create grayscale image buffer".into()))?;

    Ok(DynamicImage::ImageLuma8(img_buffer))
}
