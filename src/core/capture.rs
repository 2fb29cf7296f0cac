//! Capture gate: turns a live frame stream into at most one face crop.
//!
//! Every frame goes through the size gate (largest detected face must cover
//! `min_face_area_px`) and the dwell gate (a qualifying face must stay in
//! view for `dwell` without interruption). A frame without a qualifying face
//! drops the gate back to `Idle` and restarts the dwell timer. Once a crop is
//! emitted the gate is `Captured` and never emits again; a new capture needs
//! a new gate.

use crate::camera::{Frame, FrameSource};
use crate::common::config::CaptureConfig;
use crate::common::Result;
use crate::core::detector::{FaceBox, FaceLocator};
use crate::core::quality::{crop_with_margin, largest_face, meets_min_area, QualityMetrics};
use image::DynamicImage;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub min_face_area_px: f32,
    pub dwell: Duration,
    pub min_track_iou: f32,
    pub crop_margin: f32,
    pub max_session: Option<Duration>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            min_face_area_px: config.min_face_area_px as f32,
            dwell: Duration::from_secs_f32(config.dwell_seconds),
            min_track_iou: config.min_track_iou,
            crop_margin: config.crop_margin,
            max_session: config.max_session_seconds.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Tracking { anchor: Instant, last_bbox: FaceBox },
    Captured,
}

/// What the gate decided about one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum GateStep {
    NoFace,
    TooSmall { area: f32 },
    Holding { face: FaceBox, held: Duration },
    Accept { face: FaceBox, held: Duration },
    /// The gate already captured; nothing more is emitted.
    Closed,
}

pub struct CaptureGate {
    settings: CaptureSettings,
    state: CaptureState,
}

impl CaptureGate {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn observe(&mut self, faces: &[FaceBox], now: Instant) -> GateStep {
        if self.state == CaptureState::Captured {
            return GateStep::Closed;
        }

        let Some(face) = largest_face(faces).copied() else {
            self.state = CaptureState::Idle;
            return GateStep::NoFace;
        };

        if !meets_min_area(&face, self.settings.min_face_area_px) {
            self.state = CaptureState::Idle;
            return GateStep::TooSmall { area: face.area() };
        }

        let anchor = match &self.state {
            CaptureState::Tracking { anchor, last_bbox }
                if last_bbox.iou(&face) >= self.settings.min_track_iou =>
            {
                *anchor
            }
            CaptureState::Tracking { .. } => {
                tracing::debug!("Tracked face lost; restarting dwell timer on new face");
                now
            }
            _ => now,
        };

        let held = now.saturating_duration_since(anchor);
        if held >= self.settings.dwell {
            self.state = CaptureState::Captured;
            GateStep::Accept { face, held }
        } else {
            self.state = CaptureState::Tracking {
                anchor,
                last_bbox: face,
            };
            GateStep::Holding { face, held }
        }
    }
}

/// The single output of a capture session.
#[derive(Debug, Clone)]
pub struct CapturedFace {
    pub crop: DynamicImage,
    pub frame: DynamicImage,
    pub face: FaceBox,
    pub held: Duration,
    pub frames_seen: u32,
    pub quality: QualityMetrics,
}

/// Runs the gate over `source` until a face is captured, the stream ends,
/// or the session times out.
pub fn capture_face(
    source: &mut dyn FrameSource,
    locator: &dyn FaceLocator,
    settings: &CaptureSettings,
) -> Result<Option<CapturedFace>> {
    capture_face_with(source, locator, settings, |_, _| {})
}

/// Like [`capture_face`], calling `on_step` with every frame and its gate decision.
pub fn capture_face_with<F>(
    source: &mut dyn FrameSource,
    locator: &dyn FaceLocator,
    settings: &CaptureSettings,
    mut on_step: F,
) -> Result<Option<CapturedFace>>
where
    F: FnMut(&Frame, &GateStep),
{
    let mut gate = CaptureGate::new(settings.clone());
    let mut session_start: Option<Instant> = None;
    let mut frames_seen = 0u32;

    while let Some(frame) = source.next_frame()? {
        frames_seen += 1;
        let started = *session_start.get_or_insert(frame.captured_at);

        if let Some(limit) = settings.max_session {
            if frame.captured_at.saturating_duration_since(started) > limit {
                tracing::info!("Capture session timed out after {} frames", frames_seen);
                return Ok(None);
            }
        }

        let faces = match locator.locate(&frame.image) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!("Detection error: {}", e);
                Vec::new()
            }
        };

        let step = gate.observe(&faces, frame.captured_at);
        on_step(&frame, &step);

        match step {
            GateStep::Accept { face, held } => {
                tracing::info!(
                    "Face captured after {:.2}s hold ({} frames)",
                    held.as_secs_f32(),
                    frames_seen
                );
                let crop = crop_with_margin(&frame.image, &face, settings.crop_margin);
                let quality = QualityMetrics::calculate(&frame.image, &face);
                return Ok(Some(CapturedFace {
                    crop,
                    frame: frame.image,
                    face,
                    held,
                    frames_seen,
                    quality,
                }));
            }
            GateStep::Holding { held, .. } => {
                tracing::debug!("Hold still: {:.2}s", held.as_secs_f32());
            }
            GateStep::TooSmall { area } => {
                tracing::debug!(
                    "Face too small ({:.0} px < {:.0} px), come closer",
                    area,
                    settings.min_face_area_px
                );
            }
            GateStep::NoFace | GateStep::Closed => {}
        }
    }

    tracing::info!("Frame stream ended before a face was captured");
    Ok(None)
}
