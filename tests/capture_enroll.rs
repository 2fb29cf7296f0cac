//! Replayed camera frames through the capture gate into enrollment and
//! identification.

mod common;

use common::ColourEmbedder;
use facelink::camera::ReplayFrames;
use facelink::core::{
    capture_face, CaptureSettings, EnrollOutcome, Enrollment, FaceBox, FaceLocator,
    IdentityAttributes, IdentityResolver, Resolution,
};
use facelink::index::LocalFaceIndex;
use facelink::storage::{FileRecordStore, FsBlobStore};
use facelink::Result;
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;
use std::time::Duration;

const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Reports one centred 300x300 face on any frame that is not black.
struct CentreLocator;

impl FaceLocator for CentreLocator {
    fn locate(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        if image.to_rgb8().get_pixel(0, 0).0 == [0, 0, 0] {
            return Ok(Vec::new());
        }
        Ok(vec![FaceBox::new(170.0, 90.0, 470.0, 390.0, 0.95)])
    }
}

fn frame(colour: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb(colour)))
}

fn write_frames(dir: &Path, frames: &[(usize, [u8; 3])]) {
    let mut n = 0;
    for (count, colour) in frames {
        for _ in 0..*count {
            frame(*colour)
                .save(dir.join(format!("frame_{:03}.png", n)))
                .unwrap();
            n += 1;
        }
    }
}

#[test]
fn replayed_customer_is_captured_enrolled_and_identified() {
    let data = tempfile::tempdir().unwrap();
    let index = LocalFaceIndex::open(data.path(), "customers", ColourEmbedder).unwrap();
    let store = FileRecordStore::open(data.path(), "Customers").unwrap();
    let blobs = FsBlobStore::open(data.path(), "customer-images").unwrap();
    let settings = CaptureSettings::default();

    let visit = tempfile::tempdir().unwrap();
    write_frames(visit.path(), &[(3, [0, 0, 0]), (25, [180, 60, 40])]);

    let mut frames = ReplayFrames::from_dir(visit.path(), FRAME_INTERVAL).unwrap();
    let captured = capture_face(&mut frames, &CentreLocator, &settings)
        .unwrap()
        .expect("face should pass both gates");

    assert_eq!(captured.frames_seen, 24);
    assert_eq!(captured.held, Duration::from_secs(2));
    assert_eq!((captured.crop.width(), captured.crop.height()), (450, 450));
    assert_eq!(frames.remaining(), 4);

    let enrollment = Enrollment::new(&index, &store, &blobs, 80.0);
    let outcome = enrollment
        .enroll(&captured.crop, &IdentityAttributes::new("Rosa", Some("m-3".into())))
        .unwrap();
    assert!(matches!(outcome, EnrollOutcome::Enrolled(_)));

    // Second visit: the customer steps away once before holding still.
    let revisit = tempfile::tempdir().unwrap();
    write_frames(
        revisit.path(),
        &[(10, [180, 60, 40]), (1, [0, 0, 0]), (21, [180, 60, 40])],
    );
    let mut frames = ReplayFrames::from_dir(revisit.path(), FRAME_INTERVAL).unwrap();
    let captured = capture_face(&mut frames, &CentreLocator, &settings)
        .unwrap()
        .expect("dwell restarts after the gap");
    assert_eq!(captured.frames_seen, 32);

    let resolver = IdentityResolver::new(&index, &store, 80.0);
    match resolver.resolve(&captured.crop).unwrap() {
        Resolution::Identified { record, .. } => {
            assert_eq!(record.name, "Rosa");
            assert_eq!(record.member_id.as_deref(), Some("m-3"));
        }
        other => panic!("expected identification, got {:?}", other),
    }
}

#[test]
fn customer_who_leaves_early_is_not_captured() {
    let visit = tempfile::tempdir().unwrap();
    write_frames(visit.path(), &[(15, [180, 60, 40]), (5, [0, 0, 0])]);

    let mut frames = ReplayFrames::from_dir(visit.path(), FRAME_INTERVAL).unwrap();
    let captured = capture_face(&mut frames, &CentreLocator, &CaptureSettings::default()).unwrap();
    assert!(captured.is_none());
}
