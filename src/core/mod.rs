pub mod capture;
pub mod detector;
pub mod enrollment;
pub mod quality;
pub mod reconciler;
pub mod recognizer;
pub mod resolver;

pub use capture::{capture_face, capture_face_with, CaptureGate, CaptureSettings, CapturedFace, GateStep};
pub use detector::{FaceBox, FaceDetector, FaceLocator};
pub use enrollment::{EnrollOutcome, Enrollment, EnrollmentReceipt};
pub use quality::QualityMetrics;
pub use reconciler::{AuditReport, CleanupReport, IdentityAttributes, Reconciler, RepairOutcome};
pub use recognizer::{cosine_similarity, similarity_percent, Embedding, FaceRecognizer};
pub use resolver::{IdentityResolver, Resolution};
