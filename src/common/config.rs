use crate::common::{DevMode, FaceLinkError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub membership: MembershipConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub warmup_frames: u32,
    #[serde(default = "default_warmup_delay")]
    pub warmup_delay_ms: u64,
}

fn default_warmup_delay() -> u64 {
    50
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            warmup_frames: 5,
            warmup_delay_ms: default_warmup_delay(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelConfig {
    pub detector_path: PathBuf,
    pub recognizer_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector_path: PathBuf::from("models/face_detector.onnx"),
            recognizer_path: PathBuf::from("models/face_recognizer.onnx"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectorConfig {
    pub input_width: u32,
    pub input_height: u32,
    #[serde(default = "default_detection_confidence")]
    pub confidence_threshold: f32,
    #[serde(default = "default_nms_iou")]
    pub nms_iou: f32,
}

fn default_detection_confidence() -> f32 { 0.5 }
fn default_nms_iou() -> f32 { 0.45 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_width: 640,
            input_height: 640,
            confidence_threshold: default_detection_confidence(),
            nms_iou: default_nms_iou(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognizerConfig {
    pub input_size: u32,
    pub normalization_value: f32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            input_size: 112,
            normalization_value: 127.5,
        }
    }
}

/// Capture gate tuning: size gate, dwell gate and crop.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "default_min_face_area")]
    pub min_face_area_px: u32,
    #[serde(default = "default_dwell_seconds")]
    pub dwell_seconds: f32,
    #[serde(default = "default_min_track_iou")]
    pub min_track_iou: f32,
    #[serde(default = "default_crop_margin")]
    pub crop_margin: f32,
    #[serde(default)]
    pub max_session_seconds: Option<u64>,
}

fn default_min_face_area() -> u32 { 160 * 160 }
fn default_dwell_seconds() -> f32 { 2.0 }
fn default_min_track_iou() -> f32 { 0.3 }
fn default_crop_margin() -> f32 { 0.25 }

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_face_area_px: default_min_face_area(),
            dwell_seconds: default_dwell_seconds(),
            min_track_iou: default_min_track_iou(),
            crop_margin: default_crop_margin(),
            max_session_seconds: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_collection")]
    pub collection_id: String,
    /// Percent, 0-100. Matches strictly below this are discarded.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

fn default_collection() -> String { "customers".to_string() }
fn default_similarity_threshold() -> f32 { 80.0 }

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection_id: default_collection(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_table")]
    pub table_name: String,
}

fn default_table() -> String { "Customers".to_string() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { table_name: default_table() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BlobConfig {
    #[serde(default = "default_bucket")]
    pub bucket_name: String,
}

fn default_bucket() -> String { "customer-images".to_string() }

impl Default for BlobConfig {
    fn default() -> Self {
        Self { bucket_name: default_bucket() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MembershipConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_membership_timeout")]
    pub timeout_seconds: u64,
}

fn default_membership_timeout() -> u64 { 10 }

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            email: None,
            password: None,
            timeout_seconds: default_membership_timeout(),
        }
    }
}

impl MembershipConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.email.is_some() && self.password.is_some()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Overrides the platform data directory when set.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PerformanceConfig {
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u32,
}

fn default_optimization_level() -> u32 { 3 }

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { optimization_level: default_optimization_level() }
    }
}

impl Config {
    /// Load from `path` (or the dev/system config path), then apply environment overrides.
    pub fn load(dev_mode: &DevMode, path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dev_mode.config_file());
        Self::load_with(&path, |key| std::env::var(key).ok())
    }

    fn load_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_from_path(path)?;
        config.apply_overrides_from(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Parses the file as-is; [`Config::load`] validates after the overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceLinkError::Config(format!(
                "Config file not found: {}. Please create it from configs/facelink.toml.",
                path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| FaceLinkError::Config(format!("Config parse error: {}", e)))
    }

    /// Applies `FACELINK_*` overrides read through `lookup`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bucket) = lookup("FACELINK_BUCKET") {
            self.blob.bucket_name = bucket;
        }
        if let Some(table) = lookup("FACELINK_TABLE") {
            self.store.table_name = table;
        }
        if let Some(collection) = lookup("FACELINK_COLLECTION") {
            self.index.collection_id = collection;
        }
        if let Some(raw) = lookup("FACELINK_SIMILARITY_THRESHOLD") {
            match raw.trim().parse::<f32>() {
                Ok(threshold) => self.index.similarity_threshold = threshold,
                Err(_) => tracing::warn!(
                    "Ignoring FACELINK_SIMILARITY_THRESHOLD={:?}: not a number", raw
                ),
            }
        }
        if let Some(email) = lookup("FACELINK_MEMBERSHIP_EMAIL") {
            self.membership.email = Some(email);
        }
        if let Some(password) = lookup("FACELINK_MEMBERSHIP_PASSWORD") {
            self.membership.password = Some(password);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(FaceLinkError::Config(format!(
                "Camera width must be between 1 and 4096, got {}", self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(FaceLinkError::Config(format!(
                "Camera height must be between 1 and 4096, got {}", self.camera.height
            )));
        }

        if self.detector.input_width == 0 || self.detector.input_width > 4096 {
            return Err(FaceLinkError::Config(format!(
                "Detector input width must be between 1 and 4096, got {}",
                self.detector.input_width
            )));
        }
        if self.detector.input_height == 0 || self.detector.input_height > 4096 {
            return Err(FaceLinkError::Config(format!(
                "Detector input height must be between 1 and 4096, got {}",
                self.detector.input_height
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(FaceLinkError::Config(format!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detector.confidence_threshold
            )));
        }
        if self.recognizer.input_size == 0 || self.recognizer.input_size > 1024 {
            return Err(FaceLinkError::Config(format!(
                "Recognizer input size must be between 1 and 1024, got {}",
                self.recognizer.input_size
            )));
        }

        if !(0.0..=100.0).contains(&self.index.similarity_threshold) {
            return Err(FaceLinkError::Config(format!(
                "Similarity threshold must be between 0 and 100, got {}",
                self.index.similarity_threshold
            )));
        }
        if self.capture.min_face_area_px == 0 {
            return Err(FaceLinkError::Config(
                "Minimum face area must be greater than 0".to_string(),
            ));
        }
        if !(self.capture.dwell_seconds > 0.0 && self.capture.dwell_seconds <= 30.0) {
            return Err(FaceLinkError::Config(format!(
                "Dwell time must be between 0 and 30 seconds, got {}",
                self.capture.dwell_seconds
            )));
        }
        if !(0.0..=1.0).contains(&self.capture.min_track_iou) {
            return Err(FaceLinkError::Config(format!(
                "Tracking IoU must be between 0.0 and 1.0, got {}",
                self.capture.min_track_iou
            )));
        }
        if !(0.0..=1.0).contains(&self.capture.crop_margin) {
            return Err(FaceLinkError::Config(format!(
                "Crop margin must be between 0.0 and 1.0, got {}",
                self.capture.crop_margin
            )));
        }

        for (label, value) in [
            ("index.collection_id", &self.index.collection_id),
            ("store.table_name", &self.store.table_name),
            ("blob.bucket_name", &self.blob.bucket_name),
        ] {
            if value.trim().is_empty() {
                return Err(FaceLinkError::Config(format!("{} must not be empty", label)));
            }
        }

        if self.membership.timeout_seconds < 1 || self.membership.timeout_seconds > 60 {
            return Err(FaceLinkError::Config(format!(
                "Membership timeout must be between 1 and 60 seconds, got {}",
                self.membership.timeout_seconds
            )));
        }

        Ok(())
    }
}
