use crate::common::paths;
use crate::common::{FaceLinkError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        let base_dir = if enabled {
            PathBuf::from("./dev_data")
        } else {
            PathBuf::new()
        };

        if enabled {
            fs::create_dir_all(&base_dir)?;
            fs::create_dir_all(base_dir.join("captures"))?;
            fs::create_dir_all(base_dir.join("debug"))?;

            tracing::info!(
                "Development mode enabled - data will be saved to: {}",
                base_dir.display()
            );
        }

        Ok(Self { enabled, base_dir })
    }

    /// Dev mode rooted somewhere other than `./dev_data`.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { enabled: true, base_dir }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn config_file(&self) -> PathBuf {
        if self.enabled {
            PathBuf::from("./configs/facelink.toml")
        } else {
            paths::system_config_file()
        }
    }

    /// Root under which collections, tables and buckets are kept.
    pub fn data_root(&self, configured: Option<&PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = configured {
            return Ok(dir.clone());
        }
        if self.enabled {
            return Ok(self.base_dir.clone());
        }

        let dirs = ProjectDirs::from("com", "facelink", "FaceLink")
            .ok_or_else(|| FaceLinkError::Storage("Failed to get project dirs".into()))?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn get_capture_path(&self, prefix: &str) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        if self.enabled {
            self.base_dir
                .join("captures")
                .join(format!("{}_{}.jpg", prefix, timestamp))
        } else {
            PathBuf::from(format!("{}_{}.jpg", prefix, timestamp))
        }
    }

    pub fn get_debug_path(&self, prefix: &str) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        if self.enabled {
            self.base_dir
                .join("debug")
                .join(format!("{}_{}.jpg", prefix, timestamp))
        } else {
            PathBuf::from(format!("{}_debug.jpg", prefix))
        }
    }
}
