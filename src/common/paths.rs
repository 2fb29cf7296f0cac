use std::path::PathBuf;

// Paths used outside dev mode. Data normally lives in the platform data dir
// (see `DevMode::data_root`); these are the fixed system locations.

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/facelink/facelink.toml")
}

/// Base that relative `[models]` paths are resolved against.
pub fn system_share_dir() -> PathBuf {
    PathBuf::from("/usr/share/facelink")
}
