pub mod config;
pub mod context;
pub mod dev_mode;
pub mod error;
pub mod paths;

pub use config::Config;
pub use context::AppContext;
pub use dev_mode::DevMode;
pub use error::{FaceLinkError, Result};
pub use paths::{system_config_file, system_share_dir};
