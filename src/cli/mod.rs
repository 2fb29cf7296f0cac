pub mod commands;
pub mod visualization;

pub use commands::FrameInput;
pub use visualization::{annotate_face, save_capture};
