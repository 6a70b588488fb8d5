pub mod classes;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod metadata;
pub mod mirror;
pub mod project;
pub mod render;
pub mod state;

#[cfg(feature = "gui")]
pub mod gui;

pub use error::{LabellerError, Result};
pub use export::ResultStore;
pub use project::{ClassificationMode, DetectionMode, FileExtension, ProjectConfig};
pub use render::{CaptureMode, Frame, ImageDecoder, Renderer};
pub use state::{AnnotationRecord, ExpectedAction, ImageSet, Region, SessionController};
