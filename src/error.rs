//! Error type shared by the labelling core.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabellerError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("DICOM error in {}: {message}", path.display())]
    Dicom { path: PathBuf, message: String },

    #[error("Invalid project configuration: {0}")]
    Config(String),

    #[error("No *.{extension} images found under {}", folder.display())]
    EmptyImageSet { folder: PathBuf, extension: String },

    #[cfg(feature = "gui")]
    #[error("UI error: {0}")]
    Ui(#[from] slint::PlatformError),
}

impl LabellerError {
    /// Wrap an I/O error together with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LabellerError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn dicom(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        LabellerError::Dicom {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LabellerError>;
