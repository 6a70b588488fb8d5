//! Project configuration and its `settings.json` representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{LabellerError, Result};

pub const SETTINGS_FILE: &str = "settings.json";

/// How often the operator assigns a class label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ClassificationMode {
    #[default]
    None,
    PerImage,
    PerLocation,
}

/// Capture geometry the renderer must produce for each object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DetectionMode {
    #[default]
    None,
    Point,
    BoundingBox,
    Polygon,
    PolygonMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileExtension {
    #[default]
    Dcm,
    Jpg,
    Png,
}

impl TryFrom<u8> for ClassificationMode {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(ClassificationMode::None),
            1 => Ok(ClassificationMode::PerImage),
            2 => Ok(ClassificationMode::PerLocation),
            other => Err(format!("unknown classification mode {other}")),
        }
    }
}

impl From<ClassificationMode> for u8 {
    fn from(mode: ClassificationMode) -> u8 {
        match mode {
            ClassificationMode::None => 0,
            ClassificationMode::PerImage => 1,
            ClassificationMode::PerLocation => 2,
        }
    }
}

impl TryFrom<u8> for DetectionMode {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(DetectionMode::None),
            1 => Ok(DetectionMode::Point),
            2 => Ok(DetectionMode::BoundingBox),
            3 => Ok(DetectionMode::Polygon),
            4 => Ok(DetectionMode::PolygonMask),
            other => Err(format!("unknown object detection mode {other}")),
        }
    }
}

impl From<DetectionMode> for u8 {
    fn from(mode: DetectionMode) -> u8 {
        match mode {
            DetectionMode::None => 0,
            DetectionMode::Point => 1,
            DetectionMode::BoundingBox => 2,
            DetectionMode::Polygon => 3,
            DetectionMode::PolygonMask => 4,
        }
    }
}

impl DetectionMode {
    pub fn is_enabled(self) -> bool {
        self != DetectionMode::None
    }

    pub fn name(self) -> &'static str {
        match self {
            DetectionMode::None => "none",
            DetectionMode::Point => "point",
            DetectionMode::BoundingBox => "bounding box",
            DetectionMode::Polygon => "polygon",
            DetectionMode::PolygonMask => "polygon mask",
        }
    }
}

impl FileExtension {
    pub fn as_str(self) -> &'static str {
        match self {
            FileExtension::Dcm => "dcm",
            FileExtension::Jpg => "jpg",
            FileExtension::Png => "png",
        }
    }

    pub fn is_dicom(self) -> bool {
        self == FileExtension::Dcm
    }

    /// Case-insensitive match against a path's extension
    pub fn matches(self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.as_str()))
    }
}

impl fmt::Display for FileExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FileExtension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "dcm" => Ok(FileExtension::Dcm),
            "jpg" | "jpeg" => Ok(FileExtension::Jpg),
            "png" => Ok(FileExtension::Png),
            other => Err(format!("unsupported file extension '{other}'")),
        }
    }
}

/// Description of a labelling project.
///
/// Field names follow the keys of `settings.json`, which older project
/// folders already contain. Fields missing from those files fall back to
/// their defaults; `project_folder` falls back to the folder holding the
/// settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub data_folder: PathBuf,
    #[serde(default)]
    pub project_folder: PathBuf,
    #[serde(default)]
    pub class_labels: Vec<String>,
    #[serde(default)]
    pub classification_mode: ClassificationMode,
    #[serde(rename = "object_detection", default)]
    pub object_detection_mode: DetectionMode,
    /// Empty means an unlimited number of objects, ended by the operator
    #[serde(default)]
    pub object_names: Vec<String>,
    #[serde(rename = "last_image", default)]
    pub img_idx: usize,
    #[serde(rename = "copy_images", default)]
    pub copy_files: bool,
    #[serde(default = "default_true")]
    pub eval_cc: bool,
    #[serde(default = "default_true")]
    pub eval_mlo: bool,
    #[serde(default = "default_true")]
    pub eval_mammo: bool,
    #[serde(default = "default_true")]
    pub eval_tomo: bool,
    #[serde(default)]
    pub file_extension: FileExtension,
    #[serde(default)]
    pub decode: bool,
    #[serde(default = "default_flag_names")]
    pub flag_names: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_flag_names() -> Vec<String> {
    ["implant", "reduction", "surgery", "other"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            author: String::new(),
            institution: String::new(),
            data_folder: PathBuf::new(),
            project_folder: PathBuf::new(),
            class_labels: Vec::new(),
            classification_mode: ClassificationMode::None,
            object_detection_mode: DetectionMode::None,
            object_names: Vec::new(),
            img_idx: 0,
            copy_files: false,
            eval_cc: true,
            eval_mlo: true,
            eval_mammo: true,
            eval_tomo: true,
            file_extension: FileExtension::Dcm,
            decode: false,
            flag_names: default_flag_names(),
        }
    }
}

impl ProjectConfig {
    /// Folder scanned for images, with a leading `~` expanded. The stored
    /// `data_folder` keeps the form it was written in.
    pub fn data_dir(&self) -> PathBuf {
        expand_path(&self.data_folder)
    }

    pub fn project_dir(&self) -> PathBuf {
        expand_path(&self.project_folder)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.project_dir().join(SETTINGS_FILE)
    }

    /// Path of the CSV result table
    pub fn results_path(&self) -> PathBuf {
        self.project_dir().join(format!("{}.csv", self.project_name))
    }

    pub fn class_folder(&self, class_id: usize) -> Option<PathBuf> {
        self.class_labels
            .get(class_id)
            .map(|label| self.project_dir().join(label))
    }

    pub fn classification_required(&self) -> bool {
        self.classification_mode != ClassificationMode::None
    }

    pub fn localization_required(&self) -> bool {
        self.object_detection_mode.is_enabled()
    }

    /// Effective classification mode: classifying per location only makes
    /// sense when locations are captured.
    pub fn effective_classification(&self) -> ClassificationMode {
        match (self.classification_mode, self.object_detection_mode) {
            (ClassificationMode::PerLocation, DetectionMode::None) => ClassificationMode::PerImage,
            (mode, _) => mode,
        }
    }

    /// Fixed number of objects per image, `None` in unlimited mode
    pub fn object_count(&self) -> Option<usize> {
        if self.object_names.is_empty() {
            None
        } else {
            Some(self.object_names.len())
        }
    }

    /// True when the view/projection filter admits everything
    pub fn filter_is_open(&self) -> bool {
        self.eval_cc && self.eval_mlo && self.eval_mammo && self.eval_tomo
    }

    /// Check the invariants a session relies on
    pub fn validate(&self) -> Result<()> {
        if self.project_folder.as_os_str().is_empty() {
            return Err(LabellerError::Config("project folder is not set".into()));
        }
        if self.project_name.trim().is_empty() {
            return Err(LabellerError::Config("project name is empty".into()));
        }
        if self.classification_required() && self.class_labels.is_empty() {
            return Err(LabellerError::Config(
                "classification is enabled but no class labels are defined".into(),
            ));
        }
        if !self.classification_required() && !self.class_labels.is_empty() {
            return Err(LabellerError::Config(
                "class labels are defined but classification is disabled".into(),
            ));
        }
        if let Some(label) = self
            .class_labels
            .iter()
            .find(|l| l.is_empty() || l.contains(['/', '\\']))
        {
            return Err(LabellerError::Config(format!(
                "class label '{label}' cannot be used as a folder name"
            )));
        }
        Ok(())
    }

    /// Write `settings.json` into the project folder
    pub fn save(&self) -> Result<()> {
        let path = self.settings_path();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| LabellerError::io(&path, e))?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Load a settings file. `path` may be the file itself or the project
    /// folder containing it.
    pub fn load(path: &Path) -> Result<Self> {
        let path = if path.is_dir() {
            path.join(SETTINGS_FILE)
        } else {
            path.to_path_buf()
        };
        let content = std::fs::read_to_string(&path).map_err(|e| LabellerError::io(&path, e))?;
        let mut config: ProjectConfig =
            serde_json::from_str(&content).map_err(|source| LabellerError::Settings {
                path: path.clone(),
                source,
            })?;

        if config.project_folder.as_os_str().is_empty() {
            if let Some(parent) = path.parent() {
                config.project_folder = parent.to_path_buf();
            }
        }
        Ok(config)
    }

    /// Create the project folder and, when copying, one folder per class
    pub fn prepare_folders(&self) -> Result<()> {
        let root = self.project_dir();
        std::fs::create_dir_all(&root).map_err(|e| LabellerError::io(&root, e))?;
        if self.copy_files {
            for label in &self.class_labels {
                let folder = root.join(label);
                std::fs::create_dir_all(&folder).map_err(|e| LabellerError::io(&folder, e))?;
            }
        }
        info!("Prepared project '{}' in {}", self.project_name, root.display());
        Ok(())
    }
}

/// Expand a leading `~` in a path
pub fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_path_buf(),
    }
}
