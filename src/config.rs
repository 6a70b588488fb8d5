use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;
use crate::project::FileExtension;

/// User-level settings, independent of any single labelling project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub projects: ProjectsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectsConfig {
    #[serde(default)]
    pub recent_projects: Vec<String>,
    #[serde(default)]
    pub default_extension: FileExtension,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory holding `errors.log`; the platform data dir when unset
    pub log_dir: Option<String>,
}

const MAX_RECENT_PROJECTS: usize = 10;

impl Default for ProjectsConfig {
    fn default() -> Self {
        Self {
            recent_projects: Vec::new(),
            default_extension: FileExtension::Dcm,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { log_dir: None }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            projects: ProjectsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Resolved log directory, falling back to the platform data dir and
    /// finally the working directory.
    pub fn log_dir(&self) -> PathBuf {
        if let Some(dir) = &self.logging.log_dir {
            return PathBuf::from(shellexpand::tilde(dir).as_ref());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "mammo-labeller")
}

/// Get the path to the config file
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from the default location, or defaults if absent
pub fn load_config() -> AppConfig {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => {
            warn!("No home directory found; using default configuration");
            AppConfig::default()
        }
    }
}

/// Load configuration from `path`. Unreadable or malformed files fall back to
/// defaults.
pub fn load_config_from(path: &Path) -> AppConfig {
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to parse config file {}: {e}. Using defaults.", path.display());
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read config file {}: {e}. Using defaults.", path.display());
            AppConfig::default()
        }
    }
}

/// Save configuration to `path`, creating the parent directory if needed
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| crate::LabellerError::io(parent, e))?;
    }
    let toml = toml::to_string_pretty(config)?;
    std::fs::write(path, toml).map_err(|e| crate::LabellerError::io(path, e))?;
    Ok(())
}

/// Save configuration to the default location
pub fn save_config(config: &AppConfig) -> Result<()> {
    let path = config_path().ok_or_else(|| {
        crate::LabellerError::Config("cannot determine config directory".to_string())
    })?;
    save_config_to(config, &path)
}

/// Add a project settings path to the recent projects list
pub fn add_recent_project(config: &mut AppConfig, path: String) {
    // Remove if already in list
    config.projects.recent_projects.retain(|p| p != &path);

    config.projects.recent_projects.insert(0, path);
    config.projects.recent_projects.truncate(MAX_RECENT_PROJECTS);
}
