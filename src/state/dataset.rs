//! The ordered list of images a project walks through.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{LabellerError, Result};
use crate::metadata::{DicomMetadataReader, MetadataReader, NoMetadata, ViewFilter};
use crate::project::{FileExtension, ProjectConfig};

/// Images of a project in a fixed order, with the view filter attached.
///
/// Filtering is lazy: an image's metadata is only read when navigation
/// reaches it, and the verdict is cached.
pub struct ImageSet {
    paths: Vec<PathBuf>,
    filter: Option<ViewFilter>,
    reader: Box<dyn MetadataReader>,
    admitted: Vec<Option<bool>>,
}

impl std::fmt::Debug for ImageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSet")
            .field("len", &self.paths.len())
            .field("filter", &self.filter)
            .finish()
    }
}

/// Recursively collect `*.<extension>` files under `folder`, sorted by path
pub fn scan_folder(folder: &Path, extension: FileExtension) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {e}", folder.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && extension.matches(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    // Directory enumeration order differs between platforms
    paths.sort();
    paths
}

impl ImageSet {
    pub fn new(
        paths: Vec<PathBuf>,
        filter: Option<ViewFilter>,
        reader: Box<dyn MetadataReader>,
    ) -> Self {
        let admitted = vec![None; paths.len()];
        Self {
            paths,
            filter,
            reader,
            admitted,
        }
    }

    /// Scan the project's data folder and attach the project's filter
    pub fn open(config: &ProjectConfig) -> Result<Self> {
        let folder = config.data_dir();
        let paths = scan_folder(&folder, config.file_extension);
        if paths.is_empty() {
            return Err(LabellerError::EmptyImageSet {
                folder,
                extension: config.file_extension.to_string(),
            });
        }
        let reader: Box<dyn MetadataReader> = if config.file_extension.is_dicom() {
            Box::new(DicomMetadataReader)
        } else {
            Box::new(NoMetadata)
        };
        let filter = ViewFilter::from_config(config);
        info!(
            "Found {} *.{} images under {} (filter: {})",
            paths.len(),
            config.file_extension,
            folder.display(),
            if filter.is_some() { "on" } else { "off" }
        );
        Ok(Self::new(paths, filter, reader))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.paths.get(index).map(PathBuf::as_path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// File name of the image at `index`, the key of its result row
    pub fn basename(&self, index: usize) -> Option<String> {
        self.get(index)
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Whether the image at `index` passes the view filter
    pub fn admits(&mut self, index: usize) -> bool {
        let Some(filter) = self.filter else {
            return true;
        };
        let Some(path) = self.paths.get(index) else {
            return false;
        };
        if let Some(cached) = self.admitted[index] {
            return cached;
        }
        let verdict = filter.admits_path(self.reader.as_ref(), path);
        debug!("Filter {} {}", if verdict { "admits" } else { "skips" }, path.display());
        self.admitted[index] = Some(verdict);
        verdict
    }

    /// First admitted index at or after `from`, or `len()` if none is left
    pub fn seek_forward(&mut self, from: usize) -> usize {
        let mut index = from;
        while index < self.len() && !self.admits(index) {
            index += 1;
        }
        index.min(self.len())
    }

    /// Last admitted index at or before `from`. Stops at 0 when nothing
    /// earlier passes.
    pub fn seek_backward(&mut self, from: usize) -> usize {
        let mut index = from.min(self.len().saturating_sub(1));
        while index > 0 && !self.admits(index) {
            index -= 1;
        }
        index
    }
}
