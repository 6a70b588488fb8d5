//! Per-image metadata used to filter mammography studies by view and
//! projection.

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::{InMemDicomObject, OpenFileOptions};
use std::path::Path;
use tracing::warn;

use crate::error::{LabellerError, Result};
use crate::project::ProjectConfig;

/// Tags read from an image header. Absent tags stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    pub view_position: Option<String>,
    pub study_description: Option<String>,
}

/// Source of per-image metadata
pub trait MetadataReader {
    fn read(&self, path: &Path) -> Result<ImageMetadata>;
}

/// Reads header tags from DICOM files, stopping before the pixel data.
#[derive(Debug, Default, Clone, Copy)]
pub struct DicomMetadataReader;

impl MetadataReader for DicomMetadataReader {
    fn read(&self, path: &Path) -> Result<ImageMetadata> {
        let obj = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)
            .map_err(|e| LabellerError::dicom(path, e))?;

        Ok(ImageMetadata {
            view_position: string_tag(&obj, tags::VIEW_POSITION),
            study_description: string_tag(&obj, tags::STUDY_DESCRIPTION),
        })
    }
}

fn string_tag(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    let elem = obj.element(tag).ok()?;
    let value = elem.to_str().ok()?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Returns empty metadata for every file; used for raster projects where no
/// header exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetadata;

impl MetadataReader for NoMetadata {
    fn read(&self, _path: &Path) -> Result<ImageMetadata> {
        Ok(ImageMetadata::default())
    }
}

/// View / projection predicate built from the project's `eval_*` flags:
/// `(mlo ∧ eval_mlo ∨ cc ∧ eval_cc) ∧ (mammo ∧ eval_mammo ∨ tomo ∧ eval_tomo)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewFilter {
    pub eval_cc: bool,
    pub eval_mlo: bool,
    pub eval_mammo: bool,
    pub eval_tomo: bool,
}

impl ViewFilter {
    /// The filter for a project, or `None` when it would admit everything.
    /// Only DICOM projects carry the tags the filter looks at.
    pub fn from_config(config: &ProjectConfig) -> Option<Self> {
        if !config.file_extension.is_dicom() || config.filter_is_open() {
            return None;
        }
        Some(ViewFilter {
            eval_cc: config.eval_cc,
            eval_mlo: config.eval_mlo,
            eval_mammo: config.eval_mammo,
            eval_tomo: config.eval_tomo,
        })
    }

    /// Evaluate the predicate. A missing tag makes its clause pass.
    pub fn admits(&self, meta: &ImageMetadata) -> bool {
        let view_ok = match &meta.view_position {
            Some(view) => {
                let view = view.to_ascii_uppercase();
                (view.contains("MLO") && self.eval_mlo) || (view.contains("CC") && self.eval_cc)
            }
            None => true,
        };
        let projection_ok = match &meta.study_description {
            Some(description) => {
                let tomo = description.to_ascii_lowercase().contains("recon");
                (!tomo && self.eval_mammo) || (tomo && self.eval_tomo)
            }
            None => true,
        };
        view_ok && projection_ok
    }

    /// Read `path` through `reader` and evaluate. Unreadable files pass.
    pub fn admits_path(&self, reader: &dyn MetadataReader, path: &Path) -> bool {
        match reader.read(path) {
            Ok(meta) => self.admits(&meta),
            Err(e) => {
                warn!("Metadata unavailable, not filtering {}: {e}", path.display());
                true
            }
        }
    }
}
