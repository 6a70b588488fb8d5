// Per-image side files for polygon projects: JSON region lists and PNG masks

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{LabellerError, Result};
use crate::state::{AnnotationRecord, Region};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RegionEntry {
    /// Class id, or an empty string when no class applies
    pub class: serde_json::Value,
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RegionFile {
    pub file: String,
    pub regions: Vec<RegionEntry>,
}

pub fn region_file_path(folder: &Path, index: usize) -> PathBuf {
    folder.join(format!("region_{index}.json"))
}

pub fn mask_file_path(folder: &Path, index: usize) -> PathBuf {
    folder.join(format!("mask_{index}.png"))
}

impl RegionFile {
    pub fn from_record(basename: &str, record: &AnnotationRecord) -> Self {
        let regions = record
            .regions()
            .map(|(region, class)| RegionEntry {
                class: class
                    .map(serde_json::Value::from)
                    .unwrap_or_else(|| serde_json::Value::from("")),
                points: region.outline(),
            })
            .collect();
        Self {
            file: basename.to_string(),
            regions,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| LabellerError::io(path, e))?;
        debug!("Wrote regions to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| LabellerError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Merge all mask regions of a record into one 8-bit image, interior = 255.
/// Returns `Ok(false)` when the record holds no mask to write.
pub fn save_mask(path: &Path, record: &AnnotationRecord) -> Result<bool> {
    let mut canvas: Option<image::GrayImage> = None;

    for (region, _) in record.regions() {
        let Region::Mask {
            width,
            height,
            pixels,
        } = region
        else {
            warn!("Ignoring non-mask region while writing {}", path.display());
            continue;
        };
        let img = canvas.get_or_insert_with(|| image::GrayImage::new(*width, *height));
        for &(x, y) in pixels {
            if x < img.width() && y < img.height() {
                img.put_pixel(x, y, image::Luma([255]));
            }
        }
    }

    match canvas {
        Some(img) => {
            img.save(path)?;
            debug!("Wrote mask to {}", path.display());
            Ok(true)
        }
        None => Ok(false),
    }
}
