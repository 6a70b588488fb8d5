// Comma-separated result table, one row per finished image

use crate::project::{ClassificationMode, DetectionMode, ProjectConfig};
use crate::state::AnnotationRecord;

/// Column layout derived once from the project configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    detection: DetectionMode,
    classification: ClassificationMode,
    object_names: Vec<String>,
}

impl TableLayout {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            detection: config.object_detection_mode,
            classification: config.effective_classification(),
            object_names: config.object_names.clone(),
        }
    }

    /// Number of coordinate columns per object
    fn coordinate_width(&self) -> usize {
        match self.detection {
            DetectionMode::Point => 2,
            DetectionMode::BoundingBox => 4,
            DetectionMode::None | DetectionMode::Polygon | DetectionMode::PolygonMask => 0,
        }
    }

    pub fn header(&self) -> String {
        let mut cols = vec!["file".to_string()];

        if self.detection.is_enabled() {
            let generic = ["object".to_string()];
            let objects: &[String] = if self.object_names.is_empty() {
                &generic
            } else {
                &self.object_names
            };
            let suffixes: &[&str] = match self.coordinate_width() {
                2 => &["x", "y"],
                4 => &["x", "y", "w", "h"],
                _ => &[],
            };
            for object in objects {
                for suffix in suffixes {
                    cols.push(format!("{object} {suffix}"));
                }
                if self.classification == ClassificationMode::PerLocation {
                    cols.push(format!("{object} class"));
                }
            }
        }

        if self.classification == ClassificationMode::PerImage {
            cols.push("class".to_string());
        }
        cols.push("comments".to_string());
        cols.join(",")
    }

    pub fn row(&self, basename: &str, record: &AnnotationRecord) -> String {
        let mut fields = vec![file_key(basename)];
        let width = self.coordinate_width();

        if self.detection.is_enabled() {
            for (i, slot) in record.locations.iter().enumerate() {
                if width > 0 {
                    match slot {
                        Some(region) => {
                            fields.extend(region.table_values().iter().map(|v| v.to_string()))
                        }
                        None => fields.extend(std::iter::repeat_n(String::new(), width)),
                    }
                }
                if self.classification == ClassificationMode::PerLocation {
                    fields.push(class_field(record.classes.get(i).copied().flatten()));
                }
            }
        }

        if self.classification == ClassificationMode::PerImage {
            fields.push(class_field(record.classes.first().copied().flatten()));
        }

        fields.extend(record.flags.iter().map(|f| sanitize(f)));
        if let Some(comment) = record.comment.as_deref().map(str::trim) {
            if !comment.is_empty() {
                fields.push(sanitize(comment));
            }
        }
        fields.join(",")
    }
}

fn class_field(class_id: Option<usize>) -> String {
    class_id.map(|id| id.to_string()).unwrap_or_default()
}

/// Keep free text on one line and inside one field
fn sanitize(text: &str) -> String {
    text.replace([',', '\n', '\r'], " ")
}

/// The `file` field written for `basename`. Rows are looked up by this key,
/// never by the raw name.
pub fn file_key(basename: &str) -> String {
    sanitize(basename)
}

/// First field of a table line
pub fn row_key(line: &str) -> &str {
    line.split(',').next().unwrap_or("")
}
