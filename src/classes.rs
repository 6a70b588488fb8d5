use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{LabellerError, Result};
use crate::project::ProjectConfig;

/// One class as written in a label file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassDefinition {
    pub id: usize,
    pub name: String,
}

/// Accepted label file layouts
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelFile {
    Plain(Vec<String>),
    Definitions(Vec<ClassDefinition>),
    Wrapped { classes: Vec<ClassDefinition> },
}

/// A button of the class bar. The front end dispatches every button to the
/// same `classify(class_id)` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassButton {
    pub label: String,
    pub class_id: usize,
    /// Digit key that triggers the button, for the first ten classes
    pub shortcut: Option<char>,
}

pub fn class_buttons(config: &ProjectConfig) -> Vec<ClassButton> {
    config
        .class_labels
        .iter()
        .enumerate()
        .map(|(class_id, label)| ClassButton {
            label: label.clone(),
            class_id,
            shortcut: char::from_digit(class_id as u32, 10),
        })
        .collect()
}

/// Class selected by a key press: digit keys map to their value when a class
/// with that id exists.
pub fn class_for_key(key: char, class_count: usize) -> Option<usize> {
    let id = key.to_digit(10)? as usize;
    (id < class_count).then_some(id)
}

/// Read class labels from a YAML file, ordered by class id. The file may be a
/// plain list of names, a list of `{id, name}` entries, or such a list under
/// a `classes` key.
pub fn load_class_labels(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| LabellerError::io(path, e))?;
    let labels = parse_class_labels(&content)?;
    debug!("Loaded {} class labels from {}", labels.len(), path.display());
    Ok(labels)
}

fn parse_class_labels(content: &str) -> Result<Vec<String>> {
    let mut definitions = match serde_yaml::from_str::<LabelFile>(content)? {
        LabelFile::Plain(names) => return Ok(names),
        LabelFile::Definitions(defs) | LabelFile::Wrapped { classes: defs } => defs,
    };

    definitions.sort_by_key(|d| d.id);
    // ids index the result table and the class folders, so they must be 0..n
    for (expected, def) in definitions.iter().enumerate() {
        if def.id != expected {
            return Err(LabellerError::Config(format!(
                "class ids must run from 0 without gaps, found {} where {expected} was expected",
                def.id
            )));
        }
    }
    Ok(definitions.into_iter().map(|d| d.name).collect())
}
