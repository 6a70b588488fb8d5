// Result persistence: the CSV table plus per-image side files

pub mod regions;
pub mod table;

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{LabellerError, Result};
use crate::project::{DetectionMode, ProjectConfig};
use crate::state::AnnotationRecord;

pub use regions::{mask_file_path, region_file_path, RegionEntry, RegionFile};
pub use table::TableLayout;

/// Which side file, if any, accompanies a result row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideFile {
    None,
    RegionJson,
    MaskPng,
}

impl SideFile {
    pub fn for_mode(mode: DetectionMode) -> Self {
        match mode {
            DetectionMode::Polygon => SideFile::RegionJson,
            DetectionMode::PolygonMask => SideFile::MaskPng,
            _ => SideFile::None,
        }
    }
}

/// Append-only result table of a project. Every call opens, writes and
/// closes the file, so nothing is lost if the process dies between images.
#[derive(Debug, Clone)]
pub struct ResultStore {
    table_path: PathBuf,
    folder: PathBuf,
    layout: TableLayout,
    side_file: SideFile,
}

impl ResultStore {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            table_path: config.results_path(),
            folder: config.project_dir(),
            layout: TableLayout::from_config(config),
            side_file: SideFile::for_mode(config.object_detection_mode),
        }
    }

    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    /// Write the header unless the table already exists
    pub fn ensure_header(&self) -> Result<()> {
        if self.table_path.exists() {
            return Ok(());
        }
        fs::write(&self.table_path, format!("{}\n", self.layout.header()))
            .map_err(|e| LabellerError::io(&self.table_path, e))?;
        info!("Created result table {}", self.table_path.display());
        Ok(())
    }

    /// Write the row for one finished image, and its side file. A row already
    /// present for the same file is replaced, so an image redone after a
    /// jump or a resume keeps a single row.
    pub fn append(&self, record: &AnnotationRecord, basename: &str, index: usize) -> Result<()> {
        self.ensure_header()?;
        if self.remove_row(basename)? > 0 {
            debug!("Replacing earlier row for {basename}");
        }
        let row = self.layout.row(basename, record);
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.table_path)
            .map_err(|e| LabellerError::io(&self.table_path, e))?;
        writeln!(file, "{row}").map_err(|e| LabellerError::io(&self.table_path, e))?;
        debug!("Appended row: {row}");

        match self.side_file {
            SideFile::None => {}
            SideFile::RegionJson => {
                RegionFile::from_record(basename, record)
                    .save(&region_file_path(&self.folder, index))?;
            }
            SideFile::MaskPng => {
                regions::save_mask(&mask_file_path(&self.folder, index), record)?;
            }
        }
        Ok(())
    }

    /// Rewrite the table without the rows keyed by `basename`. Returns the
    /// number of rows removed.
    pub fn remove_row(&self, basename: &str) -> Result<usize> {
        let content = match fs::read_to_string(&self.table_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(LabellerError::io(&self.table_path, e)),
        };

        let key = table::file_key(basename);
        let mut kept = String::with_capacity(content.len());
        let mut removed = 0;
        for (i, line) in content.lines().enumerate() {
            if i > 0 && table::row_key(line) == key {
                removed += 1;
                continue;
            }
            kept.push_str(line);
            kept.push('\n');
        }

        if removed > 0 {
            fs::write(&self.table_path, kept).map_err(|e| LabellerError::io(&self.table_path, e))?;
            debug!("Removed {removed} row(s) for {basename}");
        }
        Ok(removed)
    }

    /// Delete the side file written for image `index`, if any
    pub fn remove_side_file(&self, index: usize) -> Result<()> {
        let path = match self.side_file {
            SideFile::None => return Ok(()),
            SideFile::RegionJson => region_file_path(&self.folder, index),
            SideFile::MaskPng => mask_file_path(&self.folder, index),
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LabellerError::io(&path, e)),
        }
    }

    /// Keys of the rows in the table, as produced by [`table::file_key`]
    pub fn completed(&self) -> Result<BTreeSet<String>> {
        let content = match fs::read_to_string(&self.table_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(LabellerError::io(&self.table_path, e)),
        };
        Ok(content
            .lines()
            .skip(1)
            .map(table::row_key)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Data rows currently in the table, header excluded
    pub fn rows(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.table_path) {
            Ok(content) => Ok(content.lines().skip(1).map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(LabellerError::io(&self.table_path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ClassificationMode;
    use crate::state::Region;

    fn store(dir: &Path, detection: DetectionMode) -> ResultStore {
        let config = ProjectConfig {
            project_name: "study".into(),
            project_folder: dir.to_path_buf(),
            classification_mode: ClassificationMode::PerImage,
            class_labels: vec!["A".into(), "B".into()],
            object_detection_mode: detection,
            object_names: vec!["mass".into()],
            ..ProjectConfig::default()
        };
        ResultStore::new(&config)
    }

    fn classified(class_id: usize) -> AnnotationRecord {
        let mut rec = AnnotationRecord::new();
        rec.push_class(Some(class_id));
        rec.classified = true;
        rec
    }

    #[test]
    fn header_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), DetectionMode::None);
        s.ensure_header().unwrap();
        s.append(&classified(1), "a.dcm", 0).unwrap();
        s.ensure_header().unwrap();

        let text = fs::read_to_string(s.table_path()).unwrap();
        assert_eq!(text, "file,class,comments\na.dcm,1\n");
    }

    #[test]
    fn remove_row_keeps_header_and_other_rows() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), DetectionMode::None);
        s.append(&classified(0), "a.dcm", 0).unwrap();
        s.append(&classified(1), "b.dcm", 1).unwrap();
        s.append(&classified(0), "ab.dcm", 2).unwrap();

        assert_eq!(s.remove_row("a.dcm").unwrap(), 1);
        assert_eq!(s.rows().unwrap(), vec!["b.dcm,1", "ab.dcm,0"]);
        assert_eq!(s.remove_row("missing.dcm").unwrap(), 0);
        assert_eq!(
            s.completed().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["ab.dcm", "b.dcm"]
        );
    }

    #[test]
    fn append_replaces_the_row_of_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), DetectionMode::None);
        s.append(&classified(0), "a.dcm", 0).unwrap();
        s.append(&classified(1), "b.dcm", 1).unwrap();
        s.append(&classified(1), "a.dcm", 0).unwrap();
        assert_eq!(s.rows().unwrap(), vec!["b.dcm,1", "a.dcm,1"]);
    }

    #[test]
    fn names_with_commas_are_found_again() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), DetectionMode::None);
        s.append(&classified(0), "left,cc.dcm", 0).unwrap();
        s.append(&classified(1), "left cc.dcm.bak", 1).unwrap();

        assert_eq!(s.remove_row("left,cc.dcm").unwrap(), 1);
        assert_eq!(s.rows().unwrap(), vec!["left cc.dcm.bak,1"]);
    }

    #[test]
    fn remove_row_without_table_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), DetectionMode::None);
        assert_eq!(s.remove_row("a.dcm").unwrap(), 0);
        assert!(s.completed().unwrap().is_empty());
    }

    #[test]
    fn polygon_rows_write_region_json() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), DetectionMode::Polygon);
        let mut rec = AnnotationRecord::new();
        rec.push_location(
            Some(Region::Polygon {
                vertices: vec![[0.1, 0.1], [0.5, 0.1], [0.3, 0.4]],
            }),
            Some(1),
        );
        rec.push_class(Some(0));
        s.append(&rec, "p.dcm", 4).unwrap();

        let regions = RegionFile::load(&region_file_path(dir.path(), 4)).unwrap();
        assert_eq!(regions.file, "p.dcm");
        assert_eq!(regions.regions.len(), 1);
        assert_eq!(regions.regions[0].points.len(), 3);

        s.remove_side_file(4).unwrap();
        assert!(!region_file_path(dir.path(), 4).exists());
        // removing twice is fine
        s.remove_side_file(4).unwrap();
    }

    #[test]
    fn mask_rows_write_png() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), DetectionMode::PolygonMask);
        let square = [[0.25, 0.25], [0.75, 0.25], [0.75, 0.75], [0.25, 0.75]];
        let mut rec = AnnotationRecord::new();
        rec.push_location(Some(Region::mask_from_polygon(&square, 4, 4)), Some(1));
        rec.push_class(Some(1));
        s.append(&rec, "m.dcm", 0).unwrap();

        let mask = image::open(mask_file_path(dir.path(), 0)).unwrap().to_luma8();
        assert_eq!(mask.dimensions(), (4, 4));
        assert_eq!(mask.get_pixel(1, 1).0, [255]);
        assert_eq!(mask.get_pixel(0, 0).0, [0]);
    }
}
