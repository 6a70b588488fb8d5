// Test helper functions for creating test scenarios
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mammo_labeller::metadata::{ImageMetadata, MetadataReader, NoMetadata, ViewFilter};
use mammo_labeller::{
    CaptureMode, Frame, ImageDecoder, ImageSet, LabellerError, ProjectConfig, Renderer, Result,
    SessionController,
};

/// Everything the session pushed to the display
#[derive(Debug, Default)]
pub struct RenderLog {
    pub modes: Vec<CaptureMode>,
    pub hints: Vec<String>,
    pub progress: Vec<(usize, usize)>,
    pub windows: Vec<(f64, f64)>,
    pub input_enabled: bool,
}

/// Renderer that records calls into a shared log
pub struct RecordingRenderer(pub Rc<RefCell<RenderLog>>);

impl Renderer for RecordingRenderer {
    fn set_mode(&mut self, mode: CaptureMode) {
        self.0.borrow_mut().modes.push(mode);
    }

    fn display(&mut self, _frame: &Frame, window_min: f64, window_max: f64) {
        self.0.borrow_mut().windows.push((window_min, window_max));
    }

    fn show_hint(&mut self, hint: &str) {
        self.0.borrow_mut().hints.push(hint.to_string());
    }

    fn show_progress(&mut self, position: usize, total: usize) {
        self.0.borrow_mut().progress.push((position, total));
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.0.borrow_mut().input_enabled = enabled;
    }
}

/// Decoder returning a blank 10x10 frame for any path
pub struct BlankDecoder;

impl ImageDecoder for BlankDecoder {
    fn read(&self, _path: &Path) -> Result<Frame> {
        Ok(Frame {
            width: 10,
            height: 10,
            samples: vec![0.0; 100],
            window_center: Some(500.0),
            window_width: Some(200.0),
        })
    }
}

/// Metadata reader answering from a fixed table
pub struct Tagged(pub HashMap<PathBuf, ImageMetadata>);

impl MetadataReader for Tagged {
    fn read(&self, path: &Path) -> Result<ImageMetadata> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| LabellerError::dicom(path, "not tagged"))
    }
}

/// A temporary project with `names` as (empty) image files in its data folder
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub config: ProjectConfig,
    pub paths: Vec<PathBuf>,
}

pub fn fixture(config: ProjectConfig, names: &[&str]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let project = dir.path().join("project");
    std::fs::create_dir_all(&data).unwrap();

    let paths: Vec<PathBuf> = names
        .iter()
        .map(|name| {
            let path = data.join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            path
        })
        .collect();

    let config = ProjectConfig {
        project_name: "study".into(),
        data_folder: data,
        project_folder: project,
        ..config
    };
    config.prepare_folders().unwrap();
    Fixture { dir, config, paths }
}

impl Fixture {
    /// Started session over the fixture's files, unfiltered
    pub fn session(&self) -> (SessionController, Rc<RefCell<RenderLog>>) {
        let images = ImageSet::new(self.paths.clone(), None, Box::new(NoMetadata));
        self.session_over(images)
    }

    /// Started session using the settings currently saved in the project
    pub fn reopened(&self) -> (SessionController, Rc<RefCell<RenderLog>>) {
        let config = ProjectConfig::load(self.project()).unwrap();
        let images = ImageSet::new(self.paths.clone(), None, Box::new(NoMetadata));
        start_session(config, images)
    }

    pub fn session_over(&self, images: ImageSet) -> (SessionController, Rc<RefCell<RenderLog>>) {
        start_session(self.config.clone(), images)
    }

    pub fn project(&self) -> &Path {
        &self.config.project_folder
    }

    pub fn table(&self) -> String {
        std::fs::read_to_string(self.config.results_path()).unwrap()
    }

    pub fn rows(&self) -> Vec<String> {
        self.table().lines().skip(1).map(str::to_string).collect()
    }
}

fn start_session(
    config: ProjectConfig,
    images: ImageSet,
) -> (SessionController, Rc<RefCell<RenderLog>>) {
    let log = Rc::new(RefCell::new(RenderLog::default()));
    let mut session = SessionController::new(
        config,
        images,
        Box::new(RecordingRenderer(log.clone())),
        Box::new(BlankDecoder),
    );
    session.start();
    (session, log)
}

/// Image set of `(view, study)` tagged files under a fake folder
pub fn tagged_images(views: &[(&str, &str)], filter: ViewFilter) -> ImageSet {
    let mut tags = HashMap::new();
    let mut paths = Vec::new();
    for (i, (view, study)) in views.iter().enumerate() {
        let path = PathBuf::from(format!("/scans/img{i}.dcm"));
        tags.insert(
            path.clone(),
            ImageMetadata {
                view_position: Some(view.to_string()),
                study_description: Some(study.to_string()),
            },
        );
        paths.push(path);
    }
    ImageSet::new(paths, Some(filter), Box::new(Tagged(tags)))
}

pub fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
