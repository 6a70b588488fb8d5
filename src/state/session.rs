//! The labelling state machine.
//!
//! One `SessionController` owns the image set, the record of the image on
//! screen and the result store. The front end translates input events into
//! calls on it and never mutates state itself. Every action method handles
//! its own failures: errors are logged, stray actions are ignored, and the
//! controller is always left in a state it can continue from.

use std::path::PathBuf;
use tracing::{debug, error, info, trace, warn};

use crate::error::Result;
use crate::export::ResultStore;
use crate::mirror::FileMirror;
use crate::project::{ClassificationMode, DetectionMode, ProjectConfig};
use crate::render::{decoder_for, CaptureMode, ImageDecoder, Renderer};

use super::{AnnotationRecord, ImageSet, Region};

/// Which input the session accepts next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedAction {
    #[default]
    None,
    Classification,
    Localization,
}

pub struct SessionController {
    config: ProjectConfig,
    images: ImageSet,
    results: ResultStore,
    mirror: Option<FileMirror>,
    renderer: Box<dyn Renderer>,
    decoder: Box<dyn ImageDecoder>,
    cursor: usize,
    record: AnnotationRecord,
    expected: ExpectedAction,
    hint: String,
    finished: bool,
    /// Pixel size of the frame on screen, needed to rasterise masks
    frame_size: Option<(u32, u32)>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("project", &self.config.project_name)
            .field("images", &self.images)
            .field("cursor", &self.cursor)
            .field("expected", &self.expected)
            .field("finished", &self.finished)
            .finish()
    }
}

impl SessionController {
    /// Build a session over an existing image set. A copy worker is started
    /// when the project mirrors images into class folders.
    pub fn new(
        config: ProjectConfig,
        images: ImageSet,
        renderer: Box<dyn Renderer>,
        decoder: Box<dyn ImageDecoder>,
    ) -> Self {
        let results = ResultStore::new(&config);
        let mirror = config.copy_files.then(FileMirror::spawn);
        Self {
            config,
            images,
            results,
            mirror,
            renderer,
            decoder,
            cursor: 0,
            record: AnnotationRecord::new(),
            expected: ExpectedAction::None,
            hint: String::new(),
            finished: false,
            frame_size: None,
        }
    }

    /// Validate the project, scan its data folder and pick the decoder for
    /// its file type.
    pub fn open(config: ProjectConfig, renderer: Box<dyn Renderer>) -> Result<Self> {
        config.validate()?;
        let images = ImageSet::open(&config)?;
        let decoder = decoder_for(config.file_extension);
        Ok(Self::new(config, images, renderer, decoder))
    }

    /// Write the header if needed and show the first image to annotate,
    /// resuming at the persisted index.
    pub fn start(&mut self) {
        if let Err(e) = self.results.ensure_header() {
            error!("Cannot prepare result table: {e}");
        }
        let resume = self.config.img_idx.min(self.images.len());
        self.cursor = self.images.seek_forward(resume);
        self.record.reset();
        info!(
            "Starting '{}' at image {} of {}",
            self.config.project_name,
            self.cursor + 1,
            self.images.len()
        );
        self.show_or_finish();
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn images(&self) -> &ImageSet {
        &self.images
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.images.get(self.cursor).map(|p| p.to_path_buf())
    }

    pub fn expected_action(&self) -> ExpectedAction {
        self.expected
    }

    pub fn hint(&self) -> &str {
        &self.hint
    }

    pub fn record(&self) -> &AnnotationRecord {
        &self.record
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether every step the project requires for the current image is done.
    /// Also refreshes the expected action and the hint; calling it again
    /// without an intervening action changes nothing.
    pub fn is_ready(&mut self) -> bool {
        if self.finished {
            return false;
        }
        let ready = self.classification_done() && self.localization_done();
        let next = if ready {
            ExpectedAction::None
        } else {
            self.pending_action()
        };

        if next != self.expected {
            self.expected = next;
            let mode = match next {
                ExpectedAction::Localization => CaptureMode::from(self.config.object_detection_mode),
                _ => CaptureMode::Idle,
            };
            self.renderer.set_mode(mode);
        }
        let hint = self.hint_for(next);
        if hint != self.hint {
            self.renderer.show_hint(&hint);
            self.hint = hint;
        }
        ready
    }

    /// Advance to the next admitted image. A record that is already complete
    /// is saved first, which in projects without any step writes one row per
    /// image.
    pub fn display_next(&mut self) {
        if self.finished {
            trace!("display_next after the last image");
            return;
        }
        if self.is_ready() {
            self.save_result();
        }
        self.advance();
    }

    /// Assign class `class_id` to the image, or to the last located object
    /// when classifying per location.
    pub fn classify(&mut self, class_id: usize) {
        if self.finished || self.expected != ExpectedAction::Classification {
            trace!("classify({class_id}) ignored, expecting {:?}", self.expected);
            return;
        }
        if class_id >= self.config.class_labels.len() {
            debug!("classify({class_id}) ignored, only {} classes", self.config.class_labels.len());
            return;
        }

        self.record.push_class(Some(class_id));
        self.mirror_current(class_id);
        self.update_classified();
        self.step_done();
    }

    /// Store the region for the current object
    pub fn add_location(&mut self, region: Region) {
        if self.finished || self.expected != ExpectedAction::Localization {
            trace!("add_location ignored, expecting {:?}", self.expected);
            return;
        }
        if !shape_matches(self.config.object_detection_mode, &region) {
            debug!(
                "Ignoring {region:?}, project captures {}",
                self.config.object_detection_mode.name()
            );
            return;
        }

        let region = match (self.config.object_detection_mode, region, self.frame_size) {
            (DetectionMode::PolygonMask, Region::Polygon { vertices }, Some((w, h))) => {
                Region::mask_from_polygon(&vertices, w, h)
            }
            (DetectionMode::PolygonMask, region @ Region::Polygon { .. }, None) => {
                warn!("No frame on screen, storing polygon without rasterising");
                region
            }
            (_, region, _) => region,
        };
        self.record.push_location(Some(region), self.config.object_count());
        self.update_classified();
        self.step_done();
    }

    /// End localization in projects with an unlimited number of objects
    pub fn finish_localization(&mut self) {
        if self.finished || self.expected != ExpectedAction::Localization {
            trace!("finish_localization ignored, expecting {:?}", self.expected);
            return;
        }
        if self.config.object_count().is_some() {
            debug!("finish_localization ignored, project has a fixed object list");
            return;
        }
        self.record.all_objects_localized = true;
        self.update_classified();
        self.step_done();
    }

    /// Decline the pending step: an empty location, an empty class, or,
    /// when nothing is pending, a plain advance. In unlimited mode skipping
    /// a location ends localization.
    pub fn skip_step(&mut self) {
        if self.finished {
            return;
        }
        match self.expected {
            ExpectedAction::Localization => {
                if self.config.object_count().is_none() {
                    self.finish_localization();
                    return;
                }
                self.record.push_location(None, self.config.object_count());
                self.update_classified();
                self.step_done();
            }
            ExpectedAction::Classification => {
                self.record.push_class(None);
                self.update_classified();
                self.step_done();
            }
            ExpectedAction::None => self.display_next(),
        }
    }

    /// Return to the previous admitted image and undo everything saved for
    /// it: its class-folder copies, its result row and its side file.
    pub fn go_back(&mut self) {
        if self.cursor == 0 {
            trace!("go_back at the first image");
            return;
        }
        let target = self.images.seek_backward(self.cursor - 1);
        if !self.images.admits(target) {
            debug!("go_back ignored, no earlier image passes the filter");
            return;
        }

        self.discard_partial();
        self.cursor = target;
        self.record.reset();
        self.finished = false;
        self.roll_back_saved(target);
        debug!("Back to image {}", target + 1);
        self.show_current();
    }

    /// Show image `position` (1-based) directly, without filtering. Its
    /// earlier row stays until the image is saved again, which replaces it.
    pub fn jump_to(&mut self, position: usize) {
        if position == 0 || position > self.images.len() {
            debug!("jump_to({position}) outside 1..={}", self.images.len());
            return;
        }
        self.discard_partial();
        self.cursor = position - 1;
        self.record.reset();
        self.finished = false;
        self.show_current();
    }

    /// Toggle a configured flag on the current image; returns the new state
    pub fn toggle_flag(&mut self, name: &str) -> bool {
        if self.finished {
            return false;
        }
        if !self.config.flag_names.iter().any(|f| f == name) {
            debug!("Unknown flag '{name}'");
            return false;
        }
        self.record.toggle_flag(name)
    }

    pub fn set_comment(&mut self, text: &str) {
        if self.finished {
            return;
        }
        let text = text.trim();
        self.record.comment = (!text.is_empty()).then(|| text.to_string());
    }

    /// Persist the cursor and wait for outstanding copies. The cursor is
    /// also written whenever a new image is shown, so a session that ends
    /// without `close` resumes at the image it was on.
    pub fn close(&mut self) {
        self.persist_cursor();
        self.flush_copies();
        info!("Closed '{}' at image {}", self.config.project_name, self.cursor + 1);
    }

    /// Block until queued class-folder copies and removals have run
    pub fn flush_copies(&self) {
        if let Some(mirror) = &self.mirror {
            mirror.flush();
        }
    }

    fn classification_done(&self) -> bool {
        match self.config.effective_classification() {
            ClassificationMode::None => true,
            ClassificationMode::PerImage => !self.record.classes.is_empty(),
            ClassificationMode::PerLocation => !self.record.class_pending_for_location(),
        }
    }

    fn localization_done(&self) -> bool {
        !self.config.localization_required() || self.record.all_objects_localized
    }

    /// The next step when the record is incomplete
    fn pending_action(&self) -> ExpectedAction {
        match self.config.effective_classification() {
            ClassificationMode::PerLocation if self.record.class_pending_for_location() => {
                ExpectedAction::Classification
            }
            ClassificationMode::PerImage if self.localization_done() => {
                ExpectedAction::Classification
            }
            _ => ExpectedAction::Localization,
        }
    }

    fn hint_for(&self, action: ExpectedAction) -> String {
        match action {
            ExpectedAction::None => String::new(),
            ExpectedAction::Localization => {
                let shape = self.config.object_detection_mode.name();
                match self.config.object_names.get(self.record.object_idx) {
                    Some(name) => format!("Mark {name} ({shape})"),
                    None => format!(
                        "Mark object {} ({shape}) or finish",
                        self.record.object_idx + 1
                    ),
                }
            }
            ExpectedAction::Classification => {
                if self.config.effective_classification() == ClassificationMode::PerLocation {
                    let idx = self.record.locations.len().saturating_sub(1);
                    match self.config.object_names.get(idx) {
                        Some(name) => format!("Classify {name}"),
                        None => format!("Classify object {}", idx + 1),
                    }
                } else {
                    "Classify image".to_string()
                }
            }
        }
    }

    fn update_classified(&mut self) {
        self.record.classified = self.classification_done();
    }

    fn step_done(&mut self) {
        if self.is_ready() {
            self.save_result();
            self.advance();
        }
    }

    fn save_result(&mut self) {
        let Some(basename) = self.images.basename(self.cursor) else {
            return;
        };
        if let Err(e) = self.results.append(&self.record, &basename, self.cursor) {
            error!("Could not save result for {basename}: {e}");
        }
    }

    fn advance(&mut self) {
        self.cursor = self.images.seek_forward(self.cursor + 1);
        self.record.reset();
        self.show_or_finish();
    }

    fn show_or_finish(&mut self) {
        if self.cursor >= self.images.len() {
            self.finish();
        } else {
            self.show_current();
        }
    }

    fn show_current(&mut self) {
        let Some(path) = self.current_path() else {
            return;
        };
        match self.decoder.read(&path) {
            Ok(frame) => {
                let (lo, hi) = frame.window();
                self.frame_size = Some((frame.width, frame.height));
                self.renderer.display(&frame, lo, hi);
            }
            Err(e) => {
                self.frame_size = None;
                warn!("Cannot display {}: {e}", path.display());
            }
        }
        self.renderer.show_progress(self.cursor + 1, self.images.len());
        self.renderer.set_input_enabled(true);
        // a new image starts with no step taken
        self.expected = ExpectedAction::None;
        self.is_ready();
        self.persist_cursor();
    }

    fn finish(&mut self) {
        self.cursor = self.images.len();
        self.finished = true;
        self.expected = ExpectedAction::None;
        self.hint = "Finished".to_string();
        self.renderer.set_mode(CaptureMode::Idle);
        self.renderer.set_input_enabled(false);
        self.renderer.show_hint(&self.hint);
        info!("All {} images done", self.images.len());
        self.persist_cursor();
    }

    fn persist_cursor(&mut self) {
        self.config.img_idx = self.cursor.min(self.images.len());
        if let Err(e) = self.config.save() {
            error!("Could not save resume position: {e}");
        }
    }

    fn class_copy_targets(&self, index: usize) -> Vec<PathBuf> {
        let Some(basename) = self.images.basename(index) else {
            return Vec::new();
        };
        (0..self.config.class_labels.len())
            .filter_map(|id| self.config.class_folder(id))
            .map(|folder| folder.join(&basename))
            .collect()
    }

    fn mirror_current(&self, class_id: usize) {
        let (Some(mirror), Some(src)) = (&self.mirror, self.images.get(self.cursor)) else {
            return;
        };
        let (Some(folder), Some(basename)) =
            (self.config.class_folder(class_id), self.images.basename(self.cursor))
        else {
            return;
        };
        mirror.copy(src, &folder.join(basename));
    }

    /// Drop copies made for an image that is left before it was saved
    fn discard_partial(&self) {
        if self.finished || self.record.classes.iter().all(Option::is_none) {
            return;
        }
        if let Some(mirror) = &self.mirror {
            for path in self.class_copy_targets(self.cursor) {
                mirror.remove(&path);
            }
        }
    }

    fn roll_back_saved(&mut self, index: usize) {
        if let Some(mirror) = &self.mirror {
            for path in self.class_copy_targets(index) {
                mirror.remove(&path);
            }
        }
        if let Some(basename) = self.images.basename(index) {
            if let Err(e) = self.results.remove_row(&basename) {
                error!("Could not remove result row for {basename}: {e}");
            }
        }
        if let Err(e) = self.results.remove_side_file(index) {
            error!("Could not remove side file of image {}: {e}", index + 1);
        }
    }
}

/// Whether a captured region has the geometry the project asks for
fn shape_matches(mode: DetectionMode, region: &Region) -> bool {
    matches!(
        (mode, region),
        (DetectionMode::Point, Region::Point { .. })
            | (DetectionMode::BoundingBox, Region::Rect { .. })
            | (DetectionMode::Polygon, Region::Polygon { .. })
            | (DetectionMode::PolygonMask, Region::Polygon { .. } | Region::Mask { .. })
    )
}
