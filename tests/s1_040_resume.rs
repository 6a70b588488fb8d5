// S1-040: Resume a project
// Test: Open from the data folder, advance, close, reopen
// Expected: The reopened session starts where the last one stopped

mod test_helpers;
use test_helpers::*;

use mammo_labeller::render::NullRenderer;
use mammo_labeller::{
    ClassificationMode, FileExtension, LabellerError, ProjectConfig, SessionController,
};

#[test]
fn reopen_resumes_at_saved_index() {
    let fx = fixture(
        ProjectConfig {
            file_extension: FileExtension::Png,
            ..ProjectConfig::default()
        },
        &["c.png", "a.png", "b.png", "notes.txt"],
    );
    fx.config.save().unwrap();

    let config = ProjectConfig::load(fx.project()).unwrap();
    let mut session = SessionController::open(config, Box::new(NullRenderer)).unwrap();
    session.start();
    assert_eq!(session.images().len(), 3);
    assert_eq!(session.images().basename(0).as_deref(), Some("a.png"));

    session.display_next();
    session.close();
    drop(session);

    let config = ProjectConfig::load(fx.project()).unwrap();
    assert_eq!(config.img_idx, 1);
    let mut session = SessionController::open(config, Box::new(NullRenderer)).unwrap();
    session.start();
    assert_eq!(session.current_index(), 1);
    assert_eq!(fx.rows(), vec!["a.png"]);
}

#[test]
fn open_rejects_empty_data_folder() {
    let fx = fixture(
        ProjectConfig {
            file_extension: FileExtension::Jpg,
            ..ProjectConfig::default()
        },
        &["only.png"],
    );
    let result = SessionController::open(fx.config.clone(), Box::new(NullRenderer));
    assert!(matches!(result, Err(LabellerError::EmptyImageSet { .. })));
}

#[test]
fn resume_without_close_keeps_one_row_per_image() {
    let fx = fixture(
        ProjectConfig {
            classification_mode: ClassificationMode::PerImage,
            class_labels: labels(&["A", "B"]),
            file_extension: FileExtension::Png,
            ..ProjectConfig::default()
        },
        &["img1.png", "img2.png", "img3.png"],
    );
    let (mut session, _log) = fx.session();
    session.classify(0);
    session.classify(1);
    drop(session);

    let (session, _log) = fx.reopened();
    assert_eq!(session.current_index(), 2);
    drop(session);

    // settings from before the first session still point at the start
    let (mut stale, _log) = fx.session();
    assert_eq!(stale.current_index(), 0);
    stale.classify(0);
    assert_eq!(fx.rows(), vec!["img2.png,1", "img1.png,0"]);
}
