// S1-030: Class folder mirror
// Test: Classify with copying enabled, then go back
// Expected: Files appear in their class folder and are removed again on go_back

mod test_helpers;
use test_helpers::*;

use mammo_labeller::{ClassificationMode, ProjectConfig};

#[test]
fn copies_follow_classification_and_go_back() {
    let fx = fixture(
        ProjectConfig {
            classification_mode: ClassificationMode::PerImage,
            class_labels: labels(&["benign", "malignant"]),
            copy_files: true,
            ..ProjectConfig::default()
        },
        &["img1.png", "img2.png", "img3.png"],
    );
    let (mut session, _log) = fx.session();

    session.classify(1);
    session.classify(0);
    session.flush_copies();
    let malignant = fx.project().join("malignant");
    let benign = fx.project().join("benign");
    assert_eq!(std::fs::read(malignant.join("img1.png")).unwrap(), b"img1.png");
    assert!(benign.join("img2.png").exists());

    session.go_back();
    session.flush_copies();
    assert!(!benign.join("img2.png").exists());
    assert!(malignant.join("img1.png").exists());
    assert_eq!(fx.rows(), vec!["img1.png,1"]);

    session.classify(1);
    session.flush_copies();
    assert!(malignant.join("img2.png").exists());
    assert!(!benign.join("img2.png").exists());
}

#[test]
fn missing_source_does_not_stop_the_session() {
    let fx = fixture(
        ProjectConfig {
            classification_mode: ClassificationMode::PerImage,
            class_labels: labels(&["A"]),
            copy_files: true,
            ..ProjectConfig::default()
        },
        &["gone.png", "next.png"],
    );
    std::fs::remove_file(&fx.paths[0]).unwrap();
    let (mut session, _log) = fx.session();

    session.classify(0);
    session.flush_copies();
    assert_eq!(session.current_index(), 1);
    assert_eq!(fx.rows(), vec!["gone.png,0"]);
    assert!(!fx.project().join("A/gone.png").exists());
}
