// S1-012: Unlimited number of objects
// Test: Empty object list, two points, then an explicit finish
// Expected: Localization completes only on finish; row holds both points

mod test_helpers;
use test_helpers::*;

use mammo_labeller::{ClassificationMode, DetectionMode, ExpectedAction, ProjectConfig, Region};

#[test]
fn finish_ends_localization() {
    let fx = fixture(
        ProjectConfig {
            object_detection_mode: DetectionMode::Point,
            ..ProjectConfig::default()
        },
        &["p1.png", "p2.png"],
    );
    let (mut session, _log) = fx.session();

    session.add_location(Region::Point { x: 0.1, y: 0.2 });
    session.add_location(Region::Point { x: 0.3, y: 0.4 });
    assert!(!session.record().all_objects_localized);
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.hint(), "Mark object 3 (point) or finish");

    session.finish_localization();
    assert_eq!(session.current_index(), 1);
    assert_eq!(fx.rows(), vec!["p1.png,0.1,0.2,0.3,0.4"]);
    assert_eq!(fx.table().lines().next(), Some("file,object x,object y,comments"));
}

#[test]
fn per_location_classes_then_finish() {
    let fx = fixture(
        ProjectConfig {
            object_detection_mode: DetectionMode::BoundingBox,
            classification_mode: ClassificationMode::PerLocation,
            class_labels: labels(&["benign", "malignant"]),
            ..ProjectConfig::default()
        },
        &["p1.dcm"],
    );
    let (mut session, _log) = fx.session();

    session.add_location(Region::rect_from_corners((0.0, 0.0), (0.5, 0.5)));
    // a class is pending, so finishing is out of turn
    session.finish_localization();
    assert_eq!(session.expected_action(), ExpectedAction::Classification);

    session.classify(1);
    session.finish_localization();
    assert!(session.is_finished());
    assert_eq!(fx.rows(), vec!["p1.dcm,0.25,0.25,0.5,0.5,1"]);
}

#[test]
fn skipping_in_unlimited_mode_finishes() {
    let fx = fixture(
        ProjectConfig {
            object_detection_mode: DetectionMode::Point,
            ..ProjectConfig::default()
        },
        &["p1.png", "p2.png"],
    );
    let (mut session, _log) = fx.session();
    session.add_location(Region::Point { x: 0.5, y: 0.5 });
    session.skip_step();
    assert_eq!(fx.rows(), vec!["p1.png,0.5,0.5"]);
}
