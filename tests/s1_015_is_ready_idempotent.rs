// S1-015: Repeated readiness checks
// Test: Call is_ready many times without any action in between
// Expected: Expected action, capture mode and hint are only pushed once

mod test_helpers;
use test_helpers::*;

use mammo_labeller::{ClassificationMode, DetectionMode, ExpectedAction, ProjectConfig, Region};

#[test]
fn is_ready_does_not_churn() {
    let fx = fixture(
        ProjectConfig {
            classification_mode: ClassificationMode::PerImage,
            class_labels: labels(&["A", "B"]),
            object_detection_mode: DetectionMode::BoundingBox,
            object_names: labels(&["mass"]),
            ..ProjectConfig::default()
        },
        &["x.dcm"],
    );
    let (mut session, log) = fx.session();

    let modes = log.borrow().modes.len();
    let hints = log.borrow().hints.len();
    for _ in 0..5 {
        assert!(!session.is_ready());
        assert_eq!(session.expected_action(), ExpectedAction::Localization);
    }
    assert_eq!(log.borrow().modes.len(), modes);
    assert_eq!(log.borrow().hints.len(), hints);

    session.add_location(Region::rect_from_corners((0.1, 0.1), (0.2, 0.2)));
    let modes = log.borrow().modes.len();
    for _ in 0..5 {
        assert!(!session.is_ready());
        assert_eq!(session.expected_action(), ExpectedAction::Classification);
    }
    assert_eq!(log.borrow().modes.len(), modes);
    assert_eq!(session.hint(), "Classify image");
}
