//! Labelling window.
//!
//! The window only forwards input to the `SessionController` and shows what
//! the controller pushes through the `Renderer` trait. Region capture (click
//! counting for rectangles and polygons) lives here since it is pure input
//! handling.

use slint::{ComponentHandle, ModelRc, SharedPixelBuffer, SharedString, VecModel};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};

use crate::classes::{class_buttons, class_for_key};
use crate::error::Result;
use crate::project::ProjectConfig;
use crate::render::{CaptureMode, Frame, Renderer};
use crate::state::{Region, SessionController};

slint::slint! {
    import { Button, CheckBox, LineEdit, VerticalBox, HorizontalBox } from "std-widgets.slint";

    export struct FlagState {
        name: string,
        checked: bool,
    }

    export component LabelWindow inherits Window {
        title: "Mammo Labeller";
        preferred-width: 1100px;
        preferred-height: 850px;

        in property <image> frame;
        in property <string> hint;
        in property <string> progress;
        in property <string> capture;
        in property <[string]> class-labels;
        in property <[FlagState]> flags;
        in property <bool> input-enabled: true;
        in-out property <string> comment;

        callback image-clicked(float, float, float, float);
        callback classify(int);
        callback skip();
        callback back();
        callback next();
        callback finish();
        callback close-polygon();
        callback flag-toggled(string);
        callback comment-edited(string);
        callback jump(string);
        callback key(string);

        VerticalBox {
            HorizontalBox {
                Text { text: root.progress; vertical-alignment: center; }
                Text { text: root.hint; font-size: 16px; vertical-alignment: center; horizontal-stretch: 1; }
                Text { text: root.capture; vertical-alignment: center; }
            }

            scope := FocusScope {
                vertical-stretch: 1;
                key-pressed(event) => {
                    root.key(event.text);
                    accept
                }

                Rectangle {
                    background: #111;
                    Image {
                        width: parent.width;
                        height: parent.height;
                        source: root.frame;
                        image-fit: contain;
                    }
                    TouchArea {
                        enabled: root.input-enabled;
                        clicked => {
                            scope.focus();
                            root.image-clicked(self.mouse-x / 1px, self.mouse-y / 1px,
                                               self.width / 1px, self.height / 1px);
                        }
                    }
                }
            }

            HorizontalBox {
                for label[i] in root.class-labels : Button {
                    text: i < 10 ? "\{i}: \{label}" : label;
                    enabled: root.input-enabled;
                    clicked => { root.classify(i); scope.focus(); }
                }
            }

            HorizontalBox {
                for flag in root.flags : CheckBox {
                    text: flag.name;
                    checked: flag.checked;
                    enabled: root.input-enabled;
                    toggled => { root.flag-toggled(flag.name); }
                }
                LineEdit {
                    placeholder-text: "Comment";
                    text <=> root.comment;
                    enabled: root.input-enabled;
                    edited(text) => { root.comment-edited(text); }
                }
            }

            HorizontalBox {
                Button { text: "Back (b)"; clicked => { root.back(); scope.focus(); } }
                Button { text: "Skip (s)"; enabled: root.input-enabled; clicked => { root.skip(); scope.focus(); } }
                Button { text: "Close polygon (c)"; enabled: root.input-enabled; clicked => { root.close-polygon(); scope.focus(); } }
                Button { text: "Finish objects (f)"; enabled: root.input-enabled; clicked => { root.finish(); scope.focus(); } }
                Button { text: "Next (n)"; enabled: root.input-enabled; clicked => { root.next(); scope.focus(); } }
                jump-to := LineEdit { placeholder-text: "Go to #"; width: 90px; accepted(text) => { root.jump(text); jump-to.text = ""; scope.focus(); } }
            }
        }
    }
}

/// Clicks collected for the region being drawn
#[derive(Debug, Default)]
struct Capture {
    mode: Option<CaptureMode>,
    clicks: Vec<[f64; 2]>,
    frame_size: (u32, u32),
}

impl Capture {
    /// Feed one click, returning the region once it is complete
    fn click(&mut self, x: f64, y: f64) -> Option<Region> {
        match self.mode? {
            CaptureMode::Idle => None,
            CaptureMode::Point => Some(Region::Point { x, y }),
            CaptureMode::Rectangle => {
                self.clicks.push([x, y]);
                if self.clicks.len() < 2 {
                    return None;
                }
                let [a, b] = [self.clicks[0], self.clicks[1]];
                self.clicks.clear();
                Some(Region::rect_from_corners((a[0], a[1]), (b[0], b[1])))
            }
            CaptureMode::Polygon => {
                self.clicks.push([x, y]);
                None
            }
        }
    }

    fn close_polygon(&mut self) -> Option<Region> {
        if self.mode != Some(CaptureMode::Polygon) || self.clicks.len() < 3 {
            return None;
        }
        Some(Region::Polygon {
            vertices: std::mem::take(&mut self.clicks),
        })
    }

    /// Map a click in widget pixels to image fractions, honouring the
    /// letterboxing of `image-fit: contain`
    fn to_image(&self, x: f64, y: f64, widget_w: f64, widget_h: f64) -> Option<(f64, f64)> {
        let (img_w, img_h) = (self.frame_size.0 as f64, self.frame_size.1 as f64);
        if img_w == 0.0 || img_h == 0.0 {
            return None;
        }
        let scale = (widget_w / img_w).min(widget_h / img_h);
        let left = (widget_w - img_w * scale) / 2.0;
        let top = (widget_h - img_h * scale) / 2.0;
        let fx = (x - left) / (img_w * scale);
        let fy = (y - top) / (img_h * scale);
        ((0.0..=1.0).contains(&fx) && (0.0..=1.0).contains(&fy)).then_some((fx, fy))
    }
}

struct WindowRenderer {
    ui: slint::Weak<LabelWindow>,
    capture: Rc<RefCell<Capture>>,
}

impl Renderer for WindowRenderer {
    fn set_mode(&mut self, mode: CaptureMode) {
        let mut capture = self.capture.borrow_mut();
        capture.mode = Some(mode);
        capture.clicks.clear();
        if let Some(ui) = self.ui.upgrade() {
            let label = match mode {
                CaptureMode::Idle => "",
                CaptureMode::Point => "click a point",
                CaptureMode::Rectangle => "click two corners",
                CaptureMode::Polygon => "click vertices, then close",
            };
            ui.set_capture(label.into());
        }
    }

    fn display(&mut self, frame: &Frame, window_min: f64, window_max: f64) {
        self.capture.borrow_mut().frame_size = (frame.width, frame.height);
        let gray = frame.to_gray8((window_min, window_max));
        let mut buffer = SharedPixelBuffer::<slint::Rgb8Pixel>::new(frame.width, frame.height);
        for (px, &v) in buffer.make_mut_slice().iter_mut().zip(gray.iter()) {
            *px = slint::Rgb8Pixel { r: v, g: v, b: v };
        }
        if let Some(ui) = self.ui.upgrade() {
            ui.set_frame(slint::Image::from_rgb8(buffer));
            ui.set_comment(SharedString::new());
        }
    }

    fn show_hint(&mut self, hint: &str) {
        if let Some(ui) = self.ui.upgrade() {
            ui.set_hint(hint.into());
        }
    }

    fn show_progress(&mut self, position: usize, total: usize) {
        if let Some(ui) = self.ui.upgrade() {
            ui.set_progress(format!("{position} / {total}").into());
        }
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        if let Some(ui) = self.ui.upgrade() {
            ui.set_input_enabled(enabled);
        }
    }
}

type Shared = Rc<RefCell<SessionController>>;

fn refresh_flags(ui: &LabelWindow, session: &SessionController) {
    let flags = &session.record().flags;
    let model: Vec<FlagState> = session
        .config()
        .flag_names
        .iter()
        .map(|name| FlagState {
            name: name.as_str().into(),
            checked: flags.contains(name),
        })
        .collect();
    ui.set_flags(ModelRc::new(VecModel::from(model)));
}

/// Open the labelling window for `config` and block until it is closed
pub fn run(config: ProjectConfig) -> Result<()> {
    let ui = LabelWindow::new()?;
    let capture = Rc::new(RefCell::new(Capture::default()));

    let labels: Vec<SharedString> = class_buttons(&config)
        .into_iter()
        .map(|b| b.label.into())
        .collect();
    ui.set_class_labels(ModelRc::new(VecModel::from(labels)));

    let renderer = WindowRenderer {
        ui: ui.as_weak(),
        capture: capture.clone(),
    };
    let session: Shared = Rc::new(RefCell::new(SessionController::open(config, Box::new(renderer))?));
    session.borrow_mut().start();
    refresh_flags(&ui, &session.borrow());

    wire_callbacks(&ui, &session, &capture);

    info!("Labelling window open");
    ui.run()?;
    session.borrow_mut().close();
    Ok(())
}

/// Runs controller actions from UI callbacks and keeps the flag checkboxes in
/// step with the record afterwards
#[derive(Clone)]
struct Actions {
    ui: slint::Weak<LabelWindow>,
    session: Shared,
}

impl Actions {
    fn run(&self, f: impl FnOnce(&mut SessionController)) {
        f(&mut self.session.borrow_mut());
        if let Some(ui) = self.ui.upgrade() {
            refresh_flags(&ui, &self.session.borrow());
        }
    }
}

fn wire_callbacks(ui: &LabelWindow, session: &Shared, capture: &Rc<RefCell<Capture>>) {
    let actions = Actions {
        ui: ui.as_weak(),
        session: session.clone(),
    };

    {
        let actions = actions.clone();
        let capture = capture.clone();
        ui.on_image_clicked(move |x, y, w, h| {
            let region = {
                let mut cap = capture.borrow_mut();
                let Some((fx, fy)) = cap.to_image(x as f64, y as f64, w as f64, h as f64) else {
                    return;
                };
                cap.click(fx, fy)
            };
            if let Some(region) = region {
                actions.run(|s| s.add_location(region));
            }
        });
    }
    {
        let actions = actions.clone();
        let capture = capture.clone();
        ui.on_close_polygon(move || close_polygon(&actions, &capture));
    }
    {
        let actions = actions.clone();
        ui.on_classify(move |id| {
            if let Ok(id) = usize::try_from(id) {
                actions.run(|s| s.classify(id));
            }
        });
    }
    {
        let actions = actions.clone();
        ui.on_skip(move || actions.run(|s| s.skip_step()));
    }
    {
        let actions = actions.clone();
        ui.on_back(move || actions.run(|s| s.go_back()));
    }
    {
        let actions = actions.clone();
        ui.on_next(move || actions.run(|s| s.display_next()));
    }
    {
        let actions = actions.clone();
        ui.on_finish(move || actions.run(|s| s.finish_localization()));
    }
    {
        let actions = actions.clone();
        ui.on_jump(move |text| match text.trim().parse::<usize>() {
            Ok(position) => actions.run(|s| s.jump_to(position)),
            Err(_) => debug!("Ignoring jump target '{text}'"),
        });
    }
    {
        let actions = actions.clone();
        ui.on_flag_toggled(move |name| {
            actions.run(|s| {
                s.toggle_flag(&name);
            })
        });
    }
    {
        let session = session.clone();
        ui.on_comment_edited(move |text| session.borrow_mut().set_comment(&text));
    }
    {
        let capture = capture.clone();
        ui.on_key(move |text| {
            let Some(key) = text.chars().next() else { return };
            let class_count = actions.session.borrow().config().class_labels.len();
            if let Some(id) = class_for_key(key, class_count) {
                actions.run(|s| s.classify(id));
                return;
            }
            match key.to_ascii_lowercase() {
                'n' => actions.run(|s| s.display_next()),
                'b' => actions.run(|s| s.go_back()),
                's' => actions.run(|s| s.skip_step()),
                'f' => actions.run(|s| s.finish_localization()),
                'c' => close_polygon(&actions, &capture),
                _ => {}
            }
        });
    }
}

fn close_polygon(actions: &Actions, capture: &RefCell<Capture>) {
    let region = capture.borrow_mut().close_polygon();
    if let Some(region) = region {
        actions.run(|s| s.add_location(region));
    }
}
