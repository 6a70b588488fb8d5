//! Captured geometry and the per-image annotation accumulator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A region returned by the renderer. Coordinates are fractions of the image
/// size, except for masks which carry pixel indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Region {
    Point {
        x: f64,
        y: f64,
    },
    Rect {
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
    },
    Polygon {
        vertices: Vec<[f64; 2]>,
    },
    /// Interior pixels of a closed polygon
    Mask {
        width: u32,
        height: u32,
        pixels: Vec<(u32, u32)>,
    },
}

impl Region {
    /// Rectangle from two arbitrary corners
    pub fn rect_from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Region::Rect {
            xmin: a.0.min(b.0),
            xmax: a.0.max(b.0),
            ymin: a.1.min(b.1),
            ymax: a.1.max(b.1),
        }
    }

    /// Values written to the result table: `x,y` for points, centre and size
    /// `x,y,w,h` for rectangles. Polygons and masks go to side files.
    pub fn table_values(&self) -> Vec<f64> {
        match self {
            Region::Point { x, y } => vec![unit(*x), unit(*y)],
            Region::Rect {
                xmin,
                xmax,
                ymin,
                ymax,
            } => {
                let (xmin, xmax, ymin, ymax) = (unit(*xmin), unit(*xmax), unit(*ymin), unit(*ymax));
                let w = xmax - xmin;
                let h = ymax - ymin;
                vec![xmin + w / 2.0, ymin + h / 2.0, w, h]
            }
            Region::Polygon { .. } | Region::Mask { .. } => Vec::new(),
        }
    }

    /// Vertices written to region side files, clamped to the image like the
    /// table values. Masks list their pixels as fractions of the mask size.
    pub fn outline(&self) -> Vec<[f64; 2]> {
        match self {
            Region::Point { x, y } => vec![[unit(*x), unit(*y)]],
            Region::Rect {
                xmin,
                xmax,
                ymin,
                ymax,
            } => {
                let (xmin, xmax, ymin, ymax) = (unit(*xmin), unit(*xmax), unit(*ymin), unit(*ymax));
                vec![[xmin, ymin], [xmax, ymin], [xmax, ymax], [xmin, ymax]]
            }
            Region::Polygon { vertices } => {
                vertices.iter().map(|[x, y]| [unit(*x), unit(*y)]).collect()
            }
            Region::Mask {
                width,
                height,
                pixels,
            } => pixels
                .iter()
                .map(|(x, y)| [*x as f64 / *width as f64, *y as f64 / *height as f64])
                .collect(),
        }
    }

    /// Rasterise a polygon given in fractions into a mask of the given size.
    /// A pixel is inside when its centre is inside (even-odd rule).
    pub fn mask_from_polygon(vertices: &[[f64; 2]], width: u32, height: u32) -> Self {
        let pts: Vec<(f64, f64)> = vertices
            .iter()
            .map(|[x, y]| (unit(*x) * width as f64, unit(*y) * height as f64))
            .collect();
        let mut pixels = Vec::new();
        if pts.len() >= 3 {
            for py in 0..height {
                let cy = py as f64 + 0.5;
                for px in 0..width {
                    let cx = px as f64 + 0.5;
                    if point_in_polygon(&pts, cx, cy) {
                        pixels.push((px, py));
                    }
                }
            }
        }
        Region::Mask {
            width,
            height,
            pixels,
        }
    }
}

fn unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn point_in_polygon(pts: &[(f64, f64)], x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = pts.len() - 1;
    for i in 0..pts.len() {
        let (xi, yi) = pts[i];
        let (xj, yj) = pts[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Progress on the current image. Reset whenever the cursor moves.
///
/// `locations` holds one slot per localized object; `None` is a skipped
/// object. `classes` holds one entry per class decision: a single entry when
/// classifying per image, one per location when classifying per location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationRecord {
    pub classified: bool,
    pub selected_class: Option<usize>,
    pub classes: Vec<Option<usize>>,
    pub object_idx: usize,
    pub locations: Vec<Option<Region>>,
    pub all_objects_localized: bool,
    pub flags: BTreeSet<String>,
    pub comment: Option<String>,
}

impl AnnotationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Store one object slot; `object_count` is the fixed number of objects,
    /// `None` when unlimited.
    pub fn push_location(&mut self, region: Option<Region>, object_count: Option<usize>) {
        self.locations.push(region);
        self.object_idx += 1;
        if let Some(count) = object_count {
            if self.object_idx >= count {
                self.all_objects_localized = true;
            }
        }
    }

    pub fn push_class(&mut self, class_id: Option<usize>) {
        self.classes.push(class_id);
        self.selected_class = class_id;
    }

    /// True when the most recent location is still waiting for its class
    pub fn class_pending_for_location(&self) -> bool {
        self.classes.len() < self.locations.len()
    }

    pub fn toggle_flag(&mut self, name: &str) -> bool {
        if self.flags.remove(name) {
            false
        } else {
            self.flags.insert(name.to_string());
            true
        }
    }

    /// Non-empty geometries for the side file, paired with their class
    pub fn regions(&self) -> impl Iterator<Item = (&Region, Option<usize>)> + '_ {
        self.locations.iter().enumerate().filter_map(move |(i, slot)| {
            slot.as_ref()
                .map(|region| (region, self.classes.get(i).copied().flatten()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_count_completes_on_last_object() {
        let mut rec = AnnotationRecord::new();
        rec.push_location(Some(Region::Point { x: 0.1, y: 0.2 }), Some(3));
        rec.push_location(None, Some(3));
        assert!(!rec.all_objects_localized);
        rec.push_location(Some(Region::Point { x: 0.5, y: 0.5 }), Some(3));
        assert!(rec.all_objects_localized);
        assert_eq!(rec.object_idx, 3);
    }

    #[test]
    fn unlimited_never_completes_by_itself() {
        let mut rec = AnnotationRecord::new();
        for _ in 0..20 {
            rec.push_location(Some(Region::Point { x: 0.0, y: 0.0 }), None);
        }
        assert!(!rec.all_objects_localized);
    }

    #[test]
    fn rect_values_are_centre_and_size() {
        let r = Region::rect_from_corners((0.6, 0.5), (0.2, 0.1));
        let v = r.table_values();
        assert_eq!(v.len(), 4);
        let expected = [0.4, 0.3, 0.4, 0.4];
        for (got, want) in v.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{got} vs {want}");
        }
    }

    #[test]
    fn point_values_are_clamped() {
        let p = Region::Point { x: -0.2, y: 1.7 };
        assert_eq!(p.table_values(), vec![0.0, 1.0]);
    }

    #[test]
    fn outlines_are_clamped_like_table_values() {
        let poly = Region::Polygon {
            vertices: vec![[-0.1, 0.5], [1.2, 0.5], [0.5, f64::NAN]],
        };
        assert_eq!(poly.outline(), vec![[0.0, 0.5], [1.0, 0.5], [0.5, 0.0]]);

        let rect = Region::rect_from_corners((-0.5, 0.2), (0.5, 1.5));
        assert_eq!(
            rect.outline(),
            vec![[0.0, 0.2], [0.5, 0.2], [0.5, 1.0], [0.0, 1.0]]
        );
    }

    #[test]
    fn mask_marks_interior_pixels() {
        // square covering the middle 2x2 pixels of a 4x4 image
        let square = [[0.25, 0.25], [0.75, 0.25], [0.75, 0.75], [0.25, 0.75]];
        let Region::Mask { pixels, .. } = Region::mask_from_polygon(&square, 4, 4) else {
            panic!("expected a mask");
        };
        assert_eq!(pixels, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn degenerate_polygon_gives_empty_mask() {
        let Region::Mask { pixels, .. } = Region::mask_from_polygon(&[[0.0, 0.0], [1.0, 1.0]], 3, 3)
        else {
            panic!("expected a mask");
        };
        assert!(pixels.is_empty());
    }

    #[test]
    fn regions_pair_with_classes() {
        let mut rec = AnnotationRecord::new();
        rec.push_location(Some(Region::Point { x: 0.1, y: 0.1 }), None);
        rec.push_class(Some(1));
        rec.push_location(None, None);
        rec.push_class(None);
        rec.push_location(Some(Region::Point { x: 0.2, y: 0.2 }), None);

        let classes: Vec<Option<usize>> = rec.regions().map(|(_, c)| c).collect();
        assert_eq!(classes, vec![Some(1), None]);
        assert!(rec.class_pending_for_location());
    }

    #[test]
    fn flags_toggle() {
        let mut rec = AnnotationRecord::new();
        assert!(rec.toggle_flag("implant"));
        assert!(rec.flags.contains("implant"));
        assert!(!rec.toggle_flag("implant"));
        assert!(rec.flags.is_empty());
    }
}
