//! Interfaces to the display side: the decoder that turns a file into pixels
//! and the renderer that shows them and captures regions.

use dicom_core::Tag;
use dicom_core::value::PrimitiveValue;
use dicom_dictionary_std::tags;
use std::path::Path;

use crate::error::{LabellerError, Result};
use crate::project::{DetectionMode, FileExtension};

/// Single-channel pixel buffer handed to the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major intensities
    pub samples: Vec<f32>,
    pub window_center: Option<f64>,
    pub window_width: Option<f64>,
}

impl Frame {
    /// `(window_min, window_max)` from the decoder's hints, or the sample
    /// range when there are none
    pub fn window(&self) -> (f64, f64) {
        if let (Some(center), Some(width)) = (self.window_center, self.window_width) {
            if width > 0.0 {
                return (center - width / 2.0, center + width / 2.0);
            }
        }
        let (min, max) = self
            .samples
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if min > max {
            (0.0, 1.0)
        } else {
            (min as f64, max as f64)
        }
    }

    /// Map samples through the window to 8-bit grey
    pub fn to_gray8(&self, window: (f64, f64)) -> Vec<u8> {
        let (lo, hi) = window;
        let span = (hi - lo).max(f64::EPSILON);
        self.samples
            .iter()
            .map(|&v| (((v as f64 - lo) / span).clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }
}

/// What kind of input the renderer should capture next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Clicks are ignored; window/level dragging only
    Idle,
    Point,
    Rectangle,
    Polygon,
}

impl From<DetectionMode> for CaptureMode {
    fn from(mode: DetectionMode) -> Self {
        match mode {
            DetectionMode::None => CaptureMode::Idle,
            DetectionMode::Point => CaptureMode::Point,
            DetectionMode::BoundingBox => CaptureMode::Rectangle,
            DetectionMode::Polygon | DetectionMode::PolygonMask => CaptureMode::Polygon,
        }
    }
}

/// Display surface driven by the session
pub trait Renderer {
    fn set_mode(&mut self, mode: CaptureMode);

    fn display(&mut self, frame: &Frame, window_min: f64, window_max: f64);

    /// Instruction for the operator, e.g. which object to mark next
    fn show_hint(&mut self, hint: &str);

    /// 1-based position of the current image and the total count
    fn show_progress(&mut self, position: usize, total: usize);

    /// Enable or disable all annotation affordances
    fn set_input_enabled(&mut self, enabled: bool);
}

/// Turns an image file into a frame
pub trait ImageDecoder {
    fn read(&self, path: &Path) -> Result<Frame>;
}

/// Decodes JPEG and PNG files through the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterDecoder;

impl ImageDecoder for RasterDecoder {
    fn read(&self, path: &Path) -> Result<Frame> {
        let img = image::open(path)?.to_luma32f();
        Ok(Frame {
            width: img.width(),
            height: img.height(),
            samples: img.into_raw(),
            window_center: None,
            window_width: None,
        })
    }
}

/// Decodes native (uncompressed) monochrome DICOM pixel data. Only the first
/// frame is read. Rescale slope/intercept are applied and window hints are
/// taken from the header.
#[derive(Debug, Default, Clone, Copy)]
pub struct DicomDecoder;

impl ImageDecoder for DicomDecoder {
    fn read(&self, path: &Path) -> Result<Frame> {
        let obj = dicom_object::open_file(path).map_err(|e| LabellerError::dicom(path, e))?;

        let int_tag = |tag: Tag| -> Result<u32> {
            obj.element(tag)
                .map_err(|e| LabellerError::dicom(path, e))?
                .to_int::<u32>()
                .map_err(|e| LabellerError::dicom(path, e))
        };
        let float_tag = |tag: Tag| -> Option<f64> { obj.element(tag).ok()?.to_float64().ok() };

        let height = int_tag(tags::ROWS)?;
        let width = int_tag(tags::COLUMNS)?;
        let bits = int_tag(tags::BITS_ALLOCATED)?;
        let signed = int_tag(tags::PIXEL_REPRESENTATION).unwrap_or(0) == 1;
        let slope = float_tag(tags::RESCALE_SLOPE).unwrap_or(1.0) as f32;
        let intercept = float_tag(tags::RESCALE_INTERCEPT).unwrap_or(0.0) as f32;
        let inverted = obj
            .element(tags::PHOTOMETRIC_INTERPRETATION)
            .ok()
            .and_then(|e| e.to_str().ok().map(|s| s.trim() == "MONOCHROME1"))
            .unwrap_or(false);

        let pixel_data = obj
            .element(tags::PIXEL_DATA)
            .map_err(|e| LabellerError::dicom(path, e))?;
        let Some(value) = pixel_data.value().primitive() else {
            return Err(LabellerError::dicom(path, "compressed pixel data is not supported"));
        };

        let count = width as usize * height as usize;
        let raw: Vec<f32> = match (value, bits) {
            (PrimitiveValue::U16(v), _) if signed => v.iter().map(|&s| s as i16 as f32).collect(),
            (PrimitiveValue::U16(v), _) => v.iter().map(|&s| s as f32).collect(),
            (PrimitiveValue::I16(v), _) => v.iter().map(|&s| s as f32).collect(),
            (PrimitiveValue::U8(v), 8) => v.iter().map(|&s| s as f32).collect(),
            (PrimitiveValue::U8(v), 16) => v
                .chunks_exact(2)
                .map(|b| {
                    let s = u16::from_le_bytes([b[0], b[1]]);
                    if signed { s as i16 as f32 } else { s as f32 }
                })
                .collect(),
            _ => {
                return Err(LabellerError::dicom(
                    path,
                    format!("unsupported pixel layout ({bits} bits allocated)"),
                ));
            }
        };
        if raw.len() < count {
            return Err(LabellerError::dicom(path, "pixel data shorter than rows x columns"));
        }

        let samples = raw[..count]
            .iter()
            .map(|&v| {
                let v = v * slope + intercept;
                if inverted { -v } else { v }
            })
            .collect();
        let (window_center, window_width) = if inverted {
            (float_tag(tags::WINDOW_CENTER).map(|c| -c), float_tag(tags::WINDOW_WIDTH))
        } else {
            (float_tag(tags::WINDOW_CENTER), float_tag(tags::WINDOW_WIDTH))
        };

        Ok(Frame {
            width,
            height,
            samples,
            window_center,
            window_width,
        })
    }
}

/// The decoder matching a project's file type
pub fn decoder_for(extension: FileExtension) -> Box<dyn ImageDecoder> {
    if extension.is_dicom() {
        Box::new(DicomDecoder)
    } else {
        Box::new(RasterDecoder)
    }
}

/// Renderer that draws nothing, for headless sessions
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn set_mode(&mut self, _mode: CaptureMode) {}
    fn display(&mut self, _frame: &Frame, _window_min: f64, _window_max: f64) {}
    fn show_hint(&mut self, _hint: &str) {}
    fn show_progress(&mut self, _position: usize, _total: usize) {}
    fn set_input_enabled(&mut self, _enabled: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<f32>) -> Frame {
        Frame {
            width: samples.len() as u32,
            height: 1,
            samples,
            window_center: None,
            window_width: None,
        }
    }

    #[test]
    fn window_prefers_decoder_hints() {
        let mut f = frame(vec![0.0, 4095.0]);
        assert_eq!(f.window(), (0.0, 4095.0));
        f.window_center = Some(1000.0);
        f.window_width = Some(200.0);
        assert_eq!(f.window(), (900.0, 1100.0));
    }

    #[test]
    fn gray8_clamps_outside_window() {
        let f = frame(vec![-10.0, 0.0, 50.0, 100.0, 300.0]);
        assert_eq!(f.to_gray8((0.0, 100.0)), vec![0, 0, 128, 255, 255]);
    }

    #[test]
    fn raster_decoder_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        image::GrayImage::from_raw(2, 1, vec![0, 255]).unwrap().save(&path).unwrap();

        let f = RasterDecoder.read(&path).unwrap();
        assert_eq!((f.width, f.height), (2, 1));
        assert_eq!(f.samples, vec![0.0, 1.0]);
    }

    #[test]
    fn dicom_decoder_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.dcm");
        std::fs::write(&path, b"DICM? no").unwrap();
        assert!(matches!(DicomDecoder.read(&path), Err(LabellerError::Dicom { .. })));
    }
}
