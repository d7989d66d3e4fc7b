//! Frontal face location.
//!
//! A [`FaceDetector`] backend proposes candidate boxes on a contrast-equalized
//! grayscale frame; [`FaceLocator`] filters them by size, picks the subject and
//! cuts the canonical patch.

use crate::alignment;
use crate::types::FaceRect;
use image::{DynamicImage, GrayImage};
use imageproc::contrast::equalize_histogram;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detector model not found: {0}")]
    ModelNotFound(String),
    #[error("failed to load detector model {path}: {reason}")]
    ModelLoad { path: String, reason: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LocatorError {
    #[error("no face detected")]
    NoFaceDetected,
    #[error("{0} faces detected, expected exactly one")]
    MultipleFacesDetected(usize),
    #[error("face box lies outside the frame")]
    OutOfFrame,
}

/// Cascade tuning knobs, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Shrink factor between pyramid levels (0.8 ≈ a 1.25 upscale step).
    pub pyramid_scale_factor: f32,
    /// Minimum classifier score for a window to count as a face. Plays the
    /// role a minimum-neighbour count plays in a Haar cascade.
    pub score_threshold: f64,
    /// Smallest accepted box side, in pixels.
    pub min_face_size: u32,
    /// Largest accepted box side, in pixels. Unbounded when absent.
    pub max_face_size: Option<u32>,
    /// Sliding window step, in pixels.
    pub window_step: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            pyramid_scale_factor: 0.8,
            score_threshold: 2.0,
            min_face_size: 40,
            max_face_size: None,
            window_step: 4,
        }
    }
}

impl DetectorSettings {
    fn accepts(&self, rect: &FaceRect) -> bool {
        let side = rect.width.min(rect.height);
        let longest = rect.width.max(rect.height);
        side >= self.min_face_size && self.max_face_size.map_or(true, |max| longest <= max)
    }
}

/// Backend that proposes face boxes on an equalized grayscale frame.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRect>;
}

/// SeetaFace frontal detector via the `rustface` crate.
pub struct SeetaDetector {
    model: rustface::Model,
    settings: DetectorSettings,
}

impl SeetaDetector {
    /// Load a SeetaFace frontal model (`seeta_fd_frontal_v1.0.bin`) from disk.
    pub fn load(model_path: &Path, settings: DetectorSettings) -> Result<Self, DetectorError> {
        let path_str = model_path.display().to_string();
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(path_str));
        }

        let file = File::open(model_path).map_err(|e| DetectorError::ModelLoad {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
        let model = rustface::read_model(BufReader::new(file)).map_err(|e| DetectorError::ModelLoad {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(path = %path_str, ?settings, "loaded SeetaFace detector model");

        Ok(Self { model, settings })
    }
}

impl FaceDetector for SeetaDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRect> {
        // rustface detectors are stateful; build one per frame from the shared model.
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.settings.min_face_size);
        detector.set_score_thresh(self.settings.score_threshold);
        detector.set_pyramid_scale_factor(self.settings.pyramid_scale_factor);
        detector.set_slide_window_step(self.settings.window_step, self.settings.window_step);

        let image = rustface::ImageData::new(gray.as_raw(), gray.width(), gray.height());
        detector
            .detect(&image)
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceRect {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                }
            })
            .collect()
    }
}

/// A located face: the canonical patch plus where it came from.
#[derive(Debug, Clone)]
pub struct Located {
    pub patch: GrayImage,
    pub rect: FaceRect,
    /// Number of size-accepted candidates in the frame.
    pub candidates: usize,
}

pub struct FaceLocator {
    detector: Box<dyn FaceDetector>,
    settings: DetectorSettings,
}

impl FaceLocator {
    pub fn new(detector: Box<dyn FaceDetector>, settings: DetectorSettings) -> Self {
        Self { detector, settings }
    }

    /// Locate the most prominent face. Multiple candidates are allowed; the
    /// largest box wins and ties go to the first one the detector reported.
    pub fn locate(&self, image: &DynamicImage) -> Result<Located, LocatorError> {
        let gray = equalize_histogram(&image.to_luma8());
        let candidates = self.candidates(&gray);
        let rect = largest(&candidates).ok_or(LocatorError::NoFaceDetected)?;
        self.cut(&gray, rect, candidates.len())
    }

    /// Locate exactly one face; used for registration, where an ambiguous
    /// subject must be rejected.
    pub fn locate_single(&self, image: &DynamicImage) -> Result<Located, LocatorError> {
        let gray = equalize_histogram(&image.to_luma8());
        let candidates = self.candidates(&gray);
        match candidates.as_slice() {
            [] => Err(LocatorError::NoFaceDetected),
            [rect] => self.cut(&gray, *rect, 1),
            many => Err(LocatorError::MultipleFacesDetected(many.len())),
        }
    }

    /// Size-filtered candidates, in detector order.
    pub fn candidates(&self, gray: &GrayImage) -> Vec<FaceRect> {
        let raw = self.detector.detect(gray);
        let total = raw.len();
        let kept: Vec<FaceRect> = raw.into_iter().filter(|r| self.settings.accepts(r)).collect();
        tracing::debug!(total, kept = kept.len(), "face candidates");
        kept
    }

    fn cut(&self, gray: &GrayImage, rect: FaceRect, candidates: usize) -> Result<Located, LocatorError> {
        let patch = alignment::canonical_patch(gray, &rect).ok_or(LocatorError::OutOfFrame)?;
        Ok(Located {
            patch,
            rect,
            candidates,
        })
    }
}

fn largest(candidates: &[FaceRect]) -> Option<FaceRect> {
    let mut best: Option<FaceRect> = None;
    for rect in candidates {
        if best.map_or(true, |b| rect.area() > b.area()) {
            best = Some(*rect);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::CANONICAL_SIZE;
    use image::Luma;

    struct FixedDetector(Vec<FaceRect>);

    impl FaceDetector for FixedDetector {
        fn detect(&self, _gray: &GrayImage) -> Vec<FaceRect> {
            self.0.clone()
        }
    }

    fn rect(x: i32, y: i32, w: u32, h: u32) -> FaceRect {
        FaceRect { x, y, width: w, height: h }
    }

    fn frame() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(320, 240, |x, y| Luma([((x + y) % 256) as u8])))
    }

    fn locator(rects: Vec<FaceRect>) -> FaceLocator {
        FaceLocator::new(Box::new(FixedDetector(rects)), DetectorSettings::default())
    }

    #[test]
    fn test_largest_prefers_area_then_order() {
        let boxes = [rect(0, 0, 50, 50), rect(10, 10, 80, 80), rect(100, 100, 80, 80)];
        assert_eq!(largest(&boxes), Some(rect(10, 10, 80, 80)));
        assert_eq!(largest(&[]), None);
    }

    #[test]
    fn test_locate_no_face() {
        assert_eq!(locator(vec![]).locate(&frame()).unwrap_err(), LocatorError::NoFaceDetected);
    }

    #[test]
    fn test_locate_picks_largest() {
        let located = locator(vec![rect(10, 10, 50, 50), rect(100, 60, 90, 90)])
            .locate(&frame())
            .unwrap();
        assert_eq!(located.rect, rect(100, 60, 90, 90));
        assert_eq!(located.candidates, 2);
        assert_eq!(located.patch.dimensions(), (CANONICAL_SIZE, CANONICAL_SIZE));
    }

    #[test]
    fn test_locate_single_rejects_multiple() {
        let err = locator(vec![rect(10, 10, 50, 50), rect(100, 60, 90, 90)])
            .locate_single(&frame())
            .unwrap_err();
        assert_eq!(err, LocatorError::MultipleFacesDetected(2));
    }

    #[test]
    fn test_locate_single_accepts_one() {
        let located = locator(vec![rect(100, 60, 90, 90)]).locate_single(&frame()).unwrap();
        assert_eq!(located.candidates, 1);
    }

    #[test]
    fn test_size_filter() {
        let settings = DetectorSettings {
            min_face_size: 60,
            max_face_size: Some(100),
            ..DetectorSettings::default()
        };
        let loc = FaceLocator::new(
            Box::new(FixedDetector(vec![
                rect(0, 0, 40, 40),
                rect(0, 0, 80, 80),
                rect(0, 0, 150, 150),
            ])),
            settings,
        );
        let gray = GrayImage::new(320, 240);
        assert_eq!(loc.candidates(&gray), vec![rect(0, 0, 80, 80)]);
    }

    #[test]
    fn test_seeta_missing_model() {
        let err = SeetaDetector::load(Path::new("/nonexistent/seeta.bin"), DetectorSettings::default())
            .err()
            .unwrap();
        assert!(matches!(err, DetectorError::ModelNotFound(_)));
    }

    #[test]
    fn test_seeta_truncated_model() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = SeetaDetector::load(file.path(), DetectorSettings::default())
            .err()
            .unwrap();
        match err {
            DetectorError::ModelLoad { path, .. } => {
                assert_eq!(path, file.path().display().to_string())
            }
            other => panic!("expected ModelLoad, got {other:?}"),
        }
    }
}
