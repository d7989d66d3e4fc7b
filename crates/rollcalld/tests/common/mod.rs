#![allow(dead_code)]

use image::{DynamicImage, GrayImage, Luma};
use rollcall_core::decode::{encode_jpeg, to_data_url};
use rollcall_core::{DetectorSettings, FaceDetector, FaceLocator, FaceRect};
use rollcalld::archive::Archive;
use rollcalld::store::Store;
use rollcalld::AttendanceService;
use std::path::Path;

pub const THRESHOLD: f32 = 0.85;
pub const WINDOW_SECS: i64 = 3600;

/// Stand-in detector keyed on frame width:
/// - 200 px: one face
/// - 300 px: two faces of equal size
/// - 400 px: a small face reported first, then a larger one (see [`crowd`])
/// - anything else: none
pub struct KeyedDetector;

impl FaceDetector for KeyedDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRect> {
        match gray.width() {
            200 => vec![FaceRect { x: 50, y: 50, width: 100, height: 100 }],
            300 => vec![
                FaceRect { x: 10, y: 50, width: 100, height: 100 },
                FaceRect { x: 170, y: 50, width: 100, height: 100 },
            ],
            400 => vec![
                FaceRect { x: 10, y: 50, width: 60, height: 60 },
                FaceRect { x: 250, y: 50, width: 100, height: 100 },
            ],
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, Copy)]
pub enum Subject {
    /// Horizontal stripes.
    Jane,
    /// Vertical stripes.
    John,
}

pub fn frame(width: u32, height: u32, subject: Subject) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
        let t = match subject {
            Subject::Jane => y as f32,
            Subject::John => x as f32,
        };
        Luma([(127.5 + 120.0 * (t * std::f32::consts::PI / 8.0).sin()) as u8])
    }))
}

pub fn data_url(width: u32, height: u32, subject: Subject) -> String {
    to_data_url(&encode_jpeg(&frame(width, height, subject)).unwrap())
}

/// One clear face.
pub fn face(subject: Subject) -> String {
    data_url(200, 200, subject)
}

pub fn two_faces() -> String {
    data_url(300, 200, Subject::Jane)
}

/// Two people: a small John on the left, a larger Jane on the right.
pub fn crowd() -> String {
    let left = frame(200, 200, Subject::John);
    let right = frame(200, 200, Subject::Jane);
    let mut canvas = GrayImage::new(400, 200);
    image::imageops::replace(&mut canvas, &left.to_luma8(), 0, 0);
    image::imageops::replace(&mut canvas, &right.to_luma8(), 200, 0);
    to_data_url(&encode_jpeg(&DynamicImage::ImageLuma8(canvas)).unwrap())
}

pub fn no_face() -> String {
    data_url(100, 100, Subject::Jane)
}

pub async fn service_with_store(store: Store, faces_dir: &Path) -> AttendanceService {
    let locator = FaceLocator::new(Box::new(KeyedDetector), DetectorSettings::default());
    AttendanceService::from_parts(store, locator, Archive::new(faces_dir), THRESHOLD, WINDOW_SECS)
        .await
        .unwrap()
}

pub async fn service(faces_dir: &Path) -> AttendanceService {
    service_with_store(Store::open_in_memory().await.unwrap(), faces_dir).await
}
