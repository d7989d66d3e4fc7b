//! Canonical face patch extraction.
//!
//! Pads a detected face box, clamps it to the frame, crops and resizes to the
//! fixed 128×128 patch every descriptor is computed from.

use crate::types::FaceRect;
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Side length of the canonical face patch.
pub const CANONICAL_SIZE: u32 = 128;

/// Fraction of the box width/height added on each side before cropping.
const PAD_RATIO: f32 = 0.10;

/// Grow `rect` by 10% of its width and height on each side, clamped to a
/// `width`×`height` frame. Returns `None` if nothing of the box lies inside.
pub fn pad_rect(rect: &FaceRect, width: u32, height: u32) -> Option<FaceRect> {
    let pad_x = (rect.width as f32 * PAD_RATIO).round() as i64;
    let pad_y = (rect.height as f32 * PAD_RATIO).round() as i64;

    let x0 = (rect.x as i64 - pad_x).clamp(0, width as i64);
    let y0 = (rect.y as i64 - pad_y).clamp(0, height as i64);
    let x1 = (rect.x as i64 + rect.width as i64 + pad_x).clamp(0, width as i64);
    let y1 = (rect.y as i64 + rect.height as i64 + pad_y).clamp(0, height as i64);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(FaceRect {
        x: x0 as i32,
        y: y0 as i32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

/// Crop the padded face region and resize it to the canonical patch.
pub fn canonical_patch(gray: &GrayImage, rect: &FaceRect) -> Option<GrayImage> {
    let padded = pad_rect(rect, gray.width(), gray.height())?;
    let crop = imageops::crop_imm(
        gray,
        padded.x as u32,
        padded.y as u32,
        padded.width,
        padded.height,
    )
    .to_image();

    Some(imageops::resize(
        &crop,
        CANONICAL_SIZE,
        CANONICAL_SIZE,
        FilterType::Triangle,
    ))
}
