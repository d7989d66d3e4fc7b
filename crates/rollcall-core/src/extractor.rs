//! HOG descriptor extraction from canonical face patches.

use crate::alignment::CANONICAL_SIZE;
use crate::types::Descriptor;
use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use imageproc::hog::{hog, HogOptions};
use thiserror::Error;

// --- Descriptor geometry ---
const HOG_ORIENTATIONS: usize = 9;
const HOG_CELL_SIDE: usize = 8;
/// Block side in cells (16 px).
const HOG_BLOCK_SIDE: usize = 2;
/// Block stride in cells (8 px).
const HOG_BLOCK_STRIDE: usize = 1;
/// Light blur applied before gradients, roughly a 3×3 kernel.
const NOISE_SIGMA: f32 = 1.0;

/// Descriptor length for a 128×128 patch: 15×15 blocks of 2×2 cells × 9 bins.
pub const DESCRIPTOR_LEN: usize = {
    let cells = CANONICAL_SIZE as usize / HOG_CELL_SIDE;
    let blocks = (cells - HOG_BLOCK_SIDE) / HOG_BLOCK_STRIDE + 1;
    blocks * blocks * HOG_BLOCK_SIDE * HOG_BLOCK_SIDE * HOG_ORIENTATIONS
};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("expected a {expected}x{expected} patch, got {width}x{height}")]
    WrongPatchSize { expected: u32, width: u32, height: u32 },
    #[error("hog: {0}")]
    Hog(String),
}

fn options() -> HogOptions {
    HogOptions::new(
        HOG_ORIENTATIONS,
        false,
        HOG_CELL_SIDE,
        HOG_BLOCK_SIDE,
        HOG_BLOCK_STRIDE,
    )
}

/// Compute the identity descriptor of a canonical face patch.
pub fn extract(patch: &GrayImage) -> Result<Descriptor, ExtractError> {
    let (width, height) = patch.dimensions();
    if width != CANONICAL_SIZE || height != CANONICAL_SIZE {
        return Err(ExtractError::WrongPatchSize {
            expected: CANONICAL_SIZE,
            width,
            height,
        });
    }

    let smoothed = gaussian_blur_f32(patch, NOISE_SIGMA);
    let values = hog(&smoothed, options()).map_err(ExtractError::Hog)?;

    if values.len() != DESCRIPTOR_LEN {
        return Err(ExtractError::Hog(format!(
            "expected {DESCRIPTOR_LEN}-dim descriptor, got {}",
            values.len()
        )));
    }

    Ok(Descriptor::new(values))
}
