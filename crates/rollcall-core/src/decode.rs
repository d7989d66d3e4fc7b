//! Data-URL decoding for webcam snapshots.

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use thiserror::Error;

const JPEG_QUALITY: u8 = 90;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("image payload is empty")]
    Empty,
    #[error("invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unreadable image: {0}")]
    Image(#[from] image::ImageError),
}

/// Split a `data:<mime>;base64,<payload>` URL and return the payload.
///
/// A string without a comma is taken to be the bare payload.
fn payload(data_url: &str) -> &str {
    match data_url.split_once(',') {
        Some((_header, encoded)) => encoded,
        None => data_url,
    }
    .trim()
}

/// Decode a base64 data URL into a colour image.
pub fn decode_data_url(data_url: &str) -> Result<DynamicImage, DecodeError> {
    let encoded = payload(data_url);
    if encoded.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    let image = image::load_from_memory(&bytes)?;

    tracing::debug!(
        bytes = bytes.len(),
        width = image.width(),
        height = image.height(),
        "decoded snapshot"
    );

    Ok(image)
}

/// Encode an image as JPEG for the reference-image archive.
pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    let rgb = image.to_rgb8();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(out)
}

/// Wrap raw JPEG bytes as a data URL.
pub fn to_data_url(jpeg: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(jpeg)
    )
}
