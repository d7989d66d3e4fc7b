//! rollcall-core: Face location, description and matching.
//!
//! Detects frontal faces with SeetaFace (via `rustface`), cuts a 128×128
//! canonical patch, describes it with a HOG descriptor and matches it
//! against a gallery by cosine similarity.

pub mod alignment;
pub mod decode;
pub mod detector;
pub mod extractor;
pub mod gallery;
pub mod types;

pub use detector::{DetectorSettings, FaceDetector, FaceLocator, Located, LocatorError, SeetaDetector};
pub use gallery::Gallery;
pub use types::{CosineMatcher, Descriptor, FaceRect, GalleryEntry, MatchResult, Matcher};

/// Default cosine similarity a probe must exceed to be accepted.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;
