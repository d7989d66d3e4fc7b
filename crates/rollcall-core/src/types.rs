use serde::{Deserialize, Serialize};

/// Axis-aligned face rectangle in pixel coordinates of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl FaceRect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Gradient-orientation descriptor of a canonical face patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cosine similarity between two descriptors, in [-1, 1].
    ///
    /// Returns `None` when either vector has zero norm or the lengths differ;
    /// a degenerate descriptor cannot vouch for anyone.
    pub fn similarity(&self, other: &Descriptor) -> Option<f32> {
        if self.values.len() != other.values.len() {
            return None;
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            Some(dot / denom)
        } else {
            None
        }
    }

    /// Little-endian `f32` byte encoding used for the `students.descriptor` column.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Inverse of [`to_bytes`](Self::to_bytes). Returns `None` on a ragged blob.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        let values = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Some(Self { values })
    }
}

/// One registered student as seen by the matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub student_id: i64,
    pub name: String,
    pub descriptor: Descriptor,
}

/// Result of matching a probe descriptor against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Similarity of the accepted entry, or the best seen when nothing matched.
    pub similarity: f32,
    pub student_id: Option<i64>,
    pub name: Option<String>,
}

impl MatchResult {
    pub fn unknown(similarity: f32) -> Self {
        Self {
            matched: false,
            similarity,
            student_id: None,
            name: None,
        }
    }
}

/// Strategy for comparing a probe descriptor against a gallery of registered faces.
pub trait Matcher: Send + Sync {
    fn compare(&self, probe: &Descriptor, gallery: &[GalleryEntry], threshold: f32) -> MatchResult;
}

/// Cosine similarity matcher.
///
/// Walks the gallery in registration order and accepts the first entry whose
/// similarity is strictly greater than the threshold. Entries with a degenerate
/// descriptor are skipped.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn compare(&self, probe: &Descriptor, gallery: &[GalleryEntry], threshold: f32) -> MatchResult {
        let mut best_sim: Option<f32> = None;

        for entry in gallery {
            let Some(sim) = probe.similarity(&entry.descriptor) else {
                continue;
            };
            if sim > threshold {
                return MatchResult {
                    matched: true,
                    similarity: sim,
                    student_id: Some(entry.student_id),
                    name: Some(entry.name.clone()),
                };
            }
            best_sim = Some(best_sim.map_or(sim, |b| b.max(sim)));
        }

        MatchResult::unknown(best_sim.unwrap_or(0.0))
    }
}
