//! Versioned in-memory index of registered face descriptors.
//!
//! Registration appends or replaces a single entry; there is no global
//! retrain. Every mutation bumps `version` so callers can tell which
//! snapshot a match was made against.

use crate::types::{Descriptor, GalleryEntry, MatchResult, Matcher};

#[derive(Debug, Default, Clone)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
    version: u64,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a gallery from persisted entries, keeping their order.
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        Self {
            entries,
            version: 1,
        }
    }

    /// Insert a student's descriptor, or overwrite it if the student is already indexed.
    pub fn upsert(&mut self, student_id: i64, name: &str, descriptor: Descriptor) {
        match self.entries.iter_mut().find(|e| e.student_id == student_id) {
            Some(existing) => {
                existing.name = name.to_string();
                existing.descriptor = descriptor;
            }
            None => self.entries.push(GalleryEntry {
                student_id,
                name: name.to_string(),
                descriptor,
            }),
        }
        self.version += 1;
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn best_match(&self, matcher: &dyn Matcher, probe: &Descriptor, threshold: f32) -> MatchResult {
        matcher.compare(probe, &self.entries, threshold)
    }
}
