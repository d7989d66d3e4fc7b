//! Registration and recognition workflows.
//!
//! `AttendanceService` owns every piece of shared state (store, ledger,
//! engine handle and gallery index) and is cloned into request handlers.

use crate::archive::{self, Archive};
use crate::config::Config;
use crate::engine::{self, EngineError, EngineHandle, FaceMode, Input};
use crate::error::AppError;
use crate::ledger::{Ledger, MarkOutcome};
use crate::store::{AttendanceEntry, AttendanceRecord, Store, StoreError, Student};
use chrono::{DateTime, Utc};
use rollcall_core::detector::DetectorError;
use rollcall_core::{
    CosineMatcher, FaceLocator, Gallery, LocatorError, MatchResult, Matcher, SeetaDetector,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("engine: {0}")]
    Engine(#[from] EngineError),
}

/// A completed registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub student: Student,
    pub image_path: PathBuf,
}

/// Outcome of a recognition request.
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Marked {
        name: String,
        record: AttendanceRecord,
        similarity: f32,
    },
    AlreadyMarked {
        name: String,
        previous: AttendanceRecord,
    },
    NotRecognized {
        best_similarity: f32,
    },
    NoFace,
    NoRegisteredFaces,
}

/// Outcome of an identify-only request.
#[derive(Debug, Clone, PartialEq)]
pub enum Identification {
    Known { name: String, similarity: f32 },
    Unknown,
    NoFace,
}

/// What a snapshot turned out to contain.
enum Probe {
    NoFace,
    EmptyGallery,
    Compared(MatchResult),
}

/// Summary of an archive rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub indexed: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct AttendanceService {
    store: Store,
    ledger: Ledger,
    archive: Archive,
    engine: EngineHandle,
    gallery: Arc<RwLock<Gallery>>,
    matcher: Arc<dyn Matcher>,
    threshold: f32,
}

impl AttendanceService {
    /// Open the store, load the detector model and warm the gallery from disk.
    pub async fn open(config: &Config) -> Result<Self, StartupError> {
        let store = Store::open(&config.db_path).await?;
        let detector = SeetaDetector::load(&config.detector_model, config.detector.clone())?;
        let locator = FaceLocator::new(Box::new(detector), config.detector.clone());
        Self::from_parts(
            store,
            locator,
            Archive::new(&config.faces_dir),
            config.similarity_threshold,
            config.dedup_window_secs,
        )
        .await
    }

    /// Assemble a service from already constructed parts.
    pub async fn from_parts(
        store: Store,
        locator: FaceLocator,
        archive: Archive,
        threshold: f32,
        dedup_window_secs: i64,
    ) -> Result<Self, StartupError> {
        let engine = engine::spawn_engine(locator)?;
        let gallery = Gallery::from_entries(store.load_gallery().await?);
        tracing::info!(
            faces = gallery.len(),
            threshold,
            dedup_window_secs,
            "gallery loaded"
        );

        Ok(Self {
            ledger: Ledger::new(store.clone(), dedup_window_secs),
            store,
            archive,
            engine,
            gallery: Arc::new(RwLock::new(gallery)),
            matcher: Arc::new(CosineMatcher),
            threshold,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn gallery_version(&self) -> u64 {
        self.gallery.read().await.version()
    }

    pub async fn gallery_len(&self) -> usize {
        self.gallery.read().await.len()
    }

    /// Register (or re-register) `name` from a snapshot containing exactly one face.
    pub async fn register(&self, name: &str, data_url: &str, now: DateTime<Utc>) -> Result<Registration, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::MissingInput("Name is required"));
        }

        let analysis = self
            .engine
            .analyze(Input::DataUrl(data_url.to_string()), FaceMode::Single, true)
            .await?;

        // Archive first: a failed write must leave neither the store nor the
        // gallery changed.
        let jpeg = analysis.jpeg.unwrap_or_default();
        let image_path = self.archive.save(name, &jpeg, now).await?;

        let student = match self.store.upsert_student(name, &analysis.descriptor, now).await {
            Ok(student) => student,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&image_path).await {
                    tracing::warn!(path = %image_path.display(), error = %rm, "failed to remove orphaned reference image");
                }
                return Err(e.into());
            }
        };

        let version = {
            let mut gallery = self.gallery.write().await;
            gallery.upsert(student.id, &student.name, analysis.descriptor);
            gallery.version()
        };

        tracing::info!(
            student_id = student.id,
            name = %student.name,
            gallery_version = version,
            path = %image_path.display(),
            "face registered"
        );

        Ok(Registration { student, image_path })
    }

    /// Identify the largest face in a snapshot and mark attendance.
    pub async fn recognize(&self, data_url: &str, now: DateTime<Utc>) -> Result<Recognition, AppError> {
        let result = match self.match_snapshot(data_url).await? {
            Probe::NoFace => return Ok(Recognition::NoFace),
            Probe::EmptyGallery => return Ok(Recognition::NoRegisteredFaces),
            Probe::Compared(result) => result,
        };

        let (Some(student_id), Some(name)) = (result.student_id, result.name) else {
            tracing::info!(best_similarity = result.similarity, "face not recognized");
            return Ok(Recognition::NotRecognized {
                best_similarity: result.similarity,
            });
        };

        tracing::info!(student_id, name = %name, similarity = result.similarity, "face recognized");

        Ok(match self.ledger.mark(student_id, now).await? {
            MarkOutcome::Marked(record) => Recognition::Marked {
                name,
                record,
                similarity: result.similarity,
            },
            MarkOutcome::AlreadyMarked(previous) => Recognition::AlreadyMarked { name, previous },
        })
    }

    /// Identify the largest face in a snapshot without touching the ledger.
    pub async fn identify(&self, data_url: &str) -> Result<Identification, AppError> {
        Ok(match self.match_snapshot(data_url).await? {
            Probe::NoFace => Identification::NoFace,
            Probe::Compared(MatchResult {
                matched: true,
                name: Some(name),
                similarity,
                ..
            }) => Identification::Known { name, similarity },
            Probe::Compared(_) | Probe::EmptyGallery => Identification::Unknown,
        })
    }

    async fn match_snapshot(&self, data_url: &str) -> Result<Probe, AppError> {
        let analysis = match self
            .engine
            .analyze(Input::DataUrl(data_url.to_string()), FaceMode::Largest, false)
            .await
        {
            Ok(analysis) => analysis,
            Err(EngineError::Locator(LocatorError::NoFaceDetected | LocatorError::OutOfFrame)) => {
                tracing::debug!("no face in snapshot");
                return Ok(Probe::NoFace);
            }
            Err(e) => return Err(e.into()),
        };

        let gallery = self.gallery.read().await;
        if gallery.is_empty() {
            return Ok(Probe::EmptyGallery);
        }
        let result = gallery.best_match(self.matcher.as_ref(), &analysis.descriptor, self.threshold);
        tracing::debug!(
            gallery_version = gallery.version(),
            matched = result.matched,
            similarity = result.similarity,
            "snapshot matched against gallery"
        );
        Ok(Probe::Compared(result))
    }

    /// Re-derive descriptors from the reference-image archive (newest image per
    /// name) and index them.
    ///
    /// Archived images are matched to existing students by slug, so a student
    /// keeps their row and spelling; only names with no record are created.
    pub async fn rebuild_from_archive(&self, now: DateTime<Utc>) -> Result<RebuildReport, AppError> {
        let mut report = RebuildReport::default();

        let mut known: HashMap<String, String> = HashMap::new();
        for student in self.store.list_students().await? {
            known.entry(archive::slug(&student.name)).or_insert(student.name);
        }

        for face in self.archive.scan().await? {
            let name = known
                .get(&archive::slug(&face.name))
                .cloned()
                .unwrap_or_else(|| face.name.clone());

            let bytes = tokio::fs::read(&face.path).await?;
            let analysis = match self
                .engine
                .analyze(Input::Bytes(bytes), FaceMode::Largest, false)
                .await
            {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!(path = %face.path.display(), error = %e, "skipping archived image");
                    report.skipped += 1;
                    continue;
                }
            };

            let student = self.store.upsert_student(&name, &analysis.descriptor, now).await?;
            self.gallery
                .write()
                .await
                .upsert(student.id, &student.name, analysis.descriptor);
            report.indexed += 1;
        }

        tracing::info!(indexed = report.indexed, skipped = report.skipped, "gallery rebuilt from archive");
        Ok(report)
    }

    pub async fn recent_attendance(&self, limit: usize) -> Result<Vec<AttendanceEntry>, AppError> {
        Ok(self.store.recent_attendance(limit).await?)
    }
}
