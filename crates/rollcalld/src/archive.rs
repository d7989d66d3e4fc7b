//! Reference face image archive.
//!
//! Every successful registration leaves its snapshot on disk as
//! `<name>_<YYYYmmdd>_<HHMMSS>.jpg`, so the gallery can be rebuilt from the
//! images alone.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// An archived reference image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFace {
    pub name: String,
    pub captured_at: NaiveDateTime,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a JPEG snapshot for `name`, returning its path.
    pub async fn save(&self, name: &str, jpeg: &[u8], now: DateTime<Utc>) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name(name, now));
        tokio::fs::write(&path, jpeg).await?;
        tracing::debug!(path = %path.display(), bytes = jpeg.len(), "reference image archived");
        Ok(path)
    }

    /// Archived images, newest per name, ordered by name.
    pub async fn scan(&self) -> std::io::Result<Vec<ArchivedFace>> {
        let mut newest: BTreeMap<String, ArchivedFace> = BTreeMap::new();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(file) = path.file_name().and_then(|f| f.to_str()) else {
                continue;
            };
            let Some((name, captured_at)) = parse_file_name(file) else {
                tracing::debug!(file, "skipping unrecognised archive entry");
                continue;
            };

            let face = ArchivedFace {
                name: name.clone(),
                captured_at,
                path,
            };
            match newest.get(&name) {
                Some(existing) if existing.captured_at >= captured_at => {}
                _ => {
                    newest.insert(name, face);
                }
            }
        }

        Ok(newest.into_values().collect())
    }
}

/// `Jane Doe` at 2024-03-01 09:15:00 becomes `jane_doe_20240301_091500.jpg`.
pub fn file_name(name: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}.jpg", slug(name), now.format(STAMP_FORMAT))
}

/// Case-folded, filesystem-safe form of a display name. Two names that share
/// a slug share archive files.
pub fn slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if slug.is_empty() {
        "student".to_string()
    } else {
        slug
    }
}

/// Recover a display name and capture time from an archived file name.
///
/// The name is title-cased from the slug, so it only approximates the
/// registered spelling; match it against students with [`slug`].
pub fn parse_file_name(file: &str) -> Option<(String, NaiveDateTime)> {
    let (stem, ext) = file.rsplit_once('.')?;
    if !IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        return None;
    }

    let mut parts = stem.rsplitn(3, '_');
    let time = parts.next()?;
    let date = parts.next()?;
    let slug = parts.next()?;

    let captured_at = NaiveDateTime::parse_from_str(&format!("{date}_{time}"), STAMP_FORMAT).ok()?;
    let name = slug
        .split('_')
        .filter(|w| !w.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        return None;
    }
    Some((name, captured_at))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name("Jane Doe", at(2024, 3, 1, 9, 15, 0)),
            "jane_doe_20240301_091500.jpg"
        );
        assert_eq!(
            file_name("  ../../etc/passwd ", at(2024, 3, 1, 9, 15, 0)),
            "etcpasswd_20240301_091500.jpg"
        );
    }

    #[test]
    fn test_parse_file_name() {
        let (name, when) = parse_file_name("jane_doe_20240301_091500.jpg").unwrap();
        assert_eq!(name, "Jane Doe");
        assert_eq!(when, at(2024, 3, 1, 9, 15, 0).naive_utc());

        assert_eq!(parse_file_name("notes.txt"), None);
        assert_eq!(parse_file_name("jane.jpg"), None);
        assert_eq!(parse_file_name("jane_2024_0301.jpg"), None);
    }

    #[test]
    fn test_slug_survives_title_casing() {
        let registered = "Anne-Marie McDonald";
        let file = file_name(registered, at(2024, 3, 1, 9, 15, 0));
        let (parsed, _) = parse_file_name(&file).unwrap();
        assert_eq!(parsed, "Anne-marie Mcdonald");
        assert_eq!(slug(&parsed), slug(registered));
        assert_eq!(slug("  "), "student");
    }

    #[tokio::test]
    async fn test_save_then_scan_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path().join("known_faces"));

        archive.save("Jane Doe", b"old", at(2024, 3, 1, 9, 0, 0)).await.unwrap();
        let newer = archive.save("Jane Doe", b"new", at(2024, 3, 2, 9, 0, 0)).await.unwrap();
        archive.save("John Roe", b"x", at(2024, 3, 1, 9, 0, 0)).await.unwrap();
        tokio::fs::write(dir.path().join("known_faces/readme.md"), b"hi").await.unwrap();

        let faces = archive.scan().await.unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].name, "Jane Doe");
        assert_eq!(faces[0].path, newer);
        assert_eq!(faces[1].name, "John Roe");
    }

    #[tokio::test]
    async fn test_scan_missing_dir_is_empty() {
        let archive = Archive::new("/nonexistent/rollcall/known_faces");
        assert!(archive.scan().await.unwrap().is_empty());
    }
}
