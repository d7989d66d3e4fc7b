//! SQLite persistence for students and attendance records.
//!
//! All statements run on the single connection thread owned by
//! `tokio_rusqlite`, so each `call` is serialized with every other.

use chrono::{DateTime, Utc};
use rollcall_core::{Descriptor, GalleryEntry};
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS students (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT    NOT NULL,
    registered_at INTEGER NOT NULL,
    descriptor    BLOB
);
CREATE INDEX IF NOT EXISTS idx_students_name ON students(name);

CREATE TABLE IF NOT EXISTS attendance (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL REFERENCES students(id),
    timestamp  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attendance_student_ts ON attendance(student_id, timestamp);
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("student {0} not found")]
    StudentNotFound(i64),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A registered student.
#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub registered_at: DateTime<Utc>,
    pub descriptor: Option<Descriptor>,
}

/// One attendance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Attendance record joined with the student's display name.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceEntry {
    pub record: AttendanceRecord,
    pub student_name: String,
}

pub(crate) fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let blob: Option<Vec<u8>> = row.get(3)?;
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        registered_at: from_unix(row.get(2)?),
        descriptor: blob.as_deref().and_then(Descriptor::from_bytes),
    })
}

pub(crate) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: row.get(0)?,
        student_id: row.get(1)?,
        timestamp: from_unix(row.get(2)?),
    })
}

/// Clone-safe handle to the database.
#[derive(Clone)]
pub struct Store {
    conn: tokio_rusqlite::Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = tokio_rusqlite::Connection::open(path).await?;
        let store = Self { conn };
        store.init().await?;
        tracing::info!(path = %path.display(), "store opened");
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Store a descriptor under `name`. The first student with that name is
    /// updated in place; otherwise a new student is created.
    pub async fn upsert_student(
        &self,
        name: &str,
        descriptor: &Descriptor,
        now: DateTime<Utc>,
    ) -> Result<Student, StoreError> {
        let name = name.to_string();
        let blob = descriptor.to_bytes();
        let registered = now.timestamp();

        let student = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM students WHERE name = ?1 ORDER BY id LIMIT 1",
                        params![name],
                        |row| row.get(0),
                    )
                    .optional()?;

                let id = match existing {
                    Some(id) => {
                        tx.execute(
                            "UPDATE students SET descriptor = ?1 WHERE id = ?2",
                            params![blob, id],
                        )?;
                        id
                    }
                    None => {
                        tx.execute(
                            "INSERT INTO students (name, registered_at, descriptor) VALUES (?1, ?2, ?3)",
                            params![name, registered, blob],
                        )?;
                        tx.last_insert_rowid()
                    }
                };

                let student = tx.query_row(
                    "SELECT id, name, registered_at, descriptor FROM students WHERE id = ?1",
                    params![id],
                    student_from_row,
                )?;
                tx.commit()?;
                Ok(student)
            })
            .await?;

        tracing::debug!(student_id = student.id, name = %student.name, "student upserted");
        Ok(student)
    }

    pub async fn get_student(&self, id: i64) -> Result<Student, StoreError> {
        self.conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, name, registered_at, descriptor FROM students WHERE id = ?1",
                        params![id],
                        student_from_row,
                    )
                    .optional()?)
            })
            .await?
            .ok_or(StoreError::StudentNotFound(id))
    }

    pub async fn find_student_by_name(&self, name: &str) -> Result<Option<Student>, StoreError> {
        let name = name.to_string();
        Ok(self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, name, registered_at, descriptor FROM students
                         WHERE name = ?1 ORDER BY id LIMIT 1",
                        params![name],
                        student_from_row,
                    )
                    .optional()?)
            })
            .await?)
    }

    /// All students in registration order.
    pub async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        Ok(self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, registered_at, descriptor FROM students ORDER BY id",
                )?;
                let rows = stmt
                    .query_map([], student_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?)
    }

    /// Gallery entries for every student holding a well-formed descriptor.
    pub async fn load_gallery(&self) -> Result<Vec<GalleryEntry>, StoreError> {
        let students = self.list_students().await?;
        Ok(students
            .into_iter()
            .filter_map(|s| {
                s.descriptor.map(|descriptor| GalleryEntry {
                    student_id: s.id,
                    name: s.name,
                    descriptor,
                })
            })
            .collect())
    }

    /// Most recent attendance records, newest first, with student names.
    pub async fn recent_attendance(&self, limit: usize) -> Result<Vec<AttendanceEntry>, StoreError> {
        let limit = limit as i64;
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT a.id, a.student_id, a.timestamp, s.name
                     FROM attendance a JOIN students s ON s.id = a.student_id
                     ORDER BY a.timestamp DESC, a.id DESC
                     LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(params![limit], |row| {
                        Ok(AttendanceEntry {
                            record: record_from_row(row)?,
                            student_name: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?)
    }

    /// Every attendance record of one student, oldest first.
    pub async fn attendance_for(&self, student_id: i64) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, student_id, timestamp FROM attendance
                     WHERE student_id = ?1 ORDER BY timestamp, id",
                )?;
                let rows = stmt
                    .query_map(params![student_id], record_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?)
    }

    pub async fn count_students(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?))
            .await?;
        Ok(n as usize)
    }
}
