//! Attendance ledger with a per-student dedup window.
//!
//! The "latest record" read and the insert happen inside one IMMEDIATE
//! transaction on the store's connection thread, so two recognitions of the
//! same student can never both pass the window check.

use crate::store::{from_unix, record_from_row, AttendanceRecord, Store, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, TransactionBehavior};

/// Outcome of a mark attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// A new record was written.
    Marked(AttendanceRecord),
    /// The student already has a record inside the window; nothing written.
    AlreadyMarked(AttendanceRecord),
}

#[derive(Clone)]
pub struct Ledger {
    store: Store,
    window_secs: i64,
}

impl Ledger {
    pub fn new(store: Store, window_secs: i64) -> Self {
        Self { store, window_secs }
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    /// Record attendance for `student_id` at `now` unless the latest record is
    /// no more than `window_secs` old.
    pub async fn mark(&self, student_id: i64, now: DateTime<Utc>) -> Result<MarkOutcome, StoreError> {
        let window = self.window_secs;
        let ts = now.timestamp();

        let outcome = self
            .store
            .connection()
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let latest = tx
                    .query_row(
                        "SELECT id, student_id, timestamp FROM attendance
                         WHERE student_id = ?1
                         ORDER BY timestamp DESC, id DESC LIMIT 1",
                        params![student_id],
                        record_from_row,
                    )
                    .optional()?;

                if let Some(previous) = latest {
                    if ts - previous.timestamp.timestamp() <= window {
                        tx.commit()?;
                        return Ok(MarkOutcome::AlreadyMarked(previous));
                    }
                }

                tx.execute(
                    "INSERT INTO attendance (student_id, timestamp) VALUES (?1, ?2)",
                    params![student_id, ts],
                )?;
                let record = AttendanceRecord {
                    id: tx.last_insert_rowid(),
                    student_id,
                    timestamp: from_unix(ts),
                };
                tx.commit()?;
                Ok(MarkOutcome::Marked(record))
            })
            .await?;

        match &outcome {
            MarkOutcome::Marked(r) => {
                tracing::info!(student_id, record_id = r.id, "attendance marked")
            }
            MarkOutcome::AlreadyMarked(r) => tracing::info!(
                student_id,
                previous = %r.timestamp,
                "attendance already marked inside window"
            ),
        }

        Ok(outcome)
    }
}
