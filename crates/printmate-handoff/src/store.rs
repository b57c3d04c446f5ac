// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preview payload mailbox backed by SQLite.
//
// One record collection keyed by payload id. Records are transient: the
// consumer deletes on first read (at-most-once delivery), and anything the
// consumer never picked up is swept once it outlives the TTL.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info, instrument};

use printmate_core::PreviewPayload;
use printmate_core::error::{PrintmateError, Result};

/// File name of the shared store inside the data directory.
pub const STORE_FILE_NAME: &str = "printmate.db";

/// Schema for the preview mailbox table.
const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS pdf_previews (
        id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        created_at TEXT NOT NULL,
        bytes BLOB NOT NULL
    )
"#;

/// Shared mailbox for preview payloads.
///
/// All methods are synchronous because `rusqlite` does not support async
/// natively; the polling consumer sleeps between calls instead.
pub struct PreviewStore {
    conn: Connection,
}

impl PreviewStore {
    /// Open (or create) the store at the given path.
    ///
    /// WAL journal mode lets the producer write while the viewer process is
    /// mid-poll.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| PrintmateError::Storage(format!("open: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| PrintmateError::Storage(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| PrintmateError::Storage(format!("create table: {e}")))?;

        info!("preview store opened");
        Ok(Self { conn })
    }

    /// Open an in-memory store (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PrintmateError::Storage(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| PrintmateError::Storage(format!("create table: {e}")))?;

        debug!("in-memory preview store opened");
        Ok(Self { conn })
    }

    /// Write a payload for the viewer to pick up.
    #[instrument(skip(self, payload), fields(id = %payload.id, bytes_len = payload.bytes.len()))]
    pub fn put(&self, payload: &PreviewPayload) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO pdf_previews (id, filename, created_at, bytes)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    payload.id,
                    payload.filename,
                    payload.created_at.to_rfc3339(),
                    payload.bytes,
                ],
            )
            .map_err(|e| PrintmateError::Storage(format!("put payload: {e}")))?;

        info!(id = %payload.id, "payload stored for pickup");
        Ok(())
    }

    /// Consume a payload: read and delete in one transaction, so a record is
    /// handed out at most once even with a racing second reader.
    #[instrument(skip(self), fields(id))]
    pub fn take(&mut self, id: &str) -> Result<Option<PreviewPayload>> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| PrintmateError::Storage(format!("begin take: {e}")))?;

        let record = tx
            .query_row(
                "SELECT id, filename, created_at, bytes FROM pdf_previews WHERE id = ?1",
                params![id],
                row_to_payload,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(PrintmateError::Storage(format!("read payload: {other}"))),
            })?;

        if record.is_some() {
            tx.execute("DELETE FROM pdf_previews WHERE id = ?1", params![id])
                .map_err(|e| PrintmateError::Storage(format!("delete payload: {e}")))?;
        }

        tx.commit()
            .map_err(|e| PrintmateError::Storage(format!("commit take: {e}")))?;

        if record.is_some() {
            info!(id, "payload consumed");
        }
        Ok(record)
    }

    /// Delete one payload without reading it (producer-side rollback when
    /// the viewer never opened).
    pub fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM pdf_previews WHERE id = ?1", params![id])
            .map_err(|e| PrintmateError::Storage(format!("delete payload: {e}")))?;
        Ok(())
    }

    /// Remove every record older than `ttl`. Returns the number swept.
    #[instrument(skip(self))]
    pub fn sweep_expired(&self, ttl: Duration) -> Result<usize> {
        let cutoff: DateTime<Utc> = Utc::now() - ttl;
        let swept = self
            .conn
            .execute(
                "DELETE FROM pdf_previews WHERE created_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .map_err(|e| PrintmateError::Storage(format!("sweep: {e}")))?;

        if swept > 0 {
            debug!(swept, "expired payloads swept");
        }
        Ok(swept)
    }
}

/// Map a SQLite row to a `PreviewPayload`.
fn row_to_payload(row: &rusqlite::Row<'_>) -> rusqlite::Result<PreviewPayload> {
    let id: String = row.get(0)?;
    let filename: String = row.get(1)?;
    let created_at_str: String = row.get(2)?;
    let bytes: Vec<u8> = row.get(3)?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(PreviewPayload {
        id,
        filename,
        created_at,
        bytes,
    })
}
