// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output chunk persistence. Append-only; chunks reconstruct in seq order.

use crate::store::{StorageError, Store};
use corral_core::{OutputChunk, SessionId};
use rusqlite::{params, Row};

fn chunk_from_row(row: &Row<'_>) -> Result<OutputChunk, rusqlite::Error> {
    Ok(OutputChunk {
        session_id: SessionId::new(row.get::<_, String>("session_id")?),
        seq: row.get("seq")?,
        timestamp_ms: row.get("timestamp_ms")?,
        stream: row.get("stream")?,
        data: row.get("data")?,
    })
}

impl Store {
    /// Append a chunk, assigning the next per-session sequence number.
    pub fn append_output(
        &self,
        session_id: &SessionId,
        timestamp_ms: u64,
        stream: &str,
        data: &[u8],
    ) -> Result<u64, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let seq: u64 = tx.query_row(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM outputs WHERE session_id = ?1",
            [session_id.as_str()],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO outputs (session_id, seq, timestamp_ms, stream, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session_id.as_str(), seq, timestamp_ms, stream, data],
        )?;
        tx.commit()?;
        Ok(seq)
    }

    /// All chunks for a session in seq order.
    pub fn outputs_all(&self, session_id: &SessionId) -> Result<Vec<OutputChunk>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM outputs WHERE session_id = ?1 ORDER BY seq")?;
        let rows: Vec<OutputChunk> = stmt
            .query_map([session_id.as_str()], chunk_from_row)?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// The most recent `limit` chunks in seq order.
    pub fn output_tail(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<OutputChunk>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM (
                SELECT * FROM outputs WHERE session_id = ?1 ORDER BY seq DESC LIMIT ?2
             ) ORDER BY seq",
        )?;
        let rows: Vec<OutputChunk> = stmt
            .query_map(params![session_id.as_str(), limit as i64], chunk_from_row)?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
#[path = "outputs_tests.rs"]
mod tests;
