// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session table accessors.

use crate::store::{StorageError, Store};
use corral_core::{Session, SessionId, SessionStatus};
use rusqlite::{params, Row};
use std::path::PathBuf;

fn session_from_row(row: &Row<'_>) -> Result<Session, rusqlite::Error> {
    let status_str: String = row.get("status")?;
    let status = SessionStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown session status: {status_str}").into(),
        )
    })?;
    let working_dir: String = row.get("working_dir")?;
    Ok(Session {
        id: SessionId::new(row.get::<_, String>("id")?),
        slot: row.get("slot")?,
        status,
        working_dir: PathBuf::from(working_dir),
        current_command: row.get("current_command")?,
        started_at_ms: row.get("started_at_ms")?,
        ended_at_ms: row.get("ended_at_ms")?,
        pid: row.get("pid")?,
        last_polled_at_ms: row.get("last_polled_at_ms")?,
    })
}

impl Store {
    pub fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions
             (id, slot, status, working_dir, current_command, started_at_ms,
              ended_at_ms, pid, last_polled_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                session.id.as_str(),
                session.slot,
                session.status.as_str(),
                session.working_dir.to_string_lossy().into_owned(),
                session.current_command,
                session.started_at_ms,
                session.ended_at_ms,
                session.pid,
                session.last_polled_at_ms,
            ],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM sessions WHERE id = ?1")?;
        let mut rows = stmt.query_map([id.as_str()], session_from_row)?;
        Ok(rows.next().transpose()?)
    }

    /// Look up a session by exact id or unique prefix (like git hashes).
    pub fn find_session(&self, id_or_prefix: &str) -> Result<Option<Session>, StorageError> {
        if let Some(session) = self.get_session(&SessionId::new(id_or_prefix))? {
            return Ok(Some(session));
        }
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM sessions WHERE id LIKE ?1 || '%'")?;
        let matches: Vec<Session> = stmt
            .query_map([id_or_prefix], session_from_row)?
            .collect::<Result<_, _>>()?;
        // Only return if unambiguous
        if matches.len() == 1 {
            Ok(matches.into_iter().next())
        } else {
            Ok(None)
        }
    }

    pub fn list_sessions(
        &self,
        filter: Option<SessionStatus>,
    ) -> Result<Vec<Session>, StorageError> {
        let conn = self.conn.lock();
        let mut out = Vec::new();
        match filter {
            Some(status) => {
                let mut stmt = conn
                    .prepare("SELECT * FROM sessions WHERE status = ?1 ORDER BY started_at_ms")?;
                for row in stmt.query_map([status.as_str()], session_from_row)? {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare("SELECT * FROM sessions ORDER BY started_at_ms")?;
                for row in stmt.query_map([], session_from_row)? {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    /// Sessions in `running` or `waiting_checkpoint` status.
    pub fn active_sessions(&self) -> Result<Vec<Session>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM sessions
             WHERE status IN ('running', 'waiting_checkpoint')
             ORDER BY slot",
        )?;
        let rows: Vec<Session> = stmt
            .query_map([], session_from_row)?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// Transition a session's status.
    ///
    /// Terminal rows are never updated (once completed or failed, a session
    /// stays that way). Returns whether a row changed.
    pub fn update_session_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
        ended_at_ms: Option<u64>,
    ) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let ended = if status.is_terminal() { ended_at_ms } else { None };
        let changed = conn.execute(
            "UPDATE sessions SET status = ?2, ended_at_ms = COALESCE(?3, ended_at_ms)
             WHERE id = ?1 AND status NOT IN ('completed', 'failed')",
            params![id.as_str(), status.as_str(), ended],
        )?;
        Ok(changed > 0)
    }

    pub fn touch_session_polled(&self, id: &SessionId, now_ms: u64) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET last_polled_at_ms = ?2 WHERE id = ?1",
            params![id.as_str(), now_ms],
        )?;
        Ok(())
    }

    pub fn set_session_pid(&self, id: &SessionId, pid: Option<u32>) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET pid = ?2 WHERE id = ?1",
            params![id.as_str(), pid],
        )?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
