// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint table accessors.
//!
//! Invariant: at most one pending checkpoint per session. Inserting a new
//! checkpoint resolves any prior pending one in the same transaction.

use crate::store::{StorageError, Store};
use corral_core::{Checkpoint, CheckpointId, CheckpointType, SessionId};
use rusqlite::{params, Row};

fn checkpoint_from_row(row: &Row<'_>) -> Result<Checkpoint, rusqlite::Error> {
    let type_str: String = row.get("type")?;
    let checkpoint_type = CheckpointType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown checkpoint type: {type_str}").into(),
        )
    })?;
    let data: Option<String> = row.get("data")?;
    Ok(Checkpoint {
        id: CheckpointId::new(row.get::<_, String>("id")?),
        session_id: SessionId::new(row.get::<_, String>("session_id")?),
        checkpoint_type,
        workflow: row.get("workflow")?,
        phase: row.get("phase")?,
        summary: row.get("summary")?,
        next_command: row.get("next_command")?,
        data: data.and_then(|d| serde_json::from_str(&d).ok()),
        created_at_ms: row.get("created_at_ms")?,
        resolved_at_ms: row.get("resolved_at_ms")?,
    })
}

impl Store {
    /// Insert a checkpoint, superseding any pending one for the session.
    pub fn insert_checkpoint(&self, cp: &Checkpoint) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE checkpoints SET resolved_at_ms = ?2
             WHERE session_id = ?1 AND resolved_at_ms IS NULL",
            params![cp.session_id.as_str(), cp.created_at_ms],
        )?;
        tx.execute(
            "INSERT INTO checkpoints
             (id, session_id, type, workflow, phase, summary, next_command, data,
              created_at_ms, resolved_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                cp.id.as_str(),
                cp.session_id.as_str(),
                cp.checkpoint_type.as_str(),
                cp.workflow,
                cp.phase,
                cp.summary,
                cp.next_command,
                cp.data.as_ref().map(|d| d.to_string()),
                cp.created_at_ms,
                cp.resolved_at_ms,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// The pending checkpoint for a session, if any.
    pub fn pending_checkpoint(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Checkpoint>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM checkpoints
             WHERE session_id = ?1 AND resolved_at_ms IS NULL
             ORDER BY created_at_ms DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map([session_id.as_str()], checkpoint_from_row)?;
        Ok(rows.next().transpose()?)
    }

    pub fn resolve_checkpoint(&self, id: &CheckpointId, now_ms: u64) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE checkpoints SET resolved_at_ms = ?2
             WHERE id = ?1 AND resolved_at_ms IS NULL",
            params![id.as_str(), now_ms],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
#[path = "checkpoints_tests.rs"]
mod tests;
