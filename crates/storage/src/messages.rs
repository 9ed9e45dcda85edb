// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker message and orchestrator response accessors.

use crate::store::{StorageError, Store};
use corral_core::{
    MessageId, MessageStatus, OrchestratorResponse, ResponseType, SessionId, WorkerMessage,
    WorkerMessageType,
};
use rusqlite::{params, Row};

fn payload_from_str(s: &str) -> serde_json::Value {
    serde_json::from_str(s).unwrap_or(serde_json::Value::Null)
}

fn message_from_row(row: &Row<'_>) -> Result<WorkerMessage, rusqlite::Error> {
    let type_str: String = row.get("type")?;
    let status_str: String = row.get("status")?;
    let payload: String = row.get("payload")?;
    let message_type = WorkerMessageType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown message type: {type_str}").into(),
        )
    })?;
    let status = MessageStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown message status: {status_str}").into(),
        )
    })?;
    Ok(WorkerMessage {
        id: MessageId::new(row.get::<_, String>("id")?),
        session_id: SessionId::new(row.get::<_, String>("session_id")?),
        message_type,
        payload: payload_from_str(&payload),
        timestamp_ms: row.get("timestamp_ms")?,
        status,
    })
}

fn response_from_row(row: &Row<'_>) -> Result<OrchestratorResponse, rusqlite::Error> {
    let type_str: String = row.get("type")?;
    let payload: String = row.get("payload")?;
    let response_type = ResponseType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown response type: {type_str}").into(),
        )
    })?;
    Ok(OrchestratorResponse {
        id: MessageId::new(row.get::<_, String>("id")?),
        session_id: SessionId::new(row.get::<_, String>("session_id")?),
        in_response_to: MessageId::new(row.get::<_, String>("in_response_to")?),
        response_type,
        payload: payload_from_str(&payload),
        timestamp_ms: row.get("timestamp_ms")?,
    })
}

impl Store {
    pub fn insert_worker_message(&self, msg: &WorkerMessage) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO worker_messages (id, session_id, type, payload, timestamp_ms, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                msg.id.as_str(),
                msg.session_id.as_str(),
                msg.message_type.as_str(),
                msg.payload.to_string(),
                msg.timestamp_ms,
                msg.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_worker_message(&self, id: &MessageId) -> Result<Option<WorkerMessage>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM worker_messages WHERE id = ?1")?;
        let mut rows = stmt.query_map([id.as_str()], message_from_row)?;
        Ok(rows.next().transpose()?)
    }

    /// Transition a message's status. Only pending messages move; a message
    /// that already responded or expired stays put.
    pub fn set_message_status(
        &self,
        id: &MessageId,
        status: MessageStatus,
    ) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE worker_messages SET status = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id.as_str(), status.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Pending messages, optionally filtered by session and message types.
    pub fn pending_messages(
        &self,
        session_id: Option<&SessionId>,
        types: Option<&[WorkerMessageType]>,
    ) -> Result<Vec<WorkerMessage>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM worker_messages WHERE status = 'pending' ORDER BY timestamp_ms",
        )?;
        let rows: Vec<WorkerMessage> = stmt
            .query_map([], message_from_row)?
            .collect::<Result<_, _>>()?;
        Ok(rows
            .into_iter()
            .filter(|m| session_id.is_none_or(|s| &m.session_id == s))
            .filter(|m| types.is_none_or(|ts| ts.contains(&m.message_type)))
            .collect())
    }

    /// Insert the coordinator's reply. The unique index on `in_response_to`
    /// guarantees at most one response per worker message.
    pub fn insert_orchestrator_response(
        &self,
        resp: &OrchestratorResponse,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO orchestrator_messages
             (id, session_id, in_response_to, type, payload, timestamp_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                resp.id.as_str(),
                resp.session_id.as_str(),
                resp.in_response_to.as_str(),
                resp.response_type.as_str(),
                resp.payload.to_string(),
                resp.timestamp_ms,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::DuplicateResponse(resp.in_response_to.to_string())
            }
            other => StorageError::Sqlite(other),
        })?;
        Ok(())
    }

    /// The coordinator response paired to a worker message, if any.
    pub fn response_for(
        &self,
        message_id: &MessageId,
    ) -> Result<Option<OrchestratorResponse>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT * FROM orchestrator_messages WHERE in_response_to = ?1")?;
        let mut rows = stmt.query_map([message_id.as_str()], response_from_row)?;
        Ok(rows.next().transpose()?)
    }
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
