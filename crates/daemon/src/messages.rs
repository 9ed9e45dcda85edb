// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-message registry.
//!
//! Children post structured messages; the coordinator answers the
//! `*_needed` ones. `await_response` is the worker-side block: it polls the
//! store until a response lands, the message expires, or the wall-clock
//! timeout elapses. Expiry is terminal — an expired message cannot be
//! answered.

use corral_core::{
    Clock, IdGen, MessageId, MessageStatus, OrchestratorResponse, ResponseType, SessionId,
    WorkerMessage, WorkerMessageType,
};
use corral_storage::{StorageError, Store};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_AWAIT_TIMEOUT_MS: u64 = 30_000;
pub const MAX_AWAIT_TIMEOUT_MS: u64 = 300_000;
const AWAIT_POLL_MS: u64 = 500;

/// Hard TTL: a pending message older than this is expired on sight.
const MESSAGE_TTL_MS: u64 = 300_000;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("unknown response type: {0}")]
    UnknownResponseType(String),

    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error("message expired: {0}")]
    MessageExpired(String),

    #[error("message already answered: {0}")]
    AlreadyResponded(String),

    #[error("timed out waiting for a response to {0}")]
    MessageTimeout(String),

    #[error("{response} is not a valid response to {request}")]
    InvalidPairing {
        request: WorkerMessageType,
        response: ResponseType,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Registry over the store; cheap to clone.
#[derive(Clone)]
pub struct MessageRegistry {
    store: Store,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGen>,
}

impl MessageRegistry {
    pub fn new(store: Store, clock: Arc<dyn Clock>, ids: Arc<dyn IdGen>) -> Self {
        Self { store, clock, ids }
    }

    /// Record a worker message. Returns the stored message; the caller
    /// relays `requires_response` to the worker.
    pub fn report(
        &self,
        session_id: &SessionId,
        message_type: &str,
        payload: serde_json::Value,
    ) -> Result<WorkerMessage, MessageError> {
        let message_type = WorkerMessageType::parse(message_type)
            .ok_or_else(|| MessageError::UnknownMessageType(message_type.to_string()))?;
        let message = WorkerMessage {
            id: MessageId::new(self.ids.next()),
            session_id: session_id.clone(),
            message_type,
            payload,
            timestamp_ms: self.clock.now_ms(),
            status: MessageStatus::Pending,
        };
        self.store.insert_worker_message(&message)?;
        tracing::debug!(
            message_id = %message.id,
            session_id = %session_id,
            message_type = %message_type,
            "worker message posted"
        );
        Ok(message)
    }

    /// Block until the coordinator answers `message_id`.
    ///
    /// Timeout defaults to 30 s, capped at 300 s. On timeout the message is
    /// marked expired so a late response is rejected rather than silently
    /// accepted.
    pub async fn await_response(
        &self,
        message_id: &MessageId,
        timeout_ms: Option<u64>,
    ) -> Result<OrchestratorResponse, MessageError> {
        let timeout_ms = timeout_ms
            .unwrap_or(DEFAULT_AWAIT_TIMEOUT_MS)
            .min(MAX_AWAIT_TIMEOUT_MS);

        let message = self
            .store
            .get_worker_message(message_id)?
            .ok_or_else(|| MessageError::MessageNotFound(message_id.to_string()))?;
        if message.status == MessageStatus::Expired {
            return Err(MessageError::MessageExpired(message_id.to_string()));
        }

        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some(response) = self.store.response_for(message_id)? {
                return Ok(response);
            }
            if tokio::time::Instant::now() >= deadline {
                self.store
                    .set_message_status(message_id, MessageStatus::Expired)?;
                return Err(MessageError::MessageTimeout(message_id.to_string()));
            }
            tokio::time::sleep(Duration::from_millis(AWAIT_POLL_MS)).await;
        }
    }

    /// Post the coordinator's reply, validating the pairing rules.
    pub fn respond(
        &self,
        session_id: &SessionId,
        message_id: &MessageId,
        response_type: &str,
        payload: serde_json::Value,
    ) -> Result<OrchestratorResponse, MessageError> {
        let response_type = ResponseType::parse(response_type)
            .ok_or_else(|| MessageError::UnknownResponseType(response_type.to_string()))?;

        let message = self
            .store
            .get_worker_message(message_id)?
            .ok_or_else(|| MessageError::MessageNotFound(message_id.to_string()))?;

        match message.status {
            MessageStatus::Expired => {
                return Err(MessageError::MessageExpired(message_id.to_string()));
            }
            MessageStatus::Responded => {
                return Err(MessageError::AlreadyResponded(message_id.to_string()));
            }
            MessageStatus::Pending => {}
        }

        if !response_type.answers(message.message_type) {
            return Err(MessageError::InvalidPairing {
                request: message.message_type,
                response: response_type,
            });
        }

        let response = OrchestratorResponse {
            id: MessageId::new(self.ids.next()),
            session_id: session_id.clone(),
            in_response_to: message_id.clone(),
            response_type,
            payload,
            timestamp_ms: self.clock.now_ms(),
        };
        self.store.insert_orchestrator_response(&response).map_err(
            |e| match e {
                StorageError::DuplicateResponse(id) => MessageError::AlreadyResponded(id),
                other => MessageError::Storage(other),
            },
        )?;
        self.store
            .set_message_status(message_id, MessageStatus::Responded)?;
        Ok(response)
    }

    /// Pending messages split into those that require a response
    /// ("checkpoints") and plain status updates. Messages past the hard TTL
    /// are expired on the way out.
    #[allow(clippy::type_complexity)]
    pub fn pending(
        &self,
        session_id: Option<&SessionId>,
        types: Option<&[WorkerMessageType]>,
    ) -> Result<(Vec<WorkerMessage>, Vec<WorkerMessage>), MessageError> {
        let now = self.clock.now_ms();
        let mut checkpoints = Vec::new();
        let mut status_updates = Vec::new();
        for message in self.store.pending_messages(session_id, types)? {
            if now.saturating_sub(message.timestamp_ms) > MESSAGE_TTL_MS {
                self.store
                    .set_message_status(&message.id, MessageStatus::Expired)?;
                continue;
            }
            if message.message_type.requires_response() {
                checkpoints.push(message);
            } else {
                status_updates.push(message);
            }
        }
        Ok((checkpoints, status_updates))
    }
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
