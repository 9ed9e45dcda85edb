// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker message operations.

use super::message_error;
use crate::daemon::Daemon;
use crate::protocol::{Body, ErrorCode, MessageView, Reply};
use corral_core::{MessageId, WorkerMessage, WorkerMessageType};
use corral_engine::ProtocolDir;
use serde_json::json;

fn view(message: &WorkerMessage) -> MessageView {
    MessageView {
        id: message.id.to_string(),
        session_id: message.session_id.to_string(),
        message_type: message.message_type.as_str().to_string(),
        payload: message.payload.clone(),
        timestamp_ms: message.timestamp_ms,
        requires_response: message.message_type.requires_response(),
    }
}

fn parse_payload(payload: &str) -> Result<serde_json::Value, Reply> {
    if payload.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(payload).map_err(|e| {
        Reply::fail(ErrorCode::InvalidJson, format!("invalid JSON payload: {e}"))
    })
}

pub fn report(daemon: &Daemon, id: &str, message_type: &str, payload: &str) -> Reply {
    let session = match daemon.resolve_session(id) {
        Ok(session) => session,
        Err(reply) => return reply,
    };
    let payload = match parse_payload(payload) {
        Ok(payload) => payload,
        Err(reply) => return reply,
    };

    let message = match daemon.messages.report(&session.id, message_type, payload) {
        Ok(message) => message,
        Err(e) => return message_error(e),
    };

    // Mirror the latest worker status for out-of-band inspection
    let mirror = ProtocolDir::new(&session.working_dir);
    let status = json!({
        "sessionId": session.id.as_str(),
        "type": message.message_type.as_str(),
        "payload": message.payload,
        "timestampMs": message.timestamp_ms,
    });
    if let Err(e) = mirror.write_session_status(&session.id, &status) {
        tracing::debug!(session_id = %session.id, error = %e, "status mirror write failed");
    }

    Reply::ok(Body::Reported {
        message_id: message.id.to_string(),
        requires_response: message.message_type.requires_response(),
    })
}

pub async fn await_response(
    daemon: &Daemon,
    id: &str,
    message_id: &str,
    timeout_ms: Option<u64>,
) -> Reply {
    if let Err(reply) = daemon.resolve_session(id) {
        return reply;
    }
    match daemon
        .messages
        .await_response(&MessageId::new(message_id), timeout_ms)
        .await
    {
        Ok(response) => Reply::ok(Body::AwaitResult {
            response_type: response.response_type.as_str().to_string(),
            payload: response.payload,
        }),
        Err(e) => message_error(e),
    }
}

pub fn respond(
    daemon: &Daemon,
    id: &str,
    worker_message_id: &str,
    response_type: &str,
    payload: &str,
) -> Reply {
    let session = match daemon.resolve_session(id) {
        Ok(session) => session,
        Err(reply) => return reply,
    };
    let payload = match parse_payload(payload) {
        Ok(payload) => payload,
        Err(reply) => return reply,
    };
    match daemon.messages.respond(
        &session.id,
        &MessageId::new(worker_message_id),
        response_type,
        payload,
    ) {
        Ok(response) => Reply::ok(Body::Responded {
            response_id: response.id.to_string(),
        }),
        Err(e) => message_error(e),
    }
}

pub fn pending(daemon: &Daemon, id: Option<&str>, message_types: Option<&[String]>) -> Reply {
    let session_id = match id {
        Some(id) => match daemon.resolve_session(id) {
            Ok(session) => Some(session.id),
            Err(reply) => return reply,
        },
        None => None,
    };

    let types: Option<Vec<WorkerMessageType>> = match message_types {
        Some(names) => {
            let mut types = Vec::with_capacity(names.len());
            for name in names {
                match WorkerMessageType::parse(name) {
                    Some(t) => types.push(t),
                    None => {
                        return Reply::fail_uncoded(format!("unknown message type: {name}"));
                    }
                }
            }
            Some(types)
        }
        None => None,
    };

    match daemon
        .messages
        .pending(session_id.as_ref(), types.as_deref())
    {
        Ok((checkpoints, status_updates)) => Reply::ok(Body::Pending {
            checkpoints: checkpoints.iter().map(view).collect(),
            status_updates: status_updates.iter().map(view).collect(),
        }),
        Err(e) => message_error(e),
    }
}
