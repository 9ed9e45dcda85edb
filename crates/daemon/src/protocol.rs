// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for coordinator communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload (see
//! `protocol_wire`). Every reply carries `success`; failures add a
//! human-readable `error` and a stable `code`.

use corral_core::{Checkpoint, CheckpointType, OrchestrationState, Plan, Session};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Protocol version for the hello handshake.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

fn default_lines() -> usize {
    100
}

fn default_true() -> bool {
    true
}

/// Session list filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionFilter {
    #[default]
    All,
    Running,
    Completed,
    Failed,
}

/// Request from a coordinator to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Get daemon status
    Status,

    /// Request daemon shutdown
    Shutdown {
        /// Terminate all live sessions before stopping
        #[serde(default)]
        kill: bool,
    },

    /// List sessions with the free-slot count
    ListSessions {
        #[serde(default)]
        filter: SessionFilter,
    },

    /// Start a session (admission barriers apply)
    StartSession {
        working_dir: PathBuf,
        #[serde(default)]
        command: Option<String>,
    },

    /// End a session (idempotent)
    EndSession { id: String },

    /// Tail of the reconstructed output
    GetOutput {
        id: String,
        #[serde(default = "default_lines")]
        lines: usize,
    },

    /// Send input; smart keystrokes unless `press_enter` is false
    SendInput {
        id: String,
        input: String,
        #[serde(default = "default_true")]
        press_enter: bool,
    },

    /// Resize the session terminal
    Resize { id: String, cols: u16, rows: u16 },

    /// Priority-ordered checkpoint lookup (explicit, then pattern)
    GetCheckpoint { id: String },

    /// Answer the current checkpoint via smart input
    RespondCheckpoint { id: String, response: String },

    /// Post an explicit checkpoint (flips the session to waiting)
    SignalCheckpoint {
        id: String,
        checkpoint_type: String,
        #[serde(default)]
        workflow: Option<String>,
        #[serde(default)]
        phase: Option<u32>,
        summary: String,
        #[serde(default)]
        next_command: Option<String>,
        #[serde(default)]
        data: Option<Value>,
    },

    /// Post a worker message; returns whether a response is required
    WorkerReport {
        id: String,
        message_type: String,
        /// JSON-encoded payload
        payload: String,
    },

    /// Block until the coordinator responds, the message expires, or the
    /// timeout elapses
    WorkerAwait {
        id: String,
        message_id: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Post the coordinator reply to a pending worker message
    Respond {
        id: String,
        worker_message_id: String,
        response_type: String,
        /// JSON-encoded payload
        payload: String,
    },

    /// Pending worker messages split by whether they require a response
    GetPending {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        message_types: Option<Vec<String>>,
    },

    /// Scan a project tree and reconcile orchestration state
    SyncProjectState { project_root: PathBuf },

    /// Overwrite stored execution state
    SetExecutionState {
        project_root: PathBuf,
        highest_executed_phase: u32,
        #[serde(default)]
        highest_executing_phase: Option<u32>,
        #[serde(default)]
        highest_executing_plan: Option<u32>,
        #[serde(default)]
        force_reset: bool,
    },

    /// Mark a phase verified, clearing the verify gate when it matches
    MarkPhaseVerified { project_root: PathBuf, phase: u32 },

    /// Block until a watched session changes state
    WaitForStateChange {
        timeout_ms: u64,
        #[serde(default)]
        session_ids: Option<Vec<String>>,
    },
}

/// Stable error codes surfaced to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    SlotsExhausted,
    SpawnInProgress,
    SessionNotFound,
    SessionAlreadyEnded,
    SessionNotActive,
    #[serde(rename = "EXECUTION_LIMIT")]
    ExecutionLimit,
    #[serde(rename = "VERIFY_GATE")]
    VerifyGate,
    #[serde(rename = "PLANNING_LIMIT")]
    PlanningLimit,
    #[serde(rename = "InvalidJSON")]
    InvalidJson,
    InvalidResponseType,
    MessageNotFound,
    MessageExpired,
    MessageTimeout,
    CheckpointMalformed,
    InvalidTimeout,
    Internal,
}

/// Where a checkpoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    Explicit,
    Pattern,
}

/// Checkpoint lookup result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub has_checkpoint: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,
    /// The explicit record, when source is `explicit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Checkpoint>,
    /// Parsed type, when source is `pattern`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_type: Option<CheckpointType>,
    /// Typed fields, when source is `pattern`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,
    /// Raw matched block for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// A pending worker message as reported to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub payload: Value,
    pub timestamp_ms: u64,
    pub requires_response: bool,
}

/// A resolved state change as reported to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChangeView {
    pub session_id: String,
    pub change: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_options: Option<usize>,
}

/// Typed reply bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Body {
    Pong {
        version: String,
    },
    Status {
        uptime_ms: u64,
        live_sessions: usize,
        free_slots: u32,
        max_sessions: u32,
    },
    ShuttingDown,
    Sessions {
        sessions: Vec<Session>,
        free_slots: u32,
    },
    Session {
        session: Session,
    },
    Ended {
        session_id: String,
        already_ended: bool,
    },
    Output {
        session_id: String,
        lines: Vec<String>,
        line_count: usize,
    },
    Sent,
    Resized,
    CheckpointResult {
        #[serde(flatten)]
        info: CheckpointInfo,
    },
    Signalled {
        checkpoint_id: String,
    },
    Reported {
        message_id: String,
        requires_response: bool,
    },
    AwaitResult {
        response_type: String,
        payload: Value,
    },
    Pending {
        checkpoints: Vec<MessageView>,
        status_updates: Vec<MessageView>,
    },
    Responded {
        response_id: String,
    },
    Sync {
        state: OrchestrationState,
        plans: Vec<Plan>,
        max_plan_phase: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_execute_phase: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_phase: Option<u32>,
    },
    ExecutionState {
        state: OrchestrationState,
    },
    StateChange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        change: Option<StateChangeView>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// Uniform reply envelope: `success` plus either a typed body or an error.
///
/// Serialization flattens the body so coordinators see
/// `{ success, result, ...typed fields }` at the top level. Deserialization
/// is hand-written: a flattened `Option` of a tagged enum cannot express
/// "no body" through derive, so the `result` tag decides.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
}

impl<'de> Deserialize<'de> for Reply {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let value = Value::deserialize(deserializer)?;
        let object = value
            .as_object()
            .ok_or_else(|| D::Error::custom("reply must be a JSON object"))?;

        let success = object
            .get("success")
            .and_then(Value::as_bool)
            .ok_or_else(|| D::Error::missing_field("success"))?;
        let error = object
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string);
        let code = match object.get("code") {
            Some(code) => {
                Some(serde_json::from_value(code.clone()).map_err(D::Error::custom)?)
            }
            None => None,
        };
        let body = if object.contains_key("result") {
            Some(serde_json::from_value(value.clone()).map_err(D::Error::custom)?)
        } else {
            None
        };

        Ok(Reply {
            success,
            error,
            code,
            body,
        })
    }
}

impl Reply {
    pub fn ok(body: Body) -> Self {
        Self {
            success: true,
            error: None,
            code: None,
            body: Some(body),
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            success: true,
            error: None,
            code: None,
            body: None,
        }
    }

    pub fn fail(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            code: Some(code),
            body: None,
        }
    }

    pub fn fail_uncoded(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            code: None,
            body: None,
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
