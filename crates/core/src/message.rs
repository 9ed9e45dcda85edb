// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker messages and coordinator responses.
//!
//! Children post structured messages through the operation surface. Three
//! message types require a paired coordinator response; the pairing rules
//! are enforced here so neither side can invent new combinations.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a worker or orchestrator message.
    pub struct MessageId;
}

/// Message kinds a worker may post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMessageType {
    SessionReady,
    TaskStarted,
    ProgressUpdate,
    VerificationNeeded,
    DecisionNeeded,
    ActionNeeded,
    TaskCompleted,
    TaskFailed,
}

impl WorkerMessageType {
    /// The `*_needed` types block the worker until the coordinator answers.
    pub fn requires_response(self) -> bool {
        matches!(
            self,
            WorkerMessageType::VerificationNeeded
                | WorkerMessageType::DecisionNeeded
                | WorkerMessageType::ActionNeeded
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkerMessageType::SessionReady => "session_ready",
            WorkerMessageType::TaskStarted => "task_started",
            WorkerMessageType::ProgressUpdate => "progress_update",
            WorkerMessageType::VerificationNeeded => "verification_needed",
            WorkerMessageType::DecisionNeeded => "decision_needed",
            WorkerMessageType::ActionNeeded => "action_needed",
            WorkerMessageType::TaskCompleted => "task_completed",
            WorkerMessageType::TaskFailed => "task_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "session_ready" => Some(WorkerMessageType::SessionReady),
            "task_started" => Some(WorkerMessageType::TaskStarted),
            "progress_update" => Some(WorkerMessageType::ProgressUpdate),
            "verification_needed" => Some(WorkerMessageType::VerificationNeeded),
            "decision_needed" => Some(WorkerMessageType::DecisionNeeded),
            "action_needed" => Some(WorkerMessageType::ActionNeeded),
            "task_completed" => Some(WorkerMessageType::TaskCompleted),
            "task_failed" => Some(WorkerMessageType::TaskFailed),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkerMessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response kinds the coordinator may post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    VerificationResult,
    DecisionMade,
    ActionCompleted,
    AbortTask,
}

impl ResponseType {
    /// Whether this response type is a valid answer to `msg`.
    ///
    /// `AbortTask` answers any of the `*_needed` requests; the other
    /// response types pair one-to-one.
    pub fn answers(self, msg: WorkerMessageType) -> bool {
        match self {
            ResponseType::AbortTask => msg.requires_response(),
            ResponseType::VerificationResult => msg == WorkerMessageType::VerificationNeeded,
            ResponseType::DecisionMade => msg == WorkerMessageType::DecisionNeeded,
            ResponseType::ActionCompleted => msg == WorkerMessageType::ActionNeeded,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::VerificationResult => "verification_result",
            ResponseType::DecisionMade => "decision_made",
            ResponseType::ActionCompleted => "action_completed",
            ResponseType::AbortTask => "abort_task",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "verification_result" => Some(ResponseType::VerificationResult),
            "decision_made" => Some(ResponseType::DecisionMade),
            "action_completed" => Some(ResponseType::ActionCompleted),
            "abort_task" => Some(ResponseType::AbortTask),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of a worker message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Responded,
    Expired,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Responded => "responded",
            MessageStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MessageStatus::Pending),
            "responded" => Some(MessageStatus::Responded),
            "expired" => Some(MessageStatus::Expired),
            _ => None,
        }
    }
}

/// A structured item posted by a child via the operation surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerMessage {
    pub id: MessageId,
    pub session_id: SessionId,
    #[serde(rename = "type")]
    pub message_type: WorkerMessageType,
    pub payload: serde_json::Value,
    pub timestamp_ms: u64,
    pub status: MessageStatus,
}

/// Coordinator → worker reply to a pending message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorResponse {
    pub id: MessageId,
    pub session_id: SessionId,
    pub in_response_to: MessageId,
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub payload: serde_json::Value,
    pub timestamp_ms: u64,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
