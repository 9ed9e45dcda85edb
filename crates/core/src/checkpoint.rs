// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Explicit workflow-transition signals.
//!
//! A checkpoint is a typed pause posted by a child; it stays pending until
//! the coordinator resolves it. At most one checkpoint per session may be
//! pending at a time (the store enforces this on insert).

use crate::session::SessionId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a checkpoint.
    pub struct CheckpointId;
}

/// Kind of pause a checkpoint represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckpointType {
    Completion,
    HumanVerify,
    Decision,
    HumanAction,
    Error,
}

impl CheckpointType {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckpointType::Completion => "completion",
            CheckpointType::HumanVerify => "human-verify",
            CheckpointType::Decision => "decision",
            CheckpointType::HumanAction => "human-action",
            CheckpointType::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completion" => Some(CheckpointType::Completion),
            "human-verify" => Some(CheckpointType::HumanVerify),
            "decision" => Some(CheckpointType::Decision),
            "human-action" => Some(CheckpointType::HumanAction),
            "error" => Some(CheckpointType::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for CheckpointType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit checkpoint record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub session_id: SessionId,
    #[serde(rename = "type")]
    pub checkpoint_type: CheckpointType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<u32>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at_ms: Option<u64>,
}

impl Checkpoint {
    pub fn is_pending(&self) -> bool {
        self.resolved_at_ms.is_none()
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
