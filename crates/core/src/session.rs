// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session records and wait-state classification types.
//!
//! A session is the harness's handle on one interactive child process. It
//! owns a slot while live and never transitions out of a terminal status.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a harness session.
    pub struct SessionId;
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    WaitingCheckpoint,
    Completed,
    Failed,
}

impl SessionStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::WaitingCheckpoint => "waiting_checkpoint",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SessionStatus::Running),
            "waiting_checkpoint" => Some(SessionStatus::WaitingCheckpoint),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session record as persisted and reported to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Slot number in `1..=max_sessions`; unique among non-terminal sessions.
    pub slot: u32,
    pub status: SessionStatus,
    pub working_dir: PathBuf,
    /// The command this session was started with (empty for bare sessions).
    #[serde(default)]
    pub current_command: String,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    /// OS process id while the child is alive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Updated on every output read; drives the timeout sweeper.
    pub last_polled_at_ms: u64,
}

/// A timestamped fragment of child output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    pub session_id: SessionId,
    pub seq: u64,
    pub timestamp_ms: u64,
    /// Nominal stream name; PTY output is combined.
    pub stream: String,
    pub data: Vec<u8>,
}

impl OutputChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Classification of a child blocked at a terminal prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaitType {
    /// Numbered selection menu; `options` counts the numbered entries.
    Menu { options: usize },
    /// Yes/no style confirmation.
    Permission,
    /// "Press enter to continue" style pause.
    Continue,
    /// Free-form input prompt.
    Prompt,
}

impl WaitType {
    pub fn label(self) -> &'static str {
        match self {
            WaitType::Menu { .. } => "menu",
            WaitType::Permission => "permission",
            WaitType::Continue => "continue",
            WaitType::Prompt => "prompt",
        }
    }
}

impl std::fmt::Display for WaitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
