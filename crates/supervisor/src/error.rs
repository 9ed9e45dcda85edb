// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor errors

use corral_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the session supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("All {max} session slots are occupied")]
    SlotsExhausted { max: u32 },

    #[error("another spawn is already in progress")]
    SpawnInProgress,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session is not active: {0}")]
    SessionNotActive(String),

    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    #[error("PTY error: {0}")]
    Pty(String),

    #[error("timeout must be between 1000 and 300000 ms, got {0}")]
    InvalidTimeout(u64),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
