// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project `.orchestration/` mirror.
//!
//! An on-disk echo of DB state for crash inspection and for cooperating
//! tools that cannot reach the database. It is a cache, never a source of
//! truth: admission decisions never read it. Every write is an atomic
//! whole-file replacement (write to a temp file, then rename).

use corral_core::{Checkpoint, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolDirError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("write conflict on {path}: already registered for write by session {holder}")]
    WriteConflict { path: PathBuf, holder: String },
}

/// Minimal key-value configuration mirrored as `config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    pub version: u32,
    pub spec_dir: String,
    pub max_sessions: u32,
    #[serde(default)]
    pub flags: BTreeMap<String, String>,
}

/// Coarse plan-graph snapshot mirrored as `dependency-graph.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub plans: Vec<String>,
    pub completed: Vec<String>,
    pub running: Vec<String>,
    pub blocked: Vec<String>,
    pub available: Vec<String>,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Read,
    Write,
}

/// One entry in `active-files.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveFile {
    pub path: PathBuf,
    pub session_id: SessionId,
    pub plan_id: String,
    pub operation: FileOperation,
    pub started_at_ms: u64,
}

/// Handle on one project's `.orchestration/` directory.
#[derive(Debug, Clone)]
pub struct ProtocolDir {
    root: PathBuf,
}

impl ProtocolDir {
    pub fn new(project_root: &Path) -> Self {
        Self {
            root: project_root.join(".orchestration"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn write_config(&self, config: &OrchestrationConfig) -> Result<(), ProtocolDirError> {
        let bytes = serde_yaml::to_string(config)?;
        self.atomic_write(&self.root.join("config.yaml"), bytes.as_bytes())
    }

    pub fn write_dependency_graph(
        &self,
        graph: &DependencyGraph,
    ) -> Result<(), ProtocolDirError> {
        let bytes = serde_json::to_vec_pretty(graph)?;
        self.atomic_write(&self.root.join("dependency-graph.json"), &bytes)
    }

    /// Register a file operation, rejecting conflicting writes: a write on
    /// path P conflicts with an existing write registration on P by any
    /// other session.
    pub fn register_file_op(&self, entry: ActiveFile) -> Result<(), ProtocolDirError> {
        let mut entries = self.active_files()?;
        if entry.operation == FileOperation::Write {
            if let Some(existing) = entries.iter().find(|e| {
                e.operation == FileOperation::Write
                    && e.path == entry.path
                    && e.session_id != entry.session_id
            }) {
                return Err(ProtocolDirError::WriteConflict {
                    path: entry.path,
                    holder: existing.session_id.to_string(),
                });
            }
        }
        entries.push(entry);
        self.write_active_files(&entries)
    }

    /// Drop every registration held by a session (it ended).
    pub fn release_session_files(&self, session_id: &SessionId) -> Result<(), ProtocolDirError> {
        let mut entries = self.active_files()?;
        entries.retain(|e| &e.session_id != session_id);
        self.write_active_files(&entries)
    }

    pub fn active_files(&self) -> Result<Vec<ActiveFile>, ProtocolDirError> {
        let path = self.root.join("active-files.json");
        match std::fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_active_files(&self, entries: &[ActiveFile]) -> Result<(), ProtocolDirError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        self.atomic_write(&self.root.join("active-files.json"), &bytes)
    }

    pub fn write_session_status(
        &self,
        session_id: &SessionId,
        status: &Value,
    ) -> Result<(), ProtocolDirError> {
        let bytes = serde_json::to_vec_pretty(status)?;
        self.atomic_write(&self.session_dir(session_id).join("status.json"), &bytes)
    }

    pub fn write_checkpoint(
        &self,
        session_id: &SessionId,
        checkpoint: &Checkpoint,
    ) -> Result<(), ProtocolDirError> {
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        self.atomic_write(
            &self.session_dir(session_id).join("checkpoint.json"),
            &bytes,
        )
    }

    /// Remove the mirrored pending checkpoint (it was resolved).
    pub fn clear_checkpoint(&self, session_id: &SessionId) -> Result<(), ProtocolDirError> {
        let path = self.session_dir(session_id).join("checkpoint.json");
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_checkpoint_response(
        &self,
        session_id: &SessionId,
        response: &Value,
    ) -> Result<(), ProtocolDirError> {
        let bytes = serde_json::to_vec_pretty(response)?;
        self.atomic_write(
            &self.session_dir(session_id).join("checkpoint_response.json"),
            &bytes,
        )
    }

    pub fn write_result(
        &self,
        session_id: &SessionId,
        result: &Value,
    ) -> Result<(), ProtocolDirError> {
        let bytes = serde_json::to_vec_pretty(result)?;
        self.atomic_write(&self.session_dir(session_id).join("result.json"), &bytes)
    }

    fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.root.join("sessions").join(session_id.as_str())
    }

    /// Write-then-rename so readers never observe a torn file.
    fn atomic_write(&self, path: &Path, bytes: &[u8]) -> Result<(), ProtocolDirError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "protocol_dir_tests.rs"]
mod tests;
