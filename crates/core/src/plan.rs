// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase/plan addressing and per-project orchestration state.
//!
//! Plans are addressed by a two-level `(phase, plan)` scheme; the harness
//! only cares that the pairs are ordered and that the filesystem encoding
//! is `NN-MM`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Two-level plan address ordered lexicographically over `(phase, plan)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanId {
    pub phase: u32,
    pub plan: u32,
}

impl PlanId {
    pub fn new(phase: u32, plan: u32) -> Self {
        Self { phase, plan }
    }

    /// Parse the `NN-MM` encoding (two digits each).
    pub fn parse(s: &str) -> Option<Self> {
        let (phase, plan) = s.split_once('-')?;
        if phase.len() != 2 || plan.len() != 2 {
            return None;
        }
        Some(Self {
            phase: phase.parse().ok()?,
            plan: plan.parse().ok()?,
        })
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{:02}", self.phase, self.plan)
    }
}

/// Lifecycle status of a discovered plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Planned,
    Executing,
    Executed,
    Verified,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Planned => "planned",
            PlanStatus::Executing => "executing",
            PlanStatus::Executed => "executed",
            PlanStatus::Verified => "verified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(PlanStatus::Planned),
            "executing" => Some(PlanStatus::Executing),
            "executed" => Some(PlanStatus::Executed),
            "verified" => Some(PlanStatus::Verified),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered filesystem plan unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub project_root: PathBuf,
    pub id: PlanId,
    pub path: PathBuf,
    pub status: PlanStatus,
}

/// Per-project orchestration state the gate decides admissions from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationState {
    #[serde(default)]
    pub highest_planned_phase: u32,
    #[serde(default)]
    pub highest_executed_phase: u32,
    #[serde(default)]
    pub highest_executing_phase: u32,
    #[serde(default)]
    pub highest_executing_plan: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_verify_phase: Option<u32>,
}

impl OrchestrationState {
    /// Highest phase an execute command may target, if the verify gate is set.
    pub fn max_execute_phase(&self) -> Option<u32> {
        self.pending_verify_phase.map(|v| v + 1)
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
