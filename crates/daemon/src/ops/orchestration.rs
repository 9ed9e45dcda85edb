// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration operations: project sync, execution-state overwrite, and
//! phase verification.

use super::gate_error;
use crate::daemon::Daemon;
use crate::protocol::{Body, Reply};
use corral_core::PlanStatus;
use corral_engine::{DependencyGraph, OrchestrationConfig, ProtocolDir, SyncOutcome};
use std::collections::BTreeMap;
use std::path::Path;

pub fn sync(daemon: &Daemon, project_root: &Path) -> Reply {
    let outcome = match daemon.gate.sync_project(project_root) {
        Ok(outcome) => outcome,
        Err(e) => return gate_error(e),
    };

    mirror_sync(daemon, project_root, &outcome);

    Reply::ok(Body::Sync {
        state: outcome.state,
        plans: outcome.plans,
        max_plan_phase: outcome.max_plan_phase,
        max_execute_phase: outcome.max_execute_phase,
        current_phase: outcome.current_phase,
    })
}

/// Echo the sync result into `.orchestration/` for cooperating tools.
fn mirror_sync(daemon: &Daemon, project_root: &Path, outcome: &SyncOutcome) {
    let mirror = ProtocolDir::new(project_root);

    let config = OrchestrationConfig {
        version: 1,
        spec_dir: "specs".to_string(),
        max_sessions: daemon.supervisor.max_sessions(),
        flags: BTreeMap::new(),
    };
    if let Err(e) = mirror.write_config(&config) {
        tracing::debug!(project_root = %project_root.display(), error = %e, "config mirror write failed");
    }

    let mut graph = DependencyGraph {
        timestamp_ms: daemon.clock.now_ms(),
        ..Default::default()
    };
    for plan in &outcome.plans {
        let id = plan.id.to_string();
        graph.plans.push(id.clone());
        match plan.status {
            PlanStatus::Executed | PlanStatus::Verified => graph.completed.push(id),
            PlanStatus::Executing => graph.running.push(id),
            PlanStatus::Planned => graph.available.push(id),
        }
    }
    if let Err(e) = mirror.write_dependency_graph(&graph) {
        tracing::debug!(project_root = %project_root.display(), error = %e, "graph mirror write failed");
    }
}

pub fn set_execution_state(
    daemon: &Daemon,
    project_root: &Path,
    highest_executed_phase: u32,
    highest_executing_phase: Option<u32>,
    highest_executing_plan: Option<u32>,
    force_reset: bool,
) -> Reply {
    match daemon.gate.set_execution_state(
        project_root,
        highest_executed_phase,
        highest_executing_phase,
        highest_executing_plan,
        force_reset,
    ) {
        Ok(state) => Reply::ok(Body::ExecutionState { state }),
        Err(e) => gate_error(e),
    }
}

pub fn mark_phase_verified(daemon: &Daemon, project_root: &Path, phase: u32) -> Reply {
    match daemon.gate.mark_phase_verified(project_root, phase) {
        Ok(state) => Reply::ok(Body::ExecutionState { state }),
        Err(e) => gate_error(e),
    }
}
