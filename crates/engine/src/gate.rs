// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration admission gate.
//!
//! The gate owns the per-project orchestration state behind one mutex so
//! admission decisions can fast-reject without a database round-trip. The
//! store stays authoritative; the cache is reloaded on first touch and kept
//! in step on every mutation.
//!
//! Barriers enforced on session start:
//! 1. at most one execute session at a time,
//! 2. executes may not run more than one phase past an unverified phase,
//! 3. planning may run at most two plan units ahead of the executing plan.

use crate::command::{classify_command, CommandClass};
use crate::scanner::{scan_project, DiscoveredPlan};
use corral_core::{OrchestrationState, Plan, PlanId, PlanStatus, SessionId};
use corral_storage::{StorageError, Store};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Gate errors. Admission rejections carry enough detail for the
/// coordinator to decide what to do next.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("another execute is already running in slot {slot}: {command}")]
    ExecutionLimit {
        session_id: SessionId,
        slot: u32,
        command: String,
    },

    #[error(
        "phase {pending_verify_phase} is awaiting verification; executes are limited to phase {max_execute_phase}, requested {requested_phase}"
    )]
    VerifyGate {
        pending_verify_phase: u32,
        max_execute_phase: u32,
        requested_phase: u32,
    },

    #[error("planning phase {requested_phase} exceeds the plan-ahead window; max allowed plan is {max_allowed_plan}")]
    PlanningLimit {
        requested_phase: u32,
        max_allowed_plan: PlanId,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

struct ProjectState {
    state: OrchestrationState,
    /// Last phase explicitly cleared via mark_phase_verified; the scanner
    /// must not re-raise pending_verify_phase to it.
    cleared_verify_phase: Option<u32>,
}

/// Result of a project sync, returned to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub state: OrchestrationState,
    pub plans: Vec<Plan>,
    /// Highest phase the coordinator may plan.
    pub max_plan_phase: u32,
    /// Highest phase an execute may target (None = unbounded).
    pub max_execute_phase: Option<u32>,
    /// Phase cursor from the project's STATE.md, if present.
    pub current_phase: Option<u32>,
}

/// The orchestration gate.
pub struct Gate {
    store: Store,
    projects: Mutex<HashMap<PathBuf, ProjectState>>,
}

impl Gate {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            projects: Mutex::new(HashMap::new()),
        }
    }

    /// Decide whether `command` may start in `project_root` given the
    /// currently live sessions. Admitted executes mark their plan
    /// `executing` and advance the executing cursor.
    pub fn admit(
        &self,
        project_root: &Path,
        command: &str,
        live: &[(SessionId, u32, String)],
    ) -> Result<CommandClass, GateError> {
        let class = classify_command(command);
        match &class {
            CommandClass::Execute { phase, plan, path } => {
                self.admit_execute(project_root, *phase, *plan, path, live)?;
            }
            CommandClass::Plan { phase } => {
                self.admit_plan(project_root, *phase)?;
            }
            CommandClass::Verify { .. } | CommandClass::Other => {}
        }
        Ok(class)
    }

    fn admit_execute(
        &self,
        project_root: &Path,
        phase: u32,
        plan: u32,
        path: &str,
        live: &[(SessionId, u32, String)],
    ) -> Result<(), GateError> {
        // Barrier 1: exactly one execute across all slots
        for (session_id, slot, running_command) in live {
            if classify_command(running_command).is_execute() {
                return Err(GateError::ExecutionLimit {
                    session_id: session_id.clone(),
                    slot: *slot,
                    command: running_command.clone(),
                });
            }
        }

        let mut projects = self.projects.lock();
        let project = self.load_project(&mut projects, project_root)?;

        // Barrier 2: verify gate
        if let Some(pending) = project.state.pending_verify_phase {
            let max = pending + 1;
            if phase > max {
                return Err(GateError::VerifyGate {
                    pending_verify_phase: pending,
                    max_execute_phase: max,
                    requested_phase: phase,
                });
            }
        }

        // Side effects: plan becomes executing, cursor advances
        let id = PlanId::new(phase, plan);
        if !self.store.set_plan_status(project_root, id, PlanStatus::Executing)? {
            self.store.upsert_plan(&Plan {
                project_root: project_root.to_path_buf(),
                id,
                path: PathBuf::from(path),
                status: PlanStatus::Executing,
            })?;
        }
        project.state.highest_executing_phase = phase;
        project.state.highest_executing_plan = plan;
        self.store
            .upsert_orchestration_state(project_root, &project.state)?;
        Ok(())
    }

    fn admit_plan(&self, project_root: &Path, phase: u32) -> Result<(), GateError> {
        let mut projects = self.projects.lock();
        let project = self.load_project(&mut projects, project_root)?;

        let (base, rolled) = self.plan_window(project_root, &project.state)?;
        let next_plan = self.store.max_plan_in_phase(project_root, phase)?.unwrap_or(0) + 1;
        let candidate = PlanId::new(phase, next_plan);

        let admitted =
            candidate <= base || rolled.is_some_and(|r| candidate <= r);
        if !admitted {
            let mut max_allowed_plan = rolled.unwrap_or(base);
            if max_allowed_plan.plan == u32::MAX {
                // Phase-bound window: any plan number within the phase
                max_allowed_plan = PlanId::new(max_allowed_plan.phase, 99);
            }
            return Err(GateError::PlanningLimit {
                requested_phase: phase,
                max_allowed_plan,
            });
        }

        if phase > project.state.highest_planned_phase {
            project.state.highest_planned_phase = phase;
            self.store
                .upsert_orchestration_state(project_root, &project.state)?;
        }
        Ok(())
    }

    /// Plan-ahead window: two plan units past the executing plan.
    ///
    /// With nothing executing, the window derives from the executed phase
    /// (`highest_executed + 2`, floor 2, any plan number). When the store
    /// knows the executing phase's last plan, the remainder of the window
    /// rolls into the next phase.
    fn plan_window(
        &self,
        project_root: &Path,
        state: &OrchestrationState,
    ) -> Result<(PlanId, Option<PlanId>), GateError> {
        if state.highest_executing_phase == 0 {
            let max_phase = (state.highest_executed_phase + 2).max(2);
            return Ok((PlanId::new(max_phase, u32::MAX), None));
        }
        let e = state.highest_executing_phase;
        let p = state.highest_executing_plan;
        let base = PlanId::new(e, p + 2);
        let rolled = match self.store.max_plan_in_phase(project_root, e)? {
            Some(last) if p + 2 > last => Some(PlanId::new(e + 1, p + 2 - last)),
            _ => None,
        };
        Ok((base, rolled))
    }

    /// Overwrite the stored execution state. The coordinator is the source
    /// of truth for on-disk progress; downgrades are applied (with a
    /// warning when large), and `force_reset` drops every row first.
    pub fn set_execution_state(
        &self,
        project_root: &Path,
        highest_executed_phase: u32,
        highest_executing_phase: Option<u32>,
        highest_executing_plan: Option<u32>,
        force_reset: bool,
    ) -> Result<OrchestrationState, GateError> {
        let mut projects = self.projects.lock();

        if force_reset {
            self.store.clear_project(project_root)?;
            projects.remove(project_root);
        }

        let project = self.load_project(&mut projects, project_root)?;
        let previous = project.state.highest_executed_phase;
        if previous >= 2 && highest_executed_phase + 2 <= previous {
            tracing::warn!(
                project_root = %project_root.display(),
                previous,
                new = highest_executed_phase,
                "large execution-state downgrade"
            );
        }

        project.state.highest_executed_phase = highest_executed_phase;
        if let Some(phase) = highest_executing_phase {
            project.state.highest_executing_phase = phase;
        }
        if let Some(plan) = highest_executing_plan {
            project.state.highest_executing_plan = plan;
        }
        self.store
            .upsert_orchestration_state(project_root, &project.state)?;
        Ok(project.state.clone())
    }

    /// Mark every plan of `phase` verified; clears the verify gate when it
    /// was pending on this phase. Idempotent.
    pub fn mark_phase_verified(
        &self,
        project_root: &Path,
        phase: u32,
    ) -> Result<OrchestrationState, GateError> {
        self.store
            .set_phase_status(project_root, phase, PlanStatus::Verified)?;

        let mut projects = self.projects.lock();
        let project = self.load_project(&mut projects, project_root)?;
        if project.state.pending_verify_phase == Some(phase) {
            project.state.pending_verify_phase = None;
        }
        project.cleared_verify_phase = Some(phase);
        self.store
            .upsert_orchestration_state(project_root, &project.state)?;
        Ok(project.state.clone())
    }

    /// React to a session reaching a terminal state.
    ///
    /// A successful execute marks its plan executed and raises the executed
    /// cursor; a successful verify for the pending phase clears the gate.
    pub fn on_session_terminal(
        &self,
        project_root: &Path,
        command: &str,
        success: bool,
    ) -> Result<(), GateError> {
        if !success {
            return Ok(());
        }
        match classify_command(command) {
            CommandClass::Execute { phase, plan, .. } => {
                self.store.set_plan_status(
                    project_root,
                    PlanId::new(phase, plan),
                    PlanStatus::Executed,
                )?;
                let mut projects = self.projects.lock();
                let project = self.load_project(&mut projects, project_root)?;
                if phase > project.state.highest_executed_phase {
                    project.state.highest_executed_phase = phase;
                }
                self.store
                    .upsert_orchestration_state(project_root, &project.state)?;
            }
            CommandClass::Verify { phase } => {
                let pending = {
                    let mut projects = self.projects.lock();
                    let project = self.load_project(&mut projects, project_root)?;
                    project.state.pending_verify_phase
                };
                if pending == Some(phase) {
                    self.mark_phase_verified(project_root, phase)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Walk the project tree, reconcile the store, and derive the limits
    /// the coordinator plans against. Idempotent for an unchanged tree.
    pub fn sync_project(&self, project_root: &Path) -> Result<SyncOutcome, GateError> {
        let scan = scan_project(project_root);
        for discovered in &scan.plans {
            self.store.upsert_plan(&to_plan(project_root, discovered))?;
        }
        let plans = self.store.list_plans(project_root)?;

        let mut projects = self.projects.lock();
        let project = self.load_project(&mut projects, project_root)?;

        project.state.highest_planned_phase = plans.iter().map(|p| p.id.phase).max().unwrap_or(0);
        project.state.highest_executed_phase = highest_fully(&plans, PlanStatus::Executed);

        let pending = pending_verify_phase(&plans, project.cleared_verify_phase);
        project.state.pending_verify_phase = pending;

        self.store
            .upsert_orchestration_state(project_root, &project.state)?;

        let max_plan_phase = (project.state.highest_executed_phase + 2).max(2);
        Ok(SyncOutcome {
            state: project.state.clone(),
            max_plan_phase,
            max_execute_phase: project.state.max_execute_phase(),
            current_phase: scan.current_phase,
            plans,
        })
    }

    /// Current cached (or stored) state for a project, for status queries.
    pub fn project_state(&self, project_root: &Path) -> Result<OrchestrationState, GateError> {
        let mut projects = self.projects.lock();
        let project = self.load_project(&mut projects, project_root)?;
        Ok(project.state.clone())
    }

    fn load_project<'a>(
        &self,
        projects: &'a mut HashMap<PathBuf, ProjectState>,
        project_root: &Path,
    ) -> Result<&'a mut ProjectState, StorageError> {
        match projects.entry(project_root.to_path_buf()) {
            std::collections::hash_map::Entry::Occupied(occupied) => Ok(occupied.into_mut()),
            std::collections::hash_map::Entry::Vacant(vacant) => {
                let state = self
                    .store
                    .get_orchestration_state(project_root)?
                    .unwrap_or_default();
                Ok(vacant.insert(ProjectState {
                    state,
                    cleared_verify_phase: None,
                }))
            }
        }
    }
}

fn to_plan(project_root: &Path, discovered: &DiscoveredPlan) -> Plan {
    Plan {
        project_root: project_root.to_path_buf(),
        id: discovered.id,
        path: discovered.path.clone(),
        status: discovered.status,
    }
}

/// Highest phase where every plan is at least `status`.
fn highest_fully(plans: &[Plan], status: PlanStatus) -> u32 {
    let mut phases: Vec<u32> = plans.iter().map(|p| p.id.phase).collect();
    phases.sort_unstable();
    phases.dedup();
    phases
        .into_iter()
        .filter(|phase| {
            plans
                .iter()
                .filter(|p| p.id.phase == *phase)
                .all(|p| p.status >= status)
        })
        .max()
        .unwrap_or(0)
}

/// Smallest phase where every plan is executed and none is verified.
fn pending_verify_phase(plans: &[Plan], cleared: Option<u32>) -> Option<u32> {
    let mut phases: Vec<u32> = plans.iter().map(|p| p.id.phase).collect();
    phases.sort_unstable();
    phases.dedup();
    phases.into_iter().find(|phase| {
        if cleared == Some(*phase) {
            return false;
        }
        let in_phase: Vec<&Plan> = plans.iter().filter(|p| p.id.phase == *phase).collect();
        in_phase
            .iter()
            .all(|p| p.status == PlanStatus::Executed || p.status == PlanStatus::Verified)
            && !in_phase.iter().any(|p| p.status == PlanStatus::Verified)
    })
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
