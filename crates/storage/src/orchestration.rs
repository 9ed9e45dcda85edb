// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration state and plan table accessors.

use crate::store::{StorageError, Store};
use corral_core::{OrchestrationState, Plan, PlanId, PlanStatus};
use rusqlite::{params, Row};
use std::path::{Path, PathBuf};

fn plan_from_row(root: &Path) -> impl Fn(&Row<'_>) -> Result<Plan, rusqlite::Error> + '_ {
    move |row| {
        let status_str: String = row.get("status")?;
        let status = PlanStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown plan status: {status_str}").into(),
            )
        })?;
        let path: String = row.get("path")?;
        Ok(Plan {
            project_root: root.to_path_buf(),
            id: PlanId::new(row.get("phase")?, row.get("plan")?),
            path: PathBuf::from(path),
            status,
        })
    }
}

fn root_key(root: &Path) -> String {
    root.to_string_lossy().into_owned()
}

impl Store {
    /// Overwrite the orchestration state for a project root.
    pub fn upsert_orchestration_state(
        &self,
        root: &Path,
        state: &OrchestrationState,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO orchestration_state
             (project_root, highest_planned_phase, highest_executed_phase,
              highest_executing_phase, highest_executing_plan, pending_verify_phase)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(project_root) DO UPDATE SET
                highest_planned_phase = excluded.highest_planned_phase,
                highest_executed_phase = excluded.highest_executed_phase,
                highest_executing_phase = excluded.highest_executing_phase,
                highest_executing_plan = excluded.highest_executing_plan,
                pending_verify_phase = excluded.pending_verify_phase",
            params![
                root_key(root),
                state.highest_planned_phase,
                state.highest_executed_phase,
                state.highest_executing_phase,
                state.highest_executing_plan,
                state.pending_verify_phase,
            ],
        )?;
        Ok(())
    }

    pub fn get_orchestration_state(
        &self,
        root: &Path,
    ) -> Result<Option<OrchestrationState>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT * FROM orchestration_state WHERE project_root = ?1")?;
        let mut rows = stmt.query_map([root_key(root)], |row| {
            Ok(OrchestrationState {
                highest_planned_phase: row.get("highest_planned_phase")?,
                highest_executed_phase: row.get("highest_executed_phase")?,
                highest_executing_phase: row.get("highest_executing_phase")?,
                highest_executing_plan: row.get("highest_executing_plan")?,
                pending_verify_phase: row.get("pending_verify_phase")?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    /// Delete all orchestration rows for a project root (force reset).
    pub fn clear_project(&self, root: &Path) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM orchestration_state WHERE project_root = ?1",
            [root_key(root)],
        )?;
        tx.execute("DELETE FROM plans WHERE project_root = ?1", [root_key(root)])?;
        tx.commit()?;
        Ok(())
    }

    /// Upsert a discovered plan, keeping the further-along status on conflict.
    pub fn upsert_plan(&self, plan: &Plan) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT status FROM plans WHERE project_root = ?1 AND phase = ?2 AND plan = ?3",
                params![root_key(&plan.project_root), plan.id.phase, plan.id.plan],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        let status = match existing.as_deref().and_then(PlanStatus::parse) {
            Some(prev) if prev > plan.status => prev,
            _ => plan.status,
        };
        tx.execute(
            "INSERT INTO plans (project_root, phase, plan, path, status)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(project_root, phase, plan) DO UPDATE SET
                path = excluded.path, status = excluded.status",
            params![
                root_key(&plan.project_root),
                plan.id.phase,
                plan.id.plan,
                plan.path.to_string_lossy().into_owned(),
                status.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn set_plan_status(
        &self,
        root: &Path,
        id: PlanId,
        status: PlanStatus,
    ) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE plans SET status = ?4
             WHERE project_root = ?1 AND phase = ?2 AND plan = ?3",
            params![root_key(root), id.phase, id.plan, status.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Set every plan of a phase to `status` (used by mark_phase_verified).
    pub fn set_phase_status(
        &self,
        root: &Path,
        phase: u32,
        status: PlanStatus,
    ) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE plans SET status = ?3 WHERE project_root = ?1 AND phase = ?2",
            params![root_key(root), phase, status.as_str()],
        )?;
        Ok(changed)
    }

    pub fn list_plans(&self, root: &Path) -> Result<Vec<Plan>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM plans WHERE project_root = ?1 ORDER BY phase, plan",
        )?;
        let rows: Vec<Plan> = stmt
            .query_map([root_key(root)], plan_from_row(root))?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// Highest plan number discovered for a phase, if any.
    pub fn max_plan_in_phase(&self, root: &Path, phase: u32) -> Result<Option<u32>, StorageError> {
        let conn = self.conn.lock();
        let max: Option<u32> = conn.query_row(
            "SELECT MAX(plan) FROM plans WHERE project_root = ?1 AND phase = ?2",
            params![root_key(root), phase],
            |row| row.get(0),
        )?;
        Ok(max)
    }
}

#[cfg(test)]
#[path = "orchestration_tests.rs"]
mod tests;
