// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project tree scanner.
//!
//! Walks the on-disk planning layout and reports what exists. The scanner
//! only reads; reconciliation with the store happens in the gate. Layout:
//! phase directories `NN-<name>/` under `specs/*/planning/plans/`
//! (preferred) or the legacy `.planning/phases/`, containing plan files
//! `NN-MM-PLAN.md`, completion files `NN-MM-SUMMARY.md`, and an optional
//! per-phase `VERIFICATION.md`. A `STATE.md` holds the phase cursor.

use corral_core::{PlanId, PlanStatus};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static PHASE_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})-").expect("static regex"));

#[allow(clippy::expect_used)]
static PLAN_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})-(\d{2})-PLAN\.md$").expect("static regex"));

#[allow(clippy::expect_used)]
static CURRENT_PHASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)current phase:\s*(\d+)").expect("static regex"));

const VERIFIED_MARKER: &str = "## Status: VERIFIED";

/// A plan unit found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlan {
    pub id: PlanId,
    pub path: PathBuf,
    pub status: PlanStatus,
}

/// Everything a scan found.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Discovered plans in `(phase, plan)` order.
    pub plans: Vec<DiscoveredPlan>,
    /// Phase cursor from `STATE.md`, if present.
    pub current_phase: Option<u32>,
}

/// Scan a project root. Unreadable trees yield an empty result; the
/// scanner never fails a sync over filesystem noise.
pub fn scan_project(project_root: &Path) -> ScanResult {
    let mut result = ScanResult::default();

    for plans_root in candidate_plan_roots(project_root) {
        scan_plans_root(&plans_root, &mut result.plans);
        if !result.plans.is_empty() {
            break;
        }
    }
    result.plans.sort_by_key(|p| p.id);

    result.current_phase = read_phase_cursor(project_root);
    result
}

/// `specs/*/planning/plans/` first, then the legacy layout.
fn candidate_plan_roots(project_root: &Path) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    let specs = project_root.join("specs");
    if let Ok(entries) = std::fs::read_dir(&specs) {
        for entry in entries.flatten() {
            let candidate = entry.path().join("planning").join("plans");
            if candidate.is_dir() {
                roots.push(candidate);
            }
        }
    }
    roots.sort();
    let legacy = project_root.join(".planning").join("phases");
    if legacy.is_dir() {
        roots.push(legacy);
    }
    roots
}

fn scan_plans_root(plans_root: &Path, out: &mut Vec<DiscoveredPlan>) {
    let Ok(entries) = std::fs::read_dir(plans_root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !PHASE_DIR_RE.is_match(&name) {
            continue;
        }
        scan_phase_dir(&path, out);
    }
}

fn scan_phase_dir(phase_dir: &Path, out: &mut Vec<DiscoveredPlan>) {
    let has_verification = phase_dir.join("VERIFICATION.md").is_file();

    let Ok(entries) = std::fs::read_dir(phase_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(caps) = PLAN_FILE_RE.captures(&name) else {
            continue;
        };
        let (Ok(phase), Ok(plan)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        let id = PlanId::new(phase, plan);
        let path = entry.path();

        let summary_path = phase_dir.join(format!("{:02}-{:02}-SUMMARY.md", phase, plan));
        let status = if summary_path.is_file() {
            let verified = has_verification
                || std::fs::read_to_string(&summary_path)
                    .map(|s| s.contains(VERIFIED_MARKER))
                    .unwrap_or(false);
            if verified {
                PlanStatus::Verified
            } else {
                PlanStatus::Executed
            }
        } else {
            PlanStatus::Planned
        };

        out.push(DiscoveredPlan { id, path, status });
    }
}

fn read_phase_cursor(project_root: &Path) -> Option<u32> {
    for candidate in [
        project_root.join("STATE.md"),
        project_root.join(".planning").join("STATE.md"),
    ] {
        if let Ok(content) = std::fs::read_to_string(&candidate) {
            if let Some(caps) = CURRENT_PHASE_RE.captures(&content) {
                return caps[1].parse().ok();
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
