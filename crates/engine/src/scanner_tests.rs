// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    plans: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let plans = root.join("specs/app/planning/plans");
    fs::create_dir_all(&plans).unwrap();
    Fixture {
        _dir: dir,
        root,
        plans,
    }
}

fn add_plan(fx: &Fixture, phase: u32, plan: u32) {
    let phase_dir = fx.plans.join(format!("{:02}-phase", phase));
    fs::create_dir_all(&phase_dir).unwrap();
    fs::write(
        phase_dir.join(format!("{:02}-{:02}-PLAN.md", phase, plan)),
        "# plan\n",
    )
    .unwrap();
}

fn add_summary(fx: &Fixture, phase: u32, plan: u32, body: &str) {
    let phase_dir = fx.plans.join(format!("{:02}-phase", phase));
    fs::write(
        phase_dir.join(format!("{:02}-{:02}-SUMMARY.md", phase, plan)),
        body,
    )
    .unwrap();
}

#[test]
fn empty_project_scans_empty() {
    let dir = tempfile::tempdir().unwrap();
    let result = scan_project(dir.path());
    assert!(result.plans.is_empty());
    assert_eq!(result.current_phase, None);
}

#[test]
fn plan_without_summary_is_planned() {
    let fx = fixture();
    add_plan(&fx, 1, 1);
    let result = scan_project(&fx.root);
    assert_eq!(result.plans.len(), 1);
    assert_eq!(result.plans[0].id, PlanId::new(1, 1));
    assert_eq!(result.plans[0].status, PlanStatus::Planned);
}

#[test]
fn plan_with_summary_is_executed() {
    let fx = fixture();
    add_plan(&fx, 2, 1);
    add_summary(&fx, 2, 1, "did the work\n");
    let result = scan_project(&fx.root);
    assert_eq!(result.plans[0].status, PlanStatus::Executed);
}

#[test]
fn verified_marker_in_summary_upgrades_to_verified() {
    let fx = fixture();
    add_plan(&fx, 2, 1);
    add_summary(&fx, 2, 1, "done\n\n## Status: VERIFIED\n");
    let result = scan_project(&fx.root);
    assert_eq!(result.plans[0].status, PlanStatus::Verified);
}

#[test]
fn verification_file_upgrades_whole_phase() {
    let fx = fixture();
    add_plan(&fx, 3, 1);
    add_plan(&fx, 3, 2);
    add_summary(&fx, 3, 1, "done\n");
    add_summary(&fx, 3, 2, "done\n");
    fs::write(
        fx.plans.join("03-phase").join("VERIFICATION.md"),
        "checked\n",
    )
    .unwrap();
    let result = scan_project(&fx.root);
    assert!(result
        .plans
        .iter()
        .all(|p| p.status == PlanStatus::Verified));
}

#[test]
fn plans_are_sorted_by_phase_then_plan() {
    let fx = fixture();
    add_plan(&fx, 2, 2);
    add_plan(&fx, 1, 1);
    add_plan(&fx, 2, 1);
    let result = scan_project(&fx.root);
    let ids: Vec<String> = result.plans.iter().map(|p| p.id.to_string()).collect();
    assert_eq!(ids, ["01-01", "02-01", "02-02"]);
}

#[test]
fn legacy_layout_is_scanned_when_specs_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let phase_dir = dir.path().join(".planning/phases/04-legacy");
    fs::create_dir_all(&phase_dir).unwrap();
    fs::write(phase_dir.join("04-01-PLAN.md"), "# plan\n").unwrap();
    let result = scan_project(dir.path());
    assert_eq!(result.plans.len(), 1);
    assert_eq!(result.plans[0].id, PlanId::new(4, 1));
}

#[test]
fn non_phase_directories_are_ignored() {
    let fx = fixture();
    add_plan(&fx, 1, 1);
    let noise = fx.plans.join("notes");
    fs::create_dir_all(&noise).unwrap();
    fs::write(noise.join("07-01-PLAN.md"), "# not a phase dir\n").unwrap();
    let result = scan_project(&fx.root);
    assert_eq!(result.plans.len(), 1);
}

#[test]
fn malformed_plan_names_are_ignored() {
    let fx = fixture();
    let phase_dir = fx.plans.join("05-phase");
    fs::create_dir_all(&phase_dir).unwrap();
    fs::write(phase_dir.join("5-1-PLAN.md"), "bad digits\n").unwrap();
    fs::write(phase_dir.join("05-01-plan.md"), "bad case\n").unwrap();
    fs::write(phase_dir.join("05-01-PLAN.md"), "good\n").unwrap();
    let result = scan_project(&fx.root);
    assert_eq!(result.plans.len(), 1);
}

#[test]
fn state_md_phase_cursor_is_read() {
    let fx = fixture();
    fs::write(fx.root.join("STATE.md"), "progress notes\nCurrent phase: 4\n").unwrap();
    let result = scan_project(&fx.root);
    assert_eq!(result.current_phase, Some(4));
}

#[test]
fn scan_is_idempotent() {
    let fx = fixture();
    add_plan(&fx, 1, 1);
    add_summary(&fx, 1, 1, "done\n");
    let first = scan_project(&fx.root);
    let second = scan_project(&fx.root);
    assert_eq!(first.plans, second.plans);
}
