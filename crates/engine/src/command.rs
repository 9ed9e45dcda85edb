// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyword classification of coordinator commands.
//!
//! The gate recognizes three command families: execute (carries a plan file
//! path), plan (carries a phase number), and verify (carries a phase
//! number). Everything else is unrestricted.

use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static PLAN_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2})-(\d{2})-PLAN\.md").expect("static regex"));

#[allow(clippy::expect_used)]
static TRAILING_INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*$").expect("static regex"));

/// A classified coordinator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandClass {
    /// Executes a plan file; phase and plan derive from its `NN-MM` name.
    Execute {
        phase: u32,
        plan: u32,
        path: String,
    },
    /// Plans a phase.
    Plan { phase: u32 },
    /// Verifies a phase.
    Verify { phase: u32 },
    /// No admission rules apply.
    Other,
}

impl CommandClass {
    pub fn is_execute(&self) -> bool {
        matches!(self, CommandClass::Execute { .. })
    }
}

/// Classify a command string.
///
/// Keyword-based: `execute` with a parsable `NN-MM-PLAN.md` path, `verify`
/// with a trailing phase number, `plan` with a trailing phase number.
/// Execute is checked first because `execute-plan` also contains `plan`.
pub fn classify_command(command: &str) -> CommandClass {
    let lower = command.to_lowercase();

    if lower.contains("execute") {
        if let Some(caps) = PLAN_FILE_RE.captures(command) {
            let (Ok(phase), Ok(plan)) = (caps[1].parse(), caps[2].parse()) else {
                return CommandClass::Other;
            };
            let path = command
                .split_whitespace()
                .find(|tok| PLAN_FILE_RE.is_match(tok))
                .map(|tok| tok.to_string())
                .unwrap_or_default();
            return CommandClass::Execute { phase, plan, path };
        }
        return CommandClass::Other;
    }

    if lower.contains("verify") {
        if let Some(phase) = trailing_int(command) {
            return CommandClass::Verify { phase };
        }
        return CommandClass::Other;
    }

    if lower.contains("plan") {
        if let Some(phase) = trailing_int(command) {
            return CommandClass::Plan { phase };
        }
        return CommandClass::Other;
    }

    CommandClass::Other
}

fn trailing_int(command: &str) -> Option<u32> {
    TRAILING_INT_RE
        .captures(command)
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
