// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal wait-state classification.
//!
//! Classifies the settled tail of a session's output into one of the wait
//! types, or none. The classifier sees plain text: escape sequences are
//! stripped first. Order matters — a menu cursor line is also a `❯` at the
//! tail, so menus are checked before free prompts.

use corral_core::WaitType;
use regex::Regex;
use std::sync::LazyLock;

// Spinner glyphs the agent CLI animates while working. A visible spinner
// means the child is busy, so a trailing `❯` alone is not a free prompt.
const SPINNER_GLYPHS: [char; 6] = ['✶', '✻', '✽', '✢', '·', '*'];

#[allow(clippy::expect_used)]
static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    // CSI sequences, OSC sequences (BEL or ST terminated), and lone
    // two-byte escapes.
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)?|\x1b[@-_]")
        .expect("static regex")
});

#[allow(clippy::expect_used)]
static MENU_CURSOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"❯\s*\d+\.\s+\S").expect("static regex"));

#[allow(clippy::expect_used)]
static MENU_OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:❯\s*)?\d+\.\s+\S").expect("static regex"));

/// Remove terminal escape sequences and carriage returns.
pub fn strip_ansi(text: &str) -> String {
    let stripped = ANSI_RE.replace_all(text, "");
    stripped.replace('\r', "")
}

const PERMISSION_MARKERS: [&str; 4] = ["(y/n)", "allow?", "confirm?", "[y/n]"];
const CONTINUE_MARKERS: [&str; 3] = ["press enter", "press any key", "continue?"];

/// Classify raw terminal output into a wait type.
///
/// Returns `None` when the child does not appear to be blocked on input.
pub fn classify_wait(raw: &str) -> Option<WaitType> {
    let text = strip_ansi(raw);

    if MENU_CURSOR_RE.is_match(&text) {
        let options = MENU_OPTION_RE.find_iter(&text).count();
        return Some(WaitType::Menu { options });
    }

    let lower = text.to_lowercase();
    if PERMISSION_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(WaitType::Permission);
    }
    if CONTINUE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(WaitType::Continue);
    }

    if has_trailing_prompt(&text) && !has_spinner(&text) {
        return Some(WaitType::Prompt);
    }

    None
}

/// Whether the last non-empty line is a bare free-prompt cursor.
fn has_trailing_prompt(text: &str) -> bool {
    let Some(line) = text.lines().rev().find(|l| !l.trim().is_empty()) else {
        return false;
    };
    let trimmed = line.trim();
    if trimmed == "❯" {
        return true;
    }
    trimmed
        .strip_prefix('❯')
        .is_some_and(|rest| rest.trim().is_empty())
        || trimmed.ends_with('❯')
}

fn has_spinner(text: &str) -> bool {
    text.chars().any(|c| SPINNER_GLYPHS.contains(&c))
}

#[cfg(test)]
#[path = "detect_tests.rs"]
mod tests;
