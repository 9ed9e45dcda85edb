// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern-based checkpoint extraction.
//!
//! The fallback path when a child never posts an explicit checkpoint: scan
//! the tail of its output for a `═══ CHECKPOINT: … ═══` banner (or a bare
//! `CHECKPOINT:` line), classify the type from keywords, and parse the
//! block into typed fields. Parsing is best-effort — the raw block is
//! always returned so the coordinator can inspect it when parsing fails.

use corral_core::CheckpointType;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

/// Context window around the `CHECKPOINT:` line.
const LINES_BEFORE: usize = 5;
const LINES_AFTER: usize = 15;

#[allow(clippy::expect_used)]
static CHECKPOINT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CHECKPOINT:\s*(\S[^═\n]*)?").expect("static regex"));

#[allow(clippy::expect_used)]
static OPTION_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)[.)]\s+(.+)$").expect("static regex"));

#[allow(clippy::expect_used)]
static PHASE_COMPLETE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)phase\s+(\d+).*complete").expect("static regex"));

const COMPLETION_PHRASES: [&str; 3] = [
    "verification passed",
    "planning complete",
    "execution complete",
];

/// A checkpoint inferred from output patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedCheckpoint {
    pub checkpoint_type: CheckpointType,
    /// Typed fields per checkpoint type; a generic fallback on parse failure.
    pub fields: Value,
    /// The raw block the checkpoint was extracted from.
    pub raw: String,
    /// Whether typed parsing succeeded.
    pub parse_ok: bool,
}

/// Scan output text (already ANSI-stripped) for a checkpoint block.
pub fn scan_checkpoint(text: &str) -> Option<ScannedCheckpoint> {
    let lines: Vec<&str> = text.lines().collect();
    let anchor = lines
        .iter()
        .rposition(|line| line.contains("CHECKPOINT:"))?;

    let start = anchor.saturating_sub(LINES_BEFORE);
    let end = (anchor + LINES_AFTER + 1).min(lines.len());
    let block: Vec<&str> = lines[start..end].to_vec();
    let raw = block.join("\n");

    let label = CHECKPOINT_LINE_RE
        .captures(lines[anchor])
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let checkpoint_type = classify_type(&label, &raw);
    let (fields, parse_ok) = parse_fields(checkpoint_type, &label, &block, &raw);

    Some(ScannedCheckpoint {
        checkpoint_type,
        fields,
        raw,
        parse_ok,
    })
}

fn classify_type(label: &str, block: &str) -> CheckpointType {
    let haystack = format!("{}\n{}", label, block).to_lowercase();
    if haystack.contains("human-verify") {
        CheckpointType::HumanVerify
    } else if haystack.contains("human-action") {
        CheckpointType::HumanAction
    } else if haystack.contains("decision") {
        CheckpointType::Decision
    } else if haystack.contains("error") {
        CheckpointType::Error
    } else {
        CheckpointType::Completion
    }
}

fn parse_fields(
    checkpoint_type: CheckpointType,
    label: &str,
    block: &[&str],
    raw: &str,
) -> (Value, bool) {
    let parsed = match checkpoint_type {
        CheckpointType::HumanVerify => parse_human_verify(block),
        CheckpointType::Decision => parse_decision(block),
        CheckpointType::HumanAction => parse_human_action(block),
        CheckpointType::Completion | CheckpointType::Error => {
            parse_completion(label, block, raw)
        }
    };
    match parsed {
        Some(fields) => (fields, true),
        None => (
            json!({
                "note": "unable to parse checkpoint content",
                "raw": raw,
            }),
            false,
        ),
    }
}

/// Value of a `Key: value` line, matched case-insensitively by prefix.
fn labeled_value(block: &[&str], labels: &[&str]) -> Option<String> {
    for line in block {
        let lower = line.trim().to_lowercase();
        for label in labels {
            if let Some(rest) = lower.strip_prefix(&label.to_lowercase()) {
                let value = line.trim()[line.trim().len() - rest.len()..].trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Bullet or numbered lines following a `Label:` line.
fn labeled_list(block: &[&str], labels: &[&str]) -> Vec<String> {
    let mut items = Vec::new();
    let mut collecting = false;
    for line in block {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();
        if labels.iter().any(|l| lower.starts_with(&l.to_lowercase())) {
            collecting = true;
            continue;
        }
        if collecting {
            if let Some(item) = trimmed
                .strip_prefix('-')
                .or_else(|| trimmed.strip_prefix('*'))
            {
                items.push(item.trim().to_string());
            } else if let Some(caps) = OPTION_LINE_RE.captures(trimmed) {
                items.push(caps[2].trim().to_string());
            } else if !trimmed.is_empty() {
                break;
            }
        }
    }
    items
}

fn parse_human_verify(block: &[&str]) -> Option<Value> {
    let what_built = labeled_value(block, &["what was built:", "what built:", "built:"])?;
    let how_to_verify = labeled_list(block, &["how to verify:", "verify:"]);
    Some(json!({
        "whatBuilt": what_built,
        "howToVerify": how_to_verify,
        "resumeSignal": "approved",
    }))
}

fn parse_decision(block: &[&str]) -> Option<Value> {
    let decision = labeled_value(block, &["decision:"])?;
    let context = labeled_value(block, &["context:"]).unwrap_or_default();

    let mut options = Vec::new();
    let mut current: Option<Value> = None;
    for line in block {
        let trimmed = line.trim();
        if let Some(caps) = OPTION_LINE_RE.captures(trimmed) {
            if let Some(done) = current.take() {
                options.push(done);
            }
            current = Some(json!({
                "id": caps[1].to_string(),
                "name": caps[2].trim(),
                "pros": "",
                "cons": "",
            }));
        } else if let Some(option) = current.as_mut() {
            let lower = trimmed.to_lowercase();
            if let Some(rest) = lower.strip_prefix("pros:") {
                option["pros"] = Value::String(trimmed[trimmed.len() - rest.len()..].trim().into());
            } else if let Some(rest) = lower.strip_prefix("cons:") {
                option["cons"] = Value::String(trimmed[trimmed.len() - rest.len()..].trim().into());
            }
        }
    }
    if let Some(done) = current.take() {
        options.push(done);
    }

    Some(json!({
        "decision": decision,
        "context": context,
        "options": options,
        "resumeSignal": "select an option",
    }))
}

fn parse_human_action(block: &[&str]) -> Option<Value> {
    let action = labeled_value(block, &["action:"])?;
    let instructions = labeled_value(block, &["instructions:"]).unwrap_or_default();
    Some(json!({
        "action": action,
        "instructions": instructions,
        "resumeSignal": "done",
    }))
}

fn parse_completion(label: &str, block: &[&str], raw: &str) -> Option<Value> {
    let lower = raw.to_lowercase();
    let known_phrase = COMPLETION_PHRASES.iter().any(|p| lower.contains(p))
        || PHASE_COMPLETE_RE.is_match(raw)
        || lower.contains("next command:");
    if !known_phrase && label.is_empty() {
        return None;
    }

    let status = if lower.contains("failed") {
        "failed"
    } else if lower.contains("partial") {
        "partial"
    } else {
        "success"
    };
    let summary = labeled_value(block, &["summary:"]).unwrap_or_default();
    let next_command = labeled_value(block, &["next command:"]);

    let mut fields = json!({
        "workflow": label,
        "status": status,
        "summary": summary,
    });
    if let Some(next) = next_command {
        fields["nextCommand"] = Value::String(next);
    }
    Some(fields)
}

#[cfg(test)]
#[path = "checkpoint_scan_tests.rs"]
mod tests;
