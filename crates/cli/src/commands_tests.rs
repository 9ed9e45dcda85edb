// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[test]
fn start_joins_command_words() {
    let req = parse(&argv(&["start", "/p", "plan-phase", "3"])).unwrap();
    assert_eq!(
        req,
        Request::StartSession {
            working_dir: PathBuf::from("/p"),
            command: Some("plan-phase 3".to_string()),
        }
    );
}

#[test]
fn start_without_command_is_bare() {
    let req = parse(&argv(&["start", "/p"])).unwrap();
    assert_eq!(
        req,
        Request::StartSession {
            working_dir: PathBuf::from("/p"),
            command: None,
        }
    );
}

#[test]
fn ls_filters() {
    assert_eq!(
        parse(&argv(&["ls"])).unwrap(),
        Request::ListSessions {
            filter: SessionFilter::All
        }
    );
    assert_eq!(
        parse(&argv(&["ls", "failed"])).unwrap(),
        Request::ListSessions {
            filter: SessionFilter::Failed
        }
    );
    assert!(parse(&argv(&["ls", "zombie"])).is_err());
}

#[test]
fn send_raw_flag_disables_enter() {
    let req = parse(&argv(&["send", "s-1", "--raw", "q"])).unwrap();
    assert_eq!(
        req,
        Request::SendInput {
            id: "s-1".to_string(),
            input: "q".to_string(),
            press_enter: false,
        }
    );
}

#[test]
fn wait_parses_timeout_and_optional_ids() {
    let req = parse(&argv(&["wait", "60000", "a", "b"])).unwrap();
    assert_eq!(
        req,
        Request::WaitForStateChange {
            timeout_ms: 60_000,
            session_ids: Some(vec!["a".to_string(), "b".to_string()]),
        }
    );
    let req = parse(&argv(&["wait", "60000"])).unwrap();
    assert_eq!(
        req,
        Request::WaitForStateChange {
            timeout_ms: 60_000,
            session_ids: None,
        }
    );
}

#[test]
fn output_defaults_to_100_lines() {
    let req = parse(&argv(&["output", "s-1"])).unwrap();
    assert_eq!(
        req,
        Request::GetOutput {
            id: "s-1".to_string(),
            lines: 100,
        }
    );
}

#[test]
fn shutdown_kill_flag() {
    assert_eq!(
        parse(&argv(&["shutdown", "--kill"])).unwrap(),
        Request::Shutdown { kill: true }
    );
}

#[test]
fn missing_args_report_usage_errors() {
    assert!(parse(&argv(&["start"])).is_err());
    assert!(parse(&argv(&["end"])).is_err());
    assert!(parse(&argv(&["send", "s-1"])).is_err());
    assert!(parse(&argv(&[])).unwrap_err().contains("USAGE"));
    assert!(parse(&argv(&["frobnicate"])).is_err());
}
