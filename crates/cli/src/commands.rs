// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argument parsing: argv to protocol requests.

use corral_daemon::protocol::SessionFilter;
use corral_daemon::Request;
use std::path::PathBuf;

pub const USAGE: &str = "\
corral — session harness client

USAGE:
    corral <command> [args]

COMMANDS:
    status                          daemon status
    ls [running|completed|failed]   list sessions
    start <dir> [command...]        start a session
    end <id|slot>                   end a session
    output <id|slot> [lines]        show output tail
    send <id|slot> <input...>       send input (--raw for exact bytes)
    wait <timeout_ms> [ids...]      wait for a state change
    checkpoint <id|slot>            show the current checkpoint
    respond <id|slot> <response..>  answer the current checkpoint
    sync <project_root>             sync project orchestration state
    verified <project_root> <phase> mark a phase verified
    shutdown [--kill]               stop the daemon
";

/// Parse argv (without the binary name) into a request.
pub fn parse(args: &[String]) -> Result<Request, String> {
    let mut args = args.iter();
    let command = args.next().map(String::as_str).unwrap_or("");
    let rest: Vec<&String> = args.collect();

    match command {
        "status" => Ok(Request::Status),
        "ping" => Ok(Request::Ping),

        "ls" => {
            let filter = match rest.first().map(|s| s.as_str()) {
                None => SessionFilter::All,
                Some("running") => SessionFilter::Running,
                Some("completed") => SessionFilter::Completed,
                Some("failed") => SessionFilter::Failed,
                Some(other) => return Err(format!("unknown filter: {other}")),
            };
            Ok(Request::ListSessions { filter })
        }

        "start" => {
            let dir = rest.first().ok_or("start: missing working directory")?;
            let command = if rest.len() > 1 {
                Some(
                    rest[1..]
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(" "),
                )
            } else {
                None
            };
            Ok(Request::StartSession {
                working_dir: PathBuf::from(dir),
                command,
            })
        }

        "end" => {
            let id = rest.first().ok_or("end: missing session id")?;
            Ok(Request::EndSession { id: id.to_string() })
        }

        "output" => {
            let id = rest.first().ok_or("output: missing session id")?;
            let lines = match rest.get(1) {
                Some(n) => n.parse().map_err(|_| format!("output: bad line count: {n}"))?,
                None => 100,
            };
            Ok(Request::GetOutput {
                id: id.to_string(),
                lines,
            })
        }

        "send" => {
            let id = rest.first().ok_or("send: missing session id")?;
            let mut words: Vec<&str> = rest[1..].iter().map(|s| s.as_str()).collect();
            let press_enter = if let Some(pos) = words.iter().position(|w| *w == "--raw") {
                words.remove(pos);
                false
            } else {
                true
            };
            if words.is_empty() {
                return Err("send: missing input".to_string());
            }
            Ok(Request::SendInput {
                id: id.to_string(),
                input: words.join(" "),
                press_enter,
            })
        }

        "wait" => {
            let timeout = rest.first().ok_or("wait: missing timeout_ms")?;
            let timeout_ms = timeout
                .parse()
                .map_err(|_| format!("wait: bad timeout: {timeout}"))?;
            let session_ids = if rest.len() > 1 {
                Some(rest[1..].iter().map(|s| s.to_string()).collect())
            } else {
                None
            };
            Ok(Request::WaitForStateChange {
                timeout_ms,
                session_ids,
            })
        }

        "checkpoint" => {
            let id = rest.first().ok_or("checkpoint: missing session id")?;
            Ok(Request::GetCheckpoint { id: id.to_string() })
        }

        "respond" => {
            let id = rest.first().ok_or("respond: missing session id")?;
            if rest.len() < 2 {
                return Err("respond: missing response".to_string());
            }
            Ok(Request::RespondCheckpoint {
                id: id.to_string(),
                response: rest[1..]
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            })
        }

        "sync" => {
            let root = rest.first().ok_or("sync: missing project root")?;
            Ok(Request::SyncProjectState {
                project_root: PathBuf::from(root),
            })
        }

        "verified" => {
            let root = rest.first().ok_or("verified: missing project root")?;
            let phase = rest.get(1).ok_or("verified: missing phase")?;
            Ok(Request::MarkPhaseVerified {
                project_root: PathBuf::from(root),
                phase: phase
                    .parse()
                    .map_err(|_| format!("verified: bad phase: {phase}"))?,
            })
        }

        "shutdown" => Ok(Request::Shutdown {
            kill: rest.iter().any(|w| w.as_str() == "--kill"),
        }),

        "" | "help" | "--help" | "-h" => Err(USAGE.to_string()),
        other => Err(format!("unknown command: {other}\n\n{USAGE}")),
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
