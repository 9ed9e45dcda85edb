// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-text rendering of daemon replies.

use corral_daemon::{Body, Reply};

/// Render a reply for the terminal. Failures render to stderr-style text;
/// the caller decides the stream and exit code.
pub fn render(reply: &Reply) -> String {
    if !reply.success {
        let code = reply
            .code
            .map(|c| format!("{c:?}"))
            .unwrap_or_else(|| "Error".to_string());
        return format!(
            "error [{code}]: {}",
            reply.error.as_deref().unwrap_or("unknown error")
        );
    }

    match &reply.body {
        None => "ok".to_string(),
        Some(Body::Pong { version }) => format!("pong (daemon {version})"),
        Some(Body::Status {
            uptime_ms,
            live_sessions,
            free_slots,
            max_sessions,
        }) => format!(
            "uptime {}s, sessions {live_sessions} live, slots {free_slots}/{max_sessions} free",
            uptime_ms / 1000
        ),
        Some(Body::ShuttingDown) => "shutting down".to_string(),
        Some(Body::Sessions {
            sessions,
            free_slots,
        }) => {
            let mut out = String::new();
            for session in sessions {
                out.push_str(&format!(
                    "{}  slot {}  {}  {}\n",
                    session.id.short(8),
                    session.slot,
                    session.status,
                    session.current_command,
                ));
            }
            out.push_str(&format!("{free_slots} slot(s) free"));
            out
        }
        Some(Body::Session { session }) => {
            format!("started {} in slot {}", session.id, session.slot)
        }
        Some(Body::Ended {
            session_id,
            already_ended,
        }) => {
            if *already_ended {
                format!("{session_id} already ended")
            } else {
                format!("{session_id} ended")
            }
        }
        Some(Body::Output { lines, .. }) => lines.join("\n"),
        Some(Body::Sent) => "sent".to_string(),
        Some(Body::Resized) => "resized".to_string(),
        Some(Body::Signalled { checkpoint_id }) => format!("checkpoint {checkpoint_id}"),
        Some(Body::StateChange { change, reason }) => match change {
            Some(change) => {
                let detail = change
                    .wait_type
                    .as_deref()
                    .map(|w| format!(" ({w})"))
                    .unwrap_or_default();
                format!("{} {}{detail}", change.session_id, change.change)
            }
            None => reason.clone().unwrap_or_else(|| "no change".to_string()),
        },
        // Structured bodies print as JSON for scripting
        Some(other) => serde_json::to_string_pretty(other)
            .unwrap_or_else(|e| format!("unrenderable reply: {e}")),
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
