// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation-surface handlers.
//!
//! Every handler converts internal errors into a `{ success: false, error,
//! code }` reply; nothing here aborts the process over one bad call.

mod checkpoints;
mod control;
mod messages;
mod orchestration;
mod sessions;

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;

use crate::daemon::Daemon;
use crate::protocol::{ErrorCode, Reply, Request};
use corral_engine::GateError;
use corral_supervisor::SupervisorError;

/// Dispatch a request to its handler.
pub async fn handle(daemon: &Daemon, request: Request) -> Reply {
    match request {
        Request::Ping => control::ping(),
        Request::Hello { version } => control::hello(&version),
        Request::Status => control::status(daemon),
        Request::Shutdown { kill } => control::shutdown(daemon, kill).await,
        Request::WaitForStateChange {
            timeout_ms,
            session_ids,
        } => control::wait_for_state_change(daemon, timeout_ms, session_ids).await,

        Request::ListSessions { filter } => sessions::list(daemon, filter),
        Request::StartSession {
            working_dir,
            command,
        } => sessions::start(daemon, &working_dir, command.as_deref()).await,
        Request::EndSession { id } => sessions::end(daemon, &id).await,
        Request::GetOutput { id, lines } => sessions::output(daemon, &id, lines),
        Request::SendInput {
            id,
            input,
            press_enter,
        } => sessions::send_input(daemon, &id, &input, press_enter).await,
        Request::Resize { id, cols, rows } => sessions::resize(daemon, &id, cols, rows),

        Request::GetCheckpoint { id } => checkpoints::get(daemon, &id),
        Request::RespondCheckpoint { id, response } => {
            checkpoints::respond(daemon, &id, &response).await
        }
        Request::SignalCheckpoint {
            id,
            checkpoint_type,
            workflow,
            phase,
            summary,
            next_command,
            data,
        } => checkpoints::signal(
            daemon,
            &id,
            &checkpoint_type,
            workflow,
            phase,
            summary,
            next_command,
            data,
        ),

        Request::WorkerReport {
            id,
            message_type,
            payload,
        } => messages::report(daemon, &id, &message_type, &payload),
        Request::WorkerAwait {
            id,
            message_id,
            timeout_ms,
        } => messages::await_response(daemon, &id, &message_id, timeout_ms).await,
        Request::Respond {
            id,
            worker_message_id,
            response_type,
            payload,
        } => messages::respond(daemon, &id, &worker_message_id, &response_type, &payload),
        Request::GetPending { id, message_types } => {
            messages::pending(daemon, id.as_deref(), message_types.as_deref())
        }

        Request::SyncProjectState { project_root } => {
            orchestration::sync(daemon, &project_root)
        }
        Request::SetExecutionState {
            project_root,
            highest_executed_phase,
            highest_executing_phase,
            highest_executing_plan,
            force_reset,
        } => orchestration::set_execution_state(
            daemon,
            &project_root,
            highest_executed_phase,
            highest_executing_phase,
            highest_executing_plan,
            force_reset,
        ),
        Request::MarkPhaseVerified {
            project_root,
            phase,
        } => orchestration::mark_phase_verified(daemon, &project_root, phase),
    }
}

pub(crate) fn supervisor_error(e: SupervisorError) -> Reply {
    let message = e.to_string();
    let code = match e {
        SupervisorError::SlotsExhausted { .. } => ErrorCode::SlotsExhausted,
        SupervisorError::SpawnInProgress => ErrorCode::SpawnInProgress,
        SupervisorError::SessionNotFound(_) => ErrorCode::SessionNotFound,
        SupervisorError::SessionNotActive(_) => ErrorCode::SessionNotActive,
        SupervisorError::InvalidTimeout(_) => ErrorCode::InvalidTimeout,
        SupervisorError::SpawnFailed(_)
        | SupervisorError::Pty(_)
        | SupervisorError::Storage(_) => ErrorCode::Internal,
    };
    Reply::fail(code, message)
}

pub(crate) fn gate_error(e: GateError) -> Reply {
    let message = e.to_string();
    let code = match e {
        GateError::ExecutionLimit { .. } => ErrorCode::ExecutionLimit,
        GateError::VerifyGate { .. } => ErrorCode::VerifyGate,
        GateError::PlanningLimit { .. } => ErrorCode::PlanningLimit,
        GateError::Storage(_) => ErrorCode::Internal,
    };
    Reply::fail(code, message)
}

pub(crate) fn message_error(e: crate::messages::MessageError) -> Reply {
    use crate::messages::MessageError;
    let message = e.to_string();
    let code = match e {
        MessageError::MessageNotFound(_) => Some(ErrorCode::MessageNotFound),
        MessageError::MessageExpired(_) => Some(ErrorCode::MessageExpired),
        MessageError::MessageTimeout(_) => Some(ErrorCode::MessageTimeout),
        MessageError::InvalidPairing { .. } | MessageError::UnknownResponseType(_) => {
            Some(ErrorCode::InvalidResponseType)
        }
        MessageError::Storage(_) => Some(ErrorCode::Internal),
        MessageError::UnknownMessageType(_) | MessageError::AlreadyResponded(_) => None,
    };
    match code {
        Some(code) => Reply::fail(code, message),
        None => Reply::fail_uncoded(message),
    }
}
