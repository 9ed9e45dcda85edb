// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! corral-core: domain types for the corral session harness

pub mod checkpoint;
pub mod clock;
pub mod event;
pub mod id;
pub mod message;
pub mod plan;
pub mod session;

pub use checkpoint::{Checkpoint, CheckpointId, CheckpointType};
pub use clock::{Clock, SystemClock};
pub use event::HarnessEvent;
pub use id::{IdGen, ShortId, UuidIdGen};
pub use message::{
    MessageId, MessageStatus, OrchestratorResponse, ResponseType, WorkerMessage, WorkerMessageType,
};
pub use plan::{OrchestrationState, Plan, PlanId, PlanStatus};
pub use session::{OutputChunk, Session, SessionId, SessionStatus, WaitType};

#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
#[cfg(any(test, feature = "test-support"))]
pub use id::SequentialIdGen;
