// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! PTY session supervision for corral.
//!
//! The supervisor owns the slot set and the PTY lifecycle of every live
//! child: spawning, output buffering, wait-state detection, smart input,
//! termination, timeout sweeping, and startup recovery. Lifecycle and wait
//! events fan out on the in-process [`EventBus`].

mod bus;
mod detect;
mod error;
mod pty;
mod recovery;
mod ring;
mod supervisor;
mod sweeper;
mod waiter;

pub use bus::EventBus;
pub use detect::{classify_wait, strip_ansi};
pub use error::SupervisorError;
pub use recovery::{recover, RecoveryReport};
pub use ring::RingBuffer;
pub use supervisor::{Supervisor, SupervisorConfig};
pub use sweeper::{spawn_sweeper, SWEEP_INTERVAL};
pub use waiter::{wait_for_state_change, ChangeKind, StateChange, WaitOutcome};
