// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process event bus.
//!
//! Fan-out of lifecycle and wait events to any number of subscribers.
//! Delivery is best-effort: a slow subscriber lags and skips, it never
//! blocks producers. There is no replay — late subscribers catch up via
//! the state-change waiter's pre-subscribe scan.

use corral_core::HarnessEvent;
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 256;

/// Broadcast bus for [`HarnessEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HarnessEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: HarnessEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!(?event, "event dropped (no subscribers)");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HarnessEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
