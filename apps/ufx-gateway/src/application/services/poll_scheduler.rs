//! Round-robin poll scheduler.
//!
//! Low-priority queries (account, position) are spread over the external
//! timer signal: every `cadence` ticks the next operation in a fixed
//! round-robin list fires and rotates to the back. The scheduler is a pure
//! state machine; the client maps the returned operation to an actual query
//! and its login guard turns the call into a no-op while disconnected.

use std::collections::VecDeque;

/// One scheduled low-priority query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOperation {
    /// Query account balances.
    QueryAccount,
    /// Query position holdings.
    QueryPosition,
}

/// Cadence counter plus the rotating operation list.
#[derive(Debug)]
pub struct PollScheduler {
    cadence: u32,
    count: u32,
    operations: VecDeque<PollOperation>,
}

impl PollScheduler {
    /// Default tick cadence between fired operations.
    pub const DEFAULT_CADENCE: u32 = 2;

    /// Create a scheduler with the standard operation list.
    #[must_use]
    pub fn new(cadence: u32) -> Self {
        Self {
            cadence: cadence.max(1),
            count: 0,
            operations: VecDeque::from([PollOperation::QueryAccount, PollOperation::QueryPosition]),
        }
    }

    /// Advance the tick counter; at cadence, return the next operation.
    ///
    /// The returned operation rotates to the back of the list. Order is
    /// never accelerated or skipped.
    pub fn on_tick(&mut self) -> Option<PollOperation> {
        self.count += 1;
        if self.count < self.cadence {
            return None;
        }
        self.count = 0;

        let operation = self.operations.pop_front()?;
        self.operations.push_back(operation);
        Some(operation)
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CADENCE)
    }
}
