//! Per-iteration timeout interval, supplementing spec §4.12's "I/O
//! timeouts are per-iteration" with the original's explicit timer type.
//! Grounded on `original_source/src/gamelock.h`'s `pok_timeout_interval`.

use std::time::{Duration, Instant};

/// Tracks an interval that resets on each `poll`, reporting whether it has
/// elapsed since it was last armed. Used by the update and I/O loops to
/// pace their per-tick sleep/timeout (spec §4.11 step 6, §4.12).
#[derive(Debug, Clone, Copy)]
pub struct TimeoutInterval {
    amount: Duration,
    last: Instant,
}

impl TimeoutInterval {
    pub fn new(amount: Duration) -> Self {
        Self {
            amount,
            last: Instant::now(),
        }
    }

    /// True if `amount` has elapsed since the interval was last armed or
    /// polled-true.
    pub fn poll(&mut self) -> bool {
        if self.last.elapsed() >= self.amount {
            self.last = Instant::now();
            true
        } else {
            false
        }
    }

    /// Time remaining until the next elapse, zero if already due.
    pub fn remaining(&self) -> Duration {
        self.amount.saturating_sub(self.last.elapsed())
    }

    pub fn rearm(&mut self) {
        self.last = Instant::now();
    }

    pub fn set_amount(&mut self, amount: Duration) {
        self.amount = amount;
    }
}
