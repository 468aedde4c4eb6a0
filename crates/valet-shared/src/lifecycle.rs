//! Car check-in / return state machine.
//!
//! `Active -> Returned` is the only transition and `Returned` is terminal.
//! Returning is gated behind [`ReturnConfirmation`], a hold-to-confirm
//! affordance that a stray tap cannot satisfy.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_RETURN_HOLD_MS;
use crate::types::CarId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarState {
    /// Checked in, still parked.
    Active,
    /// Handed back to its owner.
    Returned,
}

/// Result of a return request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOutcome {
    Returned,
    /// The car was already returned; nothing changed.
    AlreadyReturned,
}

/// Hold-to-confirm gate for car returns.
#[derive(Debug, Clone)]
pub struct ReturnConfirmation {
    hold: Duration,
    pending: Option<(CarId, Instant)>,
}

impl ReturnConfirmation {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            pending: None,
        }
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }

    /// Start holding on `car`. Re-arming on another car discards the first.
    pub fn begin(&mut self, car: CarId, at: Instant) {
        self.pending = Some((car, at));
    }

    /// Release the hold. Yields the car only if the same car was held for at
    /// least the configured duration. The gate is disarmed either way.
    pub fn confirm(&mut self, car: CarId, at: Instant) -> Option<CarId> {
        let (held, since) = self.pending.take()?;
        if held != car {
            return None;
        }
        if at.saturating_duration_since(since) >= self.hold {
            Some(car)
        } else {
            None
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for ReturnConfirmation {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_RETURN_HOLD_MS))
    }
}
