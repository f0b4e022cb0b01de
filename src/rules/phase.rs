//! Contest phase state machine.
//!
//! `open → closing → closed`, driven only by the remaining time the caller
//! passes in. The tracker remembers the furthest phase it has seen, so a
//! clock that jumps backwards can never reopen voting.

use serde::{Deserialize, Serialize};

use crate::types::ContestPhase;

/// Seconds before the end during which no new wagers are taken.
pub const DEFAULT_CLOSING_WINDOW_SECS: i64 = 60;

/// Phase implied by a remaining-time reading alone.
pub fn phase_for(remaining_secs: i64, closing_window_secs: i64) -> ContestPhase {
    if remaining_secs <= 0 {
        ContestPhase::Closed
    } else if remaining_secs <= closing_window_secs {
        ContestPhase::Closing
    } else {
        ContestPhase::Open
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTracker {
    phase: ContestPhase,
    ended_early: bool,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            phase: ContestPhase::Open,
            ended_early: false,
        }
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ContestPhase {
        self.phase
    }

    /// Whether `end` was called rather than time running out.
    pub fn ended_early(&self) -> bool {
        self.ended_early
    }

    /// Fold in a clock reading and return the resulting phase.
    pub fn observe(
        &mut self,
        remaining_secs: i64,
        ended: bool,
        closing_window_secs: i64,
    ) -> ContestPhase {
        let reading = if ended {
            ContestPhase::Closed
        } else {
            phase_for(remaining_secs, closing_window_secs)
        };
        self.phase = self.phase.max(reading);
        self.phase
    }

    /// Explicit "contest ended" signal, regardless of time left.
    pub fn end(&mut self) -> ContestPhase {
        if self.phase != ContestPhase::Closed {
            self.ended_early = true;
        }
        self.phase = ContestPhase::Closed;
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == ContestPhase::Closed
    }
}
