//! Wager admission rules.
//!
//! Checks run cheapest-first and in a fixed order: phase, duplicate,
//! target, amount, and finally balance. The balance check is split out
//! because it needs a ledger round-trip, which is skipped when an earlier
//! rule already rejects the request.

use rust_decimal::prelude::*;
use tracing::debug;

use crate::error::ArenaError;
use crate::types::{Contestant, ContestPhase, Side};

/// A user's request to stake on one contestant.
#[derive(Debug, Clone)]
pub struct WagerRequest<'a> {
    pub contest_id: &'a str,
    pub user_id: &'a str,
    pub contestant_id: &'a str,
    pub amount: Decimal,
}

/// Contest state the rules need, captured under the contest lock.
#[derive(Debug, Clone)]
pub struct PlacementContext<'a> {
    pub phase: ContestPhase,
    /// False once an outcome has been recorded or the contest was cancelled.
    pub accepting: bool,
    pub contestants: &'a [Contestant; 2],
    pub has_existing_wager: bool,
}

pub struct WagerValidator;

impl WagerValidator {
    /// Every rule except the balance check. Returns the side the stake
    /// lands on.
    pub fn check_request(
        request: &WagerRequest<'_>,
        ctx: &PlacementContext<'_>,
    ) -> Result<Side, ArenaError> {
        if ctx.phase != ContestPhase::Open || !ctx.accepting {
            debug!(
                contest_id = request.contest_id,
                phase = %ctx.phase,
                "Rejected: voting closed"
            );
            return Err(ArenaError::VotingClosed(request.contest_id.to_string()));
        }

        if ctx.has_existing_wager {
            return Err(ArenaError::DuplicateWager {
                contest_id: request.contest_id.to_string(),
                user_id: request.user_id.to_string(),
            });
        }

        let side = side_of(ctx.contestants, request.contestant_id).ok_or_else(|| {
            ArenaError::InvalidTarget {
                contest_id: request.contest_id.to_string(),
                contestant_id: request.contestant_id.to_string(),
            }
        })?;

        if request.amount <= Decimal::ZERO {
            return Err(ArenaError::InvalidAmount(format!(
                "stake must be positive, got {}",
                request.amount
            )));
        }

        Ok(side)
    }

    /// The stake must be covered by the balance the ledger reported.
    pub fn check_balance(amount: Decimal, balance: Decimal) -> Result<(), ArenaError> {
        if amount > balance {
            return Err(ArenaError::InsufficientBalance {
                needed: amount,
                available: balance,
            });
        }
        Ok(())
    }

    /// All rules at once, for callers that already hold the balance.
    pub fn validate(
        request: &WagerRequest<'_>,
        ctx: &PlacementContext<'_>,
        balance: Decimal,
    ) -> Result<Side, ArenaError> {
        let side = Self::check_request(request, ctx)?;
        Self::check_balance(request.amount, balance)?;
        Ok(side)
    }
}

/// Which side of the contest a contestant id occupies.
pub fn side_of(contestants: &[Contestant; 2], contestant_id: &str) -> Option<Side> {
    if contestants[0].id == contestant_id {
        Some(Side::A)
    } else if contestants[1].id == contestant_id {
        Some(Side::B)
    } else {
        None
    }
}

/// Convert a stake arriving as a float (JSON, UI) into money, rejecting
/// NaN and infinities.
pub fn stake_from_f64(value: f64) -> Result<Decimal, ArenaError> {
    if !value.is_finite() {
        return Err(ArenaError::InvalidAmount(format!("stake is not a finite number: {value}")));
    }
    Decimal::from_f64(value)
        .ok_or_else(|| ArenaError::InvalidAmount(format!("stake out of range: {value}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
