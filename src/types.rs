//! Shared types for the ARENA engine.
//!
//! These types form the data model used across all modules.
//! They are kept free of engine logic so that the rules, ledger, and
//! engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ArenaError;

// ---------------------------------------------------------------------------
// Contestants
// ---------------------------------------------------------------------------

/// Which slot of a two-party contest a contestant (or stake) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// One party of a battle. Display data comes from the profile service;
/// only `current_score` changes while the contest runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contestant {
    pub id: String,
    pub display_name: String,
    /// Ordinal rank. Display only, never feeds the odds.
    #[serde(default)]
    pub tier: u8,
    #[serde(default)]
    pub current_score: i64,
    /// Historical win rate (0.0–1.0). Display only.
    #[serde(default)]
    pub win_rate: f64,
}

impl fmt::Display for Contestant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] tier={} score={} win_rate={:.0}%",
            self.display_name,
            self.id,
            self.tier,
            self.current_score,
            self.win_rate * 100.0,
        )
    }
}

impl Contestant {
    pub fn new(id: &str, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            tier: 0,
            current_score: 0,
            win_rate: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Running stake totals for both sides of one contest.
///
/// The combined pool is always derived, never stored, so it cannot drift
/// away from `total_a + total_b`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WagerPool {
    pub total_a: Decimal,
    pub total_b: Decimal,
    pub participant_count: u32,
}

impl fmt::Display for WagerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A=${:.2} B=${:.2} pool=${:.2} participants={}",
            self.total_a,
            self.total_b,
            self.total(),
            self.participant_count,
        )
    }
}

impl WagerPool {
    /// Combined stake across both sides.
    pub fn total(&self) -> Decimal {
        self.total_a + self.total_b
    }

    /// Stake on one side.
    pub fn for_side(&self, side: Side) -> Decimal {
        match side {
            Side::A => self.total_a,
            Side::B => self.total_b,
        }
    }

    /// Whether `amount` can join the pool without overflowing its total.
    pub fn can_accept(&self, amount: Decimal) -> bool {
        self.total().checked_add(amount).is_some()
    }

    /// Add an accepted stake. Totals only ever grow. Callers check
    /// [`WagerPool::can_accept`] first.
    pub fn add(&mut self, side: Side, amount: Decimal) {
        match side {
            Side::A => self.total_a = self.total_a.saturating_add(amount),
            Side::B => self.total_b = self.total_b.saturating_add(amount),
        }
        self.participant_count += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.total().is_zero()
    }
}

// ---------------------------------------------------------------------------
// Wagers
// ---------------------------------------------------------------------------

/// Wager lifecycle. `Active` transitions exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerStatus {
    Active,
    Won,
    Lost,
    Refunded,
}

impl WagerStatus {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, WagerStatus::Active)
    }
}

impl fmt::Display for WagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WagerStatus::Active => write!(f, "active"),
            WagerStatus::Won => write!(f, "won"),
            WagerStatus::Lost => write!(f, "lost"),
            WagerStatus::Refunded => write!(f, "refunded"),
        }
    }
}

/// A single user's stake in a contest.
///
/// `odds_at_placement` and `potential_payout` are fixed when the wager is
/// created; later pool movement never touches them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    pub id: String,
    pub contest_id: String,
    pub user_id: String,
    pub contestant_id: String,
    pub side: Side,
    pub amount: Decimal,
    pub odds_at_placement: Decimal,
    pub potential_payout: Decimal,
    pub status: WagerStatus,
    /// Amount actually credited back at resolution.
    pub payout: Decimal,
    pub placed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl fmt::Display for Wager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ${:.2} on {} ({}) @ {}x → ${:.2} ({})",
            self.contest_id,
            self.user_id,
            self.amount,
            self.contestant_id,
            self.side,
            self.odds_at_placement,
            self.potential_payout,
            self.status,
        )
    }
}

impl Wager {
    /// Build a fresh active wager with its payout frozen at `odds`.
    /// Fails if the payout does not fit in a `Decimal`.
    pub fn new(
        contest_id: &str,
        user_id: &str,
        contestant_id: &str,
        side: Side,
        amount: Decimal,
        odds: Decimal,
    ) -> Result<Self, ArenaError> {
        let potential_payout = amount.checked_mul(odds).ok_or_else(|| {
            ArenaError::InvalidAmount(format!("${amount:.2} at {odds}x overflows the payout"))
        })?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            contest_id: contest_id.to_string(),
            user_id: user_id.to_string(),
            contestant_id: contestant_id.to_string(),
            side,
            amount,
            odds_at_placement: odds,
            potential_payout,
            status: WagerStatus::Active,
            payout: Decimal::ZERO,
            placed_at: Utc::now(),
            resolved_at: None,
        })
    }

    /// Move out of `Active`. Returns false (and changes nothing) if the
    /// wager was already resolved.
    pub fn resolve(&mut self, status: WagerStatus, payout: Decimal) -> bool {
        if self.status.is_resolved() || status == WagerStatus::Active {
            return false;
        }
        self.status = status;
        self.payout = payout;
        self.resolved_at = Some(Utc::now());
        true
    }

    /// Net result for the user once resolved (payout minus stake).
    pub fn net(&self) -> Decimal {
        match self.status {
            WagerStatus::Active => Decimal::ZERO,
            _ => self.payout - self.amount,
        }
    }
}

// ---------------------------------------------------------------------------
// Phases, outcomes, quotes
// ---------------------------------------------------------------------------

/// Contest phase derived from time remaining. Ordered so the tracker can
/// keep the maximum ever observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestPhase {
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ContestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContestPhase::Open => write!(f, "open"),
            ContestPhase::Closing => write!(f, "closing"),
            ContestPhase::Closed => write!(f, "closed"),
        }
    }
}

/// Administrative status of a contest, orthogonal to the time phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestStatus {
    Live,
    /// Outcome recorded but some wagers are still waiting on a ledger credit.
    Settling,
    Settled,
    Cancelled,
}

impl fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContestStatus::Live => write!(f, "live"),
            ContestStatus::Settling => write!(f, "settling"),
            ContestStatus::Settled => write!(f, "settled"),
            ContestStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final result of a contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Winner { contestant_id: String },
    Tie,
    /// Contest abandoned before resolution; every stake is returned.
    Cancelled,
}

impl Outcome {
    pub fn winner(contestant_id: &str) -> Self {
        Outcome::Winner {
            contestant_id: contestant_id.to_string(),
        }
    }

    /// Whether this outcome returns stakes instead of paying winners.
    pub fn is_refund(&self) -> bool {
        matches!(self, Outcome::Tie | Outcome::Cancelled)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Winner { contestant_id } => write!(f, "winner={contestant_id}"),
            Outcome::Tie => write!(f, "tie"),
            Outcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How the caller asks for a contest to be settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementRequest {
    Winner { contestant_id: String },
    Tie,
    /// Decide from the contestants' current scores (equal scores tie).
    Scores,
}

/// Live odds for a prospective bettor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub odds_a: Decimal,
    pub odds_b: Decimal,
    /// Share of the pool on A, in percent (0 when the pool is empty).
    pub distribution_a: Decimal,
    pub distribution_b: Decimal,
    pub total_pool: Decimal,
    pub participant_count: u32,
}

impl OddsQuote {
    pub fn for_side(&self, side: Side) -> Decimal {
        match side {
            Side::A => self.odds_a,
            Side::B => self.odds_b,
        }
    }
}

impl fmt::Display for OddsQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A {}x ({:.1}%) | B {}x ({:.1}%) | pool=${:.2} n={}",
            self.odds_a,
            self.distribution_a,
            self.odds_b,
            self.distribution_b,
            self.total_pool,
            self.participant_count,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
