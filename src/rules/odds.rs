//! Pari-mutuel odds calculation.
//!
//! Odds for a side are the whole pool divided by that side's stake,
//! discounted by the house edge and never allowed below a floor:
//!
//!   odds_x = max(total × h / max(total_x, ε), floor)
//!
//! An empty pool quotes a seeded multiplier for both sides.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::debug;

use crate::types::{OddsQuote, Side, WagerPool};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Odds configuration. The edge and floor are product decisions, so they
/// come from config rather than constants.
#[derive(Debug, Clone, Deserialize)]
pub struct OddsConfig {
    /// Payout multiplier retained after the house cut (0.9 = 10% edge).
    #[serde(default = "default_house_edge")]
    pub house_edge: Decimal,
    /// Minimum multiplier ever quoted.
    #[serde(default = "default_odds_floor")]
    pub odds_floor: Decimal,
    /// Stake assumed for an empty side so the division stays finite.
    #[serde(default = "default_zero_stake_floor")]
    pub zero_stake_floor: Decimal,
    /// Quote for both sides while the pool is empty. `None` derives it from
    /// an even split of the pool.
    #[serde(default)]
    pub initial_odds: Option<Decimal>,
    /// Decimal places kept on quoted odds.
    #[serde(default = "default_precision")]
    pub precision: u32,
}

fn default_house_edge() -> Decimal {
    dec!(0.9)
}

fn default_odds_floor() -> Decimal {
    dec!(1.1)
}

fn default_zero_stake_floor() -> Decimal {
    Decimal::ONE
}

fn default_precision() -> u32 {
    4
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            house_edge: default_house_edge(),
            odds_floor: default_odds_floor(),
            zero_stake_floor: default_zero_stake_floor(),
            initial_odds: None,
            precision: default_precision(),
        }
    }
}

impl OddsConfig {
    /// Reject configurations that would produce nonsensical quotes.
    pub fn validate(&self) -> Result<(), String> {
        if self.house_edge <= Decimal::ZERO || self.house_edge > Decimal::ONE {
            return Err(format!("house_edge must be in (0, 1], got {}", self.house_edge));
        }
        if self.odds_floor < Decimal::ONE {
            return Err(format!("odds_floor must be >= 1, got {}", self.odds_floor));
        }
        if self.zero_stake_floor <= Decimal::ZERO {
            return Err(format!(
                "zero_stake_floor must be positive, got {}",
                self.zero_stake_floor
            ));
        }
        if let Some(seed) = self.initial_odds {
            if seed < Decimal::ONE {
                return Err(format!("initial_odds must be >= 1, got {seed}"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

pub struct OddsCalculator {
    config: OddsConfig,
}

impl OddsCalculator {
    pub fn new(config: OddsConfig) -> Self {
        Self { config }
    }

    /// Access the odds configuration.
    pub fn config(&self) -> &OddsConfig {
        &self.config
    }

    /// Multiplier quoted while nobody has staked yet.
    pub fn seed_odds(&self) -> Decimal {
        let seed = self
            .config
            .initial_odds
            .unwrap_or(dec!(2) * self.config.house_edge);
        self.finish(seed)
    }

    /// Multiplier a new bettor on `side` would lock in right now.
    pub fn odds_for(&self, pool: &WagerPool, side: Side) -> Decimal {
        let total = pool.total();
        if total.is_zero() {
            return self.seed_odds();
        }

        let stake = pool.for_side(side).max(self.config.zero_stake_floor);
        let raw = (total * self.config.house_edge)
            .checked_div(stake)
            .unwrap_or(Decimal::MAX);
        self.finish(raw)
    }

    /// Share of the pool on `side`, in percent. Zero for an empty pool.
    pub fn distribution(pool: &WagerPool, side: Side) -> Decimal {
        let total = pool.total();
        if total.is_zero() {
            return Decimal::ZERO;
        }
        (pool.for_side(side) / total * dec!(100)).round_dp(2)
    }

    /// Full live quote for a pool.
    pub fn quote(&self, pool: &WagerPool) -> OddsQuote {
        let quote = OddsQuote {
            odds_a: self.odds_for(pool, Side::A),
            odds_b: self.odds_for(pool, Side::B),
            distribution_a: Self::distribution(pool, Side::A),
            distribution_b: Self::distribution(pool, Side::B),
            total_pool: pool.total(),
            participant_count: pool.participant_count,
        };

        debug!(
            odds_a = %quote.odds_a,
            odds_b = %quote.odds_b,
            pool = %quote.total_pool,
            "Odds quoted"
        );

        quote
    }

    /// Apply the floor, then trim to the configured precision. Truncation
    /// keeps a quote from ever exceeding the unrounded value.
    fn finish(&self, raw: Decimal) -> Decimal {
        raw.max(self.config.odds_floor)
            .round_dp_with_strategy(self.config.precision, RoundingStrategy::ToZero)
            .normalize()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
