//! Settlement — resolves every active wager once the contest is over.
//!
//! Each wager's own status is the idempotence guard: resolved wagers are
//! skipped, so a settlement interrupted by a ledger failure is finished by
//! simply running it again with the same outcome. Credits are keyed by the
//! wager id, so a credit whose response was lost is not paid twice.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use super::contest::Contest;
use crate::error::ArenaError;
use crate::ledger::{bounded, BalanceLedger};
use crate::types::{ContestStatus, Outcome, Wager, WagerStatus};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Summary of a settlement pass.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub contest_id: String,
    pub outcome: Outcome,
    pub status: ContestStatus,
    pub wagers: Vec<Wager>,
    /// Every stake ever placed in the contest.
    pub total_staked: Decimal,
    /// Sum of payouts and refunds credited so far.
    pub total_credited: Decimal,
    /// Stakes kept minus payouts made. Negative when long-shot winners
    /// collected more than the losing side staked.
    pub house_net: Decimal,
    /// True when the contest had already been fully settled and this call
    /// changed nothing.
    pub already_settled: bool,
}

impl SettlementReport {
    fn from_contest(contest: &Contest, outcome: Outcome, already_settled: bool) -> Self {
        let total_staked = contest
            .wagers
            .iter()
            .fold(Decimal::ZERO, |acc, w| acc.saturating_add(w.amount));
        let total_credited = contest
            .wagers
            .iter()
            .fold(Decimal::ZERO, |acc, w| acc.saturating_add(w.payout));
        Self {
            contest_id: contest.id.clone(),
            outcome,
            status: contest.status,
            wagers: contest.wagers.clone(),
            total_staked,
            total_credited,
            house_net: total_staked.saturating_sub(total_credited),
            already_settled,
        }
    }

    pub fn count(&self, status: WagerStatus) -> usize {
        self.wagers.iter().filter(|w| w.status == status).count()
    }
}

// ---------------------------------------------------------------------------
// Resolution rules
// ---------------------------------------------------------------------------

/// Final status and credit for one wager under an outcome.
pub fn resolution_for(wager: &Wager, outcome: &Outcome) -> (WagerStatus, Decimal) {
    match outcome {
        Outcome::Tie | Outcome::Cancelled => (WagerStatus::Refunded, wager.amount),
        Outcome::Winner { contestant_id } if *contestant_id == wager.contestant_id => {
            (WagerStatus::Won, wager.potential_payout)
        }
        Outcome::Winner { .. } => (WagerStatus::Lost, Decimal::ZERO),
    }
}

/// Ledger reference for a wager's settlement credit.
pub fn settlement_reference(wager_id: &str) -> String {
    format!("{wager_id}:settle")
}

// ---------------------------------------------------------------------------
// Settler
// ---------------------------------------------------------------------------

pub struct Settler;

impl Settler {
    /// Settle (or finish settling) a contest. The caller holds the contest
    /// lock for the whole call and has already checked eligibility.
    pub async fn settle(
        contest: &mut Contest,
        outcome: Outcome,
        ledger: &dyn BalanceLedger,
        timeout: Duration,
    ) -> Result<SettlementReport, ArenaError> {
        match &contest.outcome {
            Some(recorded) if *recorded != outcome => {
                return Err(ArenaError::ConflictingOutcome {
                    contest_id: contest.id.clone(),
                    recorded: recorded.to_string(),
                });
            }
            Some(_) if matches!(contest.status, ContestStatus::Settled | ContestStatus::Cancelled) => {
                info!(contest_id = %contest.id, %outcome, "Contest already settled");
                return Ok(SettlementReport::from_contest(contest, outcome, true));
            }
            Some(_) => {
                info!(contest_id = %contest.id, %outcome, "Resuming interrupted settlement");
            }
            None => {
                contest.outcome = Some(outcome.clone());
                contest.status = ContestStatus::Settling;
                contest.tracker.end();
            }
        }

        let contest_id = contest.id.clone();
        let mut credited = 0usize;

        for wager in contest.wagers.iter_mut().filter(|w| !w.status.is_resolved()) {
            let (status, credit) = resolution_for(wager, &outcome);

            if credit > Decimal::ZERO {
                let reference = settlement_reference(&wager.id);
                let call = ledger.credit(&wager.user_id, credit, &reference);
                if let Err(e) = bounded(timeout, "credit", call).await {
                    warn!(
                        contest_id = %contest_id,
                        wager_id = %wager.id,
                        user_id = %wager.user_id,
                        error = %e,
                        "Settlement credit failed; contest left in settling state"
                    );
                    return Err(e.into());
                }
                credited += 1;
            }

            wager.resolve(status, credit);
        }

        contest.status = match outcome {
            Outcome::Cancelled => ContestStatus::Cancelled,
            _ => ContestStatus::Settled,
        };
        contest.settled_at = Some(Utc::now());

        let report = SettlementReport::from_contest(contest, outcome, false);
        info!(
            contest_id = %report.contest_id,
            outcome = %report.outcome,
            won = report.count(WagerStatus::Won),
            lost = report.count(WagerStatus::Lost),
            refunded = report.count(WagerStatus::Refunded),
            credits = credited,
            staked = format!("${:.2}", report.total_staked),
            credited = format!("${:.2}", report.total_credited),
            house_net = format!("${:.2}", report.house_net),
            "Contest settled"
        );

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
