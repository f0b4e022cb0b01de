//! Core engine — contests, wager placement, and settlement.
//!
//! `ArenaEngine` owns every contest behind its own async mutex. Placement,
//! settlement, score updates and end signals each hold that lock for their
//! whole read → validate → ledger → apply sequence, so a contest only ever
//! has one writer. Balances are never held here; they live in the
//! `BalanceLedger`, which rejects overdrafts atomically across contests.

pub mod contest;
pub mod settlement;

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::clock::ContestClock;
use crate::error::{ArenaError, LedgerError};
use crate::ledger::{bounded, BalanceLedger};
use crate::rules::{
    OddsCalculator, OddsConfig, PlacementContext, WagerRequest, WagerValidator,
    DEFAULT_CLOSING_WINDOW_SECS,
};
use crate::types::{
    Contestant, ContestPhase, OddsQuote, Outcome, SettlementRequest, Wager,
};

pub use contest::{Contest, ContestView, NewContest};
pub use settlement::{SettlementReport, Settler};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub odds: OddsConfig,
    /// Seconds before the end during which voting is closed.
    pub closing_window_secs: i64,
    /// Upper bound on every individual ledger call.
    pub ledger_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            odds: OddsConfig::default(),
            closing_window_secs: DEFAULT_CLOSING_WINDOW_SECS,
            ledger_timeout: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ArenaEngine {
    odds: OddsCalculator,
    closing_window_secs: i64,
    ledger_timeout: Duration,
    ledger: Arc<dyn BalanceLedger>,
    clock: Arc<dyn ContestClock>,
    contests: RwLock<HashMap<String, Arc<Mutex<Contest>>>>,
}

impl ArenaEngine {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<dyn BalanceLedger>,
        clock: Arc<dyn ContestClock>,
    ) -> Self {
        Self {
            odds: OddsCalculator::new(config.odds),
            closing_window_secs: config.closing_window_secs,
            ledger_timeout: config.ledger_timeout,
            ledger,
            clock,
            contests: RwLock::new(HashMap::new()),
        }
    }

    /// Balance as reported by the ledger, under the usual call deadline.
    pub async fn balance(&self, user_id: &str) -> Result<Decimal, ArenaError> {
        Ok(bounded(self.ledger_timeout, "balance", self.ledger.balance(user_id)).await?)
    }

    async fn handle(&self, contest_id: &str) -> Result<Arc<Mutex<Contest>>, ArenaError> {
        self.contests
            .read()
            .await
            .get(contest_id)
            .cloned()
            .ok_or_else(|| ArenaError::ContestNotFound(contest_id.to_string()))
    }

    /// Fold the clock's current reading into the contest's phase tracker.
    fn observe(&self, contest: &mut Contest) -> ContestPhase {
        let remaining = self.clock.remaining_seconds(&contest.id);
        let ended = self.clock.is_ended(&contest.id);
        contest
            .tracker
            .observe(remaining, ended, self.closing_window_secs)
    }

    // -- Contest lifecycle -----------------------------------------------

    pub async fn create_contest(&self, params: NewContest) -> Result<ContestView, ArenaError> {
        let contest = Contest::new(params)?;
        let view = contest.view(self.odds.quote(&contest.pool));

        let mut contests = self.contests.write().await;
        if contests.contains_key(&contest.id) {
            return Err(ArenaError::ContestExists(contest.id));
        }

        info!(
            contest_id = %contest.id,
            contestant_a = %contest.contestants[0],
            contestant_b = %contest.contestants[1],
            closes_at = ?contest.closes_at,
            "Contest created"
        );
        contests.insert(contest.id.clone(), Arc::new(Mutex::new(contest)));
        Ok(view)
    }

    /// Explicit end signal: closes voting immediately and makes the
    /// contest eligible for settlement.
    pub async fn end_contest(&self, contest_id: &str) -> Result<ContestView, ArenaError> {
        let handle = self.handle(contest_id).await?;
        let mut contest = handle.lock().await;

        if !contest.tracker.is_closed() {
            contest.tracker.end();
            info!(contest_id, wagers = contest.wagers.len(), "Contest ended early");
        }
        Ok(contest.view(self.odds.quote(&contest.pool)))
    }

    pub async fn update_score(
        &self,
        contest_id: &str,
        contestant_id: &str,
        score: i64,
    ) -> Result<Contestant, ArenaError> {
        let handle = self.handle(contest_id).await?;
        let mut contest = handle.lock().await;
        let contestant = contest.set_score(contestant_id, score)?.clone();
        info!(contest_id, contestant_id, score, "Score updated");
        Ok(contestant)
    }

    // -- Reads ----------------------------------------------------------

    /// Current odds for both sides of a contest.
    pub async fn get_odds(&self, contest_id: &str) -> Result<OddsQuote, ArenaError> {
        let handle = self.handle(contest_id).await?;
        let contest = handle.lock().await;
        Ok(self.odds.quote(&contest.pool))
    }

    pub async fn contest(&self, contest_id: &str) -> Result<ContestView, ArenaError> {
        let handle = self.handle(contest_id).await?;
        let mut contest = handle.lock().await;
        self.observe(&mut contest);
        Ok(contest.view(self.odds.quote(&contest.pool)))
    }

    /// Every contest, oldest first.
    pub async fn contests(&self) -> Vec<ContestView> {
        let handles: Vec<_> = self.contests.read().await.values().cloned().collect();

        let mut views = Vec::with_capacity(handles.len());
        for handle in handles {
            let mut contest = handle.lock().await;
            self.observe(&mut contest);
            views.push(contest.view(self.odds.quote(&contest.pool)));
        }
        views.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        views
    }

    pub async fn wagers(&self, contest_id: &str) -> Result<Vec<Wager>, ArenaError> {
        let handle = self.handle(contest_id).await?;
        let contest = handle.lock().await;
        Ok(contest.wagers.clone())
    }

    // -- Placement ------------------------------------------------------

    /// Validate and place a wager. On success the stake has been debited,
    /// the pool has grown by `amount`, and the returned wager carries the
    /// odds quoted just before it was added.
    pub async fn place_wager(
        &self,
        contest_id: &str,
        user_id: &str,
        contestant_id: &str,
        amount: Decimal,
    ) -> Result<Wager, ArenaError> {
        let handle = self.handle(contest_id).await?;
        let mut contest = handle.lock().await;

        let phase = self.observe(&mut contest);
        let request = WagerRequest {
            contest_id,
            user_id,
            contestant_id,
            amount,
        };
        let ctx = PlacementContext {
            phase,
            accepting: contest.is_accepting(),
            contestants: &contest.contestants,
            has_existing_wager: contest.wager_of(user_id).is_some(),
        };
        let side = WagerValidator::check_request(&request, &ctx)?;

        let balance = self.balance(user_id).await?;
        WagerValidator::check_balance(amount, balance)?;
        if !contest.pool.can_accept(amount) {
            return Err(ArenaError::InvalidAmount(format!(
                "${amount:.2} would overflow the pool"
            )));
        }

        let odds = self.odds.odds_for(&contest.pool, side);
        let wager = Wager::new(contest_id, user_id, contestant_id, side, amount, odds)?;

        let debit = self.ledger.debit(user_id, amount, &wager.id);
        match bounded(self.ledger_timeout, "debit", debit).await {
            Ok(()) => {}
            Err(LedgerError::Unavailable(reason)) => {
                self.compensate(user_id, &wager.id).await;
                return Err(ArenaError::LedgerUnavailable(reason));
            }
            Err(e) => return Err(e.into()),
        }

        contest.record_wager(wager.clone());

        info!(
            contest_id,
            user_id,
            wager_id = %wager.id,
            side = %side,
            amount = format!("${:.2}", amount),
            odds = %odds,
            potential_payout = format!("${:.2}", wager.potential_payout),
            pool = %contest.pool,
            "Wager placed"
        );

        Ok(wager)
    }

    /// Undo a debit whose result is unknown. Nothing is recorded for the
    /// wager, so the stake must not stay with the house either.
    async fn compensate(&self, user_id: &str, reference: &str) {
        let reversal = self.ledger.reverse(user_id, reference);
        match bounded(self.ledger_timeout, "reverse", reversal).await {
            Ok(()) => warn!(user_id, reference, "Debit outcome unknown; reversal issued"),
            Err(e) => error!(
                user_id,
                reference,
                error = %e,
                "Reversal failed; ledger entry needs manual reconciliation"
            ),
        }
    }

    // -- Settlement -----------------------------------------------------

    /// Resolve every active wager of a closed contest.
    pub async fn settle_contest(
        &self,
        contest_id: &str,
        request: SettlementRequest,
    ) -> Result<SettlementReport, ArenaError> {
        let handle = self.handle(contest_id).await?;
        let mut contest = handle.lock().await;

        let outcome = contest.outcome_for(&request)?;
        self.settle_locked(&mut contest, outcome).await
    }

    /// Refund every wager and retire the contest, whatever its phase.
    pub async fn cancel_contest(&self, contest_id: &str) -> Result<SettlementReport, ArenaError> {
        let handle = self.handle(contest_id).await?;
        let mut contest = handle.lock().await;
        self.settle_locked(&mut contest, Outcome::Cancelled).await
    }

    async fn settle_locked(
        &self,
        contest: &mut Contest,
        outcome: Outcome,
    ) -> Result<SettlementReport, ArenaError> {
        let phase = self.observe(contest);
        if contest.outcome.is_none() && outcome != Outcome::Cancelled && phase != ContestPhase::Closed {
            return Err(ArenaError::ContestStillLive(contest.id.clone()));
        }

        Settler::settle(contest, outcome, self.ledger.as_ref(), self.ledger_timeout).await
    }

    // -- Persistence ----------------------------------------------------

    /// Copy of every contest, for snapshots.
    pub async fn snapshot(&self) -> Vec<Contest> {
        self.snapshot_with(|| ()).await.0
    }

    /// Copy every contest and run `capture` while all of them are locked.
    ///
    /// No placement, settlement or creation can run in between, so ledger
    /// state read inside `capture` matches the copied contests exactly.
    /// Locks are taken in id order; every other path holds at most one.
    pub async fn snapshot_with<T>(&self, capture: impl FnOnce() -> T) -> (Vec<Contest>, T) {
        let map = self.contests.read().await;
        let mut ids: Vec<&String> = map.keys().collect();
        ids.sort();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(map[id.as_str()].clone().lock_owned().await);
        }

        let captured = capture();
        let mut out: Vec<Contest> = guards.iter().map(|g| (**g).clone()).collect();
        drop(guards);

        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        (out, captured)
    }

    /// Load contests from a snapshot, replacing any with the same id.
    /// Returns how many were loaded.
    pub async fn restore(&self, contests: Vec<Contest>) -> usize {
        let mut map = self.contests.write().await;
        let count = contests.len();
        for contest in contests {
            map.insert(contest.id.clone(), Arc::new(Mutex::new(contest)));
        }
        count
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
