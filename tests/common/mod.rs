//! Shared fixtures for integration tests.
//!
//! `FlakyLedger` wraps the in-memory ledger and can be told to fail, to
//! lose responses after applying a debit, to stall debits or credits, or to
//! allow only a fixed number of credits. Every call is recorded.

#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arena::clock::ManualClock;
use arena::engine::{ArenaEngine, EngineConfig, NewContest};
use arena::error::LedgerError;
use arena::ledger::{BalanceLedger, InMemoryLedger, LedgerBook};
use arena::types::Contestant;

#[derive(Debug, Default)]
struct Faults {
    /// Every call fails with this message before touching balances.
    error: Option<String>,
    /// Debits are applied, then reported as failed.
    lose_debit_responses: bool,
    /// Debits sleep this long before doing anything.
    debit_delay: Option<Duration>,
    /// Credits sleep this long before doing anything.
    credit_delay: Option<Duration>,
    /// Credits left before credits start failing.
    credit_budget: Option<usize>,
}

pub struct FlakyLedger {
    inner: InMemoryLedger,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<String>>,
}

impl FlakyLedger {
    pub fn new(balances: &[(&str, Decimal)]) -> Self {
        Self {
            inner: InMemoryLedger::with_balances(balances.iter().map(|(u, b)| (u.to_string(), *b))),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_error(&self, msg: &str) {
        self.faults.lock().unwrap().error = Some(msg.to_string());
    }

    pub fn lose_debit_responses(&self, on: bool) {
        self.faults.lock().unwrap().lose_debit_responses = on;
    }

    pub fn delay_debits(&self, delay: Duration) {
        self.faults.lock().unwrap().debit_delay = Some(delay);
    }

    pub fn delay_credits(&self, delay: Duration) {
        self.faults.lock().unwrap().credit_delay = Some(delay);
    }

    pub fn allow_credits(&self, n: usize) {
        self.faults.lock().unwrap().credit_budget = Some(n);
    }

    /// Clear every injected fault.
    pub fn heal(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }

    pub fn balance_of(&self, user_id: &str) -> Decimal {
        self.inner.balance_of(user_id)
    }

    pub fn export(&self) -> LedgerBook {
        self.inner.export()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(op)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn injected_error(&self) -> Option<LedgerError> {
        self.faults
            .lock()
            .unwrap()
            .error
            .clone()
            .map(LedgerError::Unavailable)
    }
}

#[async_trait]
impl BalanceLedger for FlakyLedger {
    async fn balance(&self, user_id: &str) -> Result<Decimal, LedgerError> {
        self.record(format!("balance {user_id}"));
        if let Some(e) = self.injected_error() {
            return Err(e);
        }
        self.inner.balance(user_id).await
    }

    async fn debit(&self, user_id: &str, amount: Decimal, reference: &str) -> Result<(), LedgerError> {
        self.record(format!("debit {user_id} {amount} {reference}"));
        let delay = self.faults.lock().unwrap().debit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.injected_error() {
            return Err(e);
        }
        self.inner.debit(user_id, amount, reference).await?;
        if self.faults.lock().unwrap().lose_debit_responses {
            return Err(LedgerError::Unavailable("response lost".into()));
        }
        Ok(())
    }

    async fn credit(&self, user_id: &str, amount: Decimal, reference: &str) -> Result<(), LedgerError> {
        self.record(format!("credit {user_id} {amount} {reference}"));
        let delay = self.faults.lock().unwrap().credit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.injected_error() {
            return Err(e);
        }
        {
            let mut faults = self.faults.lock().unwrap();
            match faults.credit_budget {
                Some(0) => return Err(LedgerError::Unavailable("credit budget exhausted".into())),
                Some(ref mut n) => *n -= 1,
                None => {}
            }
        }
        self.inner.credit(user_id, amount, reference).await
    }

    async fn reverse(&self, user_id: &str, reference: &str) -> Result<(), LedgerError> {
        self.record(format!("reverse {user_id} {reference}"));
        if let Some(e) = self.injected_error() {
            return Err(e);
        }
        self.inner.reverse(user_id, reference).await
    }
}

pub fn battle(id: &str) -> NewContest {
    NewContest {
        id: Some(id.to_string()),
        contestant_a: Contestant::new("alice", "Alice"),
        contestant_b: Contestant::new("bob", "Bob"),
        closes_at: None,
    }
}

/// Engine over a flaky ledger and a manual clock, with `contests` created
/// and open for voting.
pub async fn engine_with(
    ledger: Arc<FlakyLedger>,
    config: EngineConfig,
    contests: &[&str],
) -> (Arc<ArenaEngine>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let engine = Arc::new(ArenaEngine::new(config, ledger, clock.clone()));
    for id in contests {
        clock.set_remaining(id, 600);
        engine.create_contest(battle(id)).await.unwrap();
    }
    (engine, clock)
}
