//! Process-local balance ledger.
//!
//! Balances and applied references live behind a single mutex, so a debit's
//! balance check and subtraction happen atomically across every contest.
//! The whole book, references included, can be exported and restored, which
//! keeps reference idempotency intact across a restart.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::BalanceLedger;
use crate::error::LedgerError;

/// One applied mutation, keyed by reference. `delta` is signed: negative
/// for debits, positive for credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub user_id: String,
    pub delta: Decimal,
    #[serde(default)]
    pub reversed: bool,
}

/// Balances plus every applied reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerBook {
    pub balances: HashMap<String, Decimal>,
    #[serde(default)]
    pub entries: HashMap<String, Entry>,
}

impl LedgerBook {
    fn apply(&mut self, user_id: &str, delta: Decimal) -> Result<(), LedgerError> {
        let balance = self.balances.entry(user_id.to_string()).or_default();
        *balance = balance.checked_add(delta).ok_or_else(|| {
            LedgerError::Rejected(format!("balance of {user_id} would overflow"))
        })?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    book: Mutex<LedgerBook>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from known balances (seed data or a legacy snapshot).
    pub fn with_balances<I, S>(balances: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        Self::from_book(LedgerBook {
            balances: balances.into_iter().map(|(u, a)| (u.into(), a)).collect(),
            entries: HashMap::new(),
        })
    }

    /// Resume from an exported book.
    pub fn from_book(book: LedgerBook) -> Self {
        Self {
            book: Mutex::new(book),
        }
    }

    /// Top up a user outside of any wager flow.
    pub fn deposit(&self, user_id: &str, amount: Decimal) {
        let mut book = self.lock();
        let balance = book.balances.entry(user_id.to_string()).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Synchronous balance read for snapshots and tests.
    pub fn balance_of(&self, user_id: &str) -> Decimal {
        self.lock().balances.get(user_id).copied().unwrap_or_default()
    }

    /// Copy of the whole book, for persistence.
    pub fn export(&self) -> LedgerBook {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerBook> {
        // A panic mid-update can only happen between two map operations on
        // plain values, so the book is still usable after poisoning.
        self.book.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BalanceLedger for InMemoryLedger {
    async fn balance(&self, user_id: &str) -> Result<Decimal, LedgerError> {
        Ok(self.balance_of(user_id))
    }

    async fn debit(&self, user_id: &str, amount: Decimal, reference: &str) -> Result<(), LedgerError> {
        let mut book = self.lock();
        if book.entries.contains_key(reference) {
            debug!(user_id, reference, "Debit already applied");
            return Ok(());
        }

        let available = book.balances.get(user_id).copied().unwrap_or_default();
        if amount > available {
            return Err(LedgerError::InsufficientFunds {
                user_id: user_id.to_string(),
                needed: amount,
                available,
            });
        }

        book.balances.insert(user_id.to_string(), available - amount);
        book.entries.insert(
            reference.to_string(),
            Entry {
                user_id: user_id.to_string(),
                delta: -amount,
                reversed: false,
            },
        );
        debug!(user_id, %amount, reference, "Debited");
        Ok(())
    }

    async fn credit(&self, user_id: &str, amount: Decimal, reference: &str) -> Result<(), LedgerError> {
        let mut book = self.lock();
        if book.entries.contains_key(reference) {
            debug!(user_id, reference, "Credit already applied");
            return Ok(());
        }

        book.apply(user_id, amount)?;
        book.entries.insert(
            reference.to_string(),
            Entry {
                user_id: user_id.to_string(),
                delta: amount,
                reversed: false,
            },
        );
        debug!(user_id, %amount, reference, "Credited");
        Ok(())
    }

    async fn reverse(&self, user_id: &str, reference: &str) -> Result<(), LedgerError> {
        let mut book = self.lock();
        let entry = match book.entries.get(reference) {
            Some(entry) if !entry.reversed && entry.user_id == user_id => entry.clone(),
            _ => return Ok(()),
        };

        book.apply(user_id, -entry.delta)?;
        if let Some(applied) = book.entries.get_mut(reference) {
            applied.reversed = true;
        }
        debug!(user_id, reference, delta = %entry.delta, "Reversed");
        Ok(())
    }
}
