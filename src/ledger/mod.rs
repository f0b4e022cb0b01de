//! Balance ledger integrations.
//!
//! Defines the `BalanceLedger` trait the engine debits and credits through,
//! and provides implementations for:
//! - `InMemoryLedger` — process-local balances (development, tests, demos)
//! - `HttpLedger` — REST balance service owned by another team

pub mod http;
pub mod memory;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::LedgerError;

pub use http::HttpLedger;
pub use memory::{InMemoryLedger, LedgerBook};

/// Abstraction over the service that owns users' spendable balances.
///
/// Every mutation carries a `reference` (the wager id, or a derived key).
/// Implementations must treat a repeated reference as already applied, so
/// the engine can retry a credit whose response was lost without paying
/// twice.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    /// Current spendable balance. Unknown users have a zero balance.
    async fn balance(&self, user_id: &str) -> Result<Decimal, LedgerError>;

    /// Remove `amount` from the user's balance. Fails atomically with
    /// `InsufficientFunds` if the balance is short at the time of the call.
    async fn debit(&self, user_id: &str, amount: Decimal, reference: &str)
        -> Result<(), LedgerError>;

    /// Add `amount` to the user's balance.
    async fn credit(&self, user_id: &str, amount: Decimal, reference: &str)
        -> Result<(), LedgerError>;

    /// Undo the mutation recorded under `reference`, if and only if it was
    /// applied. Unknown references are a successful no-op.
    async fn reverse(&self, user_id: &str, reference: &str) -> Result<(), LedgerError>;
}

/// Run a ledger call under a deadline. Expiry is reported as
/// `Unavailable`; the call itself may or may not have been applied.
pub async fn bounded<T, F>(timeout: Duration, operation: &str, call: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = timeout.as_millis() as u64, "Ledger call timed out");
            Err(LedgerError::Unavailable(format!(
                "{operation} timed out after {}ms",
                timeout.as_millis()
            )))
        }
    }
}
