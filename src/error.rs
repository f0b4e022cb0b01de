//! Error types for the ARENA engine and its collaborators.

use rust_decimal::Decimal;

/// Failures reported by a balance ledger.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient funds for {user_id}: need ${needed:.2}, have ${available:.2}")]
    InsufficientFunds {
        user_id: String,
        needed: Decimal,
        available: Decimal,
    },

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger rejected the mutation: {0}")]
    Rejected(String),
}

/// Domain errors surfaced to callers of the engine.
///
/// Every variant is recoverable; the API layer renders each one as a
/// distinct user-facing message via [`ArenaError::kind`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArenaError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: need ${needed:.2}, have ${available:.2}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("Voting is closed for contest {0}")]
    VotingClosed(String),

    #[error("User {user_id} already has a wager in contest {contest_id}")]
    DuplicateWager { contest_id: String, user_id: String },

    #[error("Contestant {contestant_id} is not part of contest {contest_id}")]
    InvalidTarget {
        contest_id: String,
        contestant_id: String,
    },

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Contest not found: {0}")]
    ContestNotFound(String),

    #[error("Contest already exists: {0}")]
    ContestExists(String),

    #[error("Contest {0} is still live and cannot be settled yet")]
    ContestStillLive(String),

    #[error("Contest {contest_id} was already resolved as {recorded}")]
    ConflictingOutcome { contest_id: String, recorded: String },

    #[error("Invalid contest: {0}")]
    InvalidContest(String),
}

impl ArenaError {
    /// Stable machine-readable code for clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ArenaError::InvalidAmount(_) => "invalid_amount",
            ArenaError::InsufficientBalance { .. } => "insufficient_balance",
            ArenaError::VotingClosed(_) => "voting_closed",
            ArenaError::DuplicateWager { .. } => "duplicate_wager",
            ArenaError::InvalidTarget { .. } => "invalid_target",
            ArenaError::LedgerUnavailable(_) => "ledger_unavailable",
            ArenaError::ContestNotFound(_) => "contest_not_found",
            ArenaError::ContestExists(_) => "contest_exists",
            ArenaError::ContestStillLive(_) => "contest_still_live",
            ArenaError::ConflictingOutcome { .. } => "conflicting_outcome",
            ArenaError::InvalidContest(_) => "invalid_contest",
        }
    }
}

impl From<LedgerError> for ArenaError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                needed, available, ..
            } => ArenaError::InsufficientBalance { needed, available },
            LedgerError::Unavailable(msg) => ArenaError::LedgerUnavailable(msg),
            LedgerError::Rejected(msg) => ArenaError::InvalidAmount(msg),
        }
    }
}
