//! Pure contest rules — odds, wager admission, and phase tracking.
//!
//! Nothing in here touches the ledger, the clock, or any lock; the engine
//! feeds these functions the state it has captured and applies the result.

pub mod odds;
pub mod phase;
pub mod validator;

pub use odds::{OddsCalculator, OddsConfig};
pub use phase::{PhaseTracker, DEFAULT_CLOSING_WINDOW_SECS};
pub use validator::{PlacementContext, WagerRequest, WagerValidator};
