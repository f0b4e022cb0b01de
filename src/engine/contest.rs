//! Per-contest state: contestants, pool, wagers, phase, and resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArenaError;
use crate::rules::validator::side_of;
use crate::rules::PhaseTracker;
use crate::types::{
    Contestant, ContestPhase, ContestStatus, OddsQuote, Outcome, SettlementRequest, Side, Wager,
    WagerPool,
};

/// Parameters for opening a new contest.
#[derive(Debug, Clone, Deserialize)]
pub struct NewContest {
    /// Generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub contestant_a: Contestant,
    pub contestant_b: Contestant,
    #[serde(default)]
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contest {
    pub id: String,
    pub contestants: [Contestant; 2],
    pub pool: WagerPool,
    pub wagers: Vec<Wager>,
    pub tracker: PhaseTracker,
    pub status: ContestStatus,
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    pub closes_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Read-only view handed to API callers.
#[derive(Debug, Clone, Serialize)]
pub struct ContestView {
    pub id: String,
    pub contestants: [Contestant; 2],
    pub phase: ContestPhase,
    pub status: ContestStatus,
    pub outcome: Option<Outcome>,
    pub pool: WagerPool,
    pub odds: OddsQuote,
    pub wager_count: usize,
    pub created_at: DateTime<Utc>,
    pub closes_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl NewContest {
    /// Reject parameters no contest can be built from.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(ArenaError::InvalidContest("contest id is empty".into()));
        }
        if self.contestant_a.id.is_empty() || self.contestant_b.id.is_empty() {
            return Err(ArenaError::InvalidContest("contestant id is empty".into()));
        }
        if self.contestant_a.id == self.contestant_b.id {
            return Err(ArenaError::InvalidContest(format!(
                "contestants must differ, both are {}",
                self.contestant_a.id
            )));
        }
        Ok(())
    }
}

impl Contest {
    pub fn new(params: NewContest) -> Result<Self, ArenaError> {
        params.validate()?;
        let id = params
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(Self {
            id,
            contestants: [params.contestant_a, params.contestant_b],
            pool: WagerPool::default(),
            wagers: Vec::new(),
            tracker: PhaseTracker::new(),
            status: ContestStatus::Live,
            outcome: None,
            created_at: Utc::now(),
            closes_at: params.closes_at,
            settled_at: None,
        })
    }

    /// New wagers are only possible before any outcome is recorded.
    pub fn is_accepting(&self) -> bool {
        self.status == ContestStatus::Live && self.outcome.is_none()
    }

    pub fn side_of(&self, contestant_id: &str) -> Option<Side> {
        side_of(&self.contestants, contestant_id)
    }

    pub fn contestant(&self, side: Side) -> &Contestant {
        match side {
            Side::A => &self.contestants[0],
            Side::B => &self.contestants[1],
        }
    }

    pub fn wager_of(&self, user_id: &str) -> Option<&Wager> {
        self.wagers.iter().find(|w| w.user_id == user_id)
    }

    /// Append an accepted wager and grow the pool by its stake.
    pub fn record_wager(&mut self, wager: Wager) {
        self.pool.add(wager.side, wager.amount);
        self.wagers.push(wager);
    }

    /// Update a contestant's running score.
    pub fn set_score(&mut self, contestant_id: &str, score: i64) -> Result<&Contestant, ArenaError> {
        if let Some(recorded) = &self.outcome {
            return Err(ArenaError::ConflictingOutcome {
                contest_id: self.id.clone(),
                recorded: recorded.to_string(),
            });
        }

        let contest_id = self.id.clone();
        let contestant = self
            .contestants
            .iter_mut()
            .find(|c| c.id == contestant_id)
            .ok_or_else(|| ArenaError::InvalidTarget {
                contest_id,
                contestant_id: contestant_id.to_string(),
            })?;
        contestant.current_score = score;
        Ok(contestant)
    }

    /// Turn a settlement request into a concrete outcome.
    pub fn outcome_for(&self, request: &SettlementRequest) -> Result<Outcome, ArenaError> {
        match request {
            SettlementRequest::Winner { contestant_id } => {
                if self.side_of(contestant_id).is_none() {
                    return Err(ArenaError::InvalidTarget {
                        contest_id: self.id.clone(),
                        contestant_id: contestant_id.clone(),
                    });
                }
                Ok(Outcome::winner(contestant_id))
            }
            SettlementRequest::Tie => Ok(Outcome::Tie),
            SettlementRequest::Scores => {
                let [a, b] = &self.contestants;
                Ok(match a.current_score.cmp(&b.current_score) {
                    std::cmp::Ordering::Greater => Outcome::winner(&a.id),
                    std::cmp::Ordering::Less => Outcome::winner(&b.id),
                    std::cmp::Ordering::Equal => Outcome::Tie,
                })
            }
        }
    }

    pub fn view(&self, odds: OddsQuote) -> ContestView {
        ContestView {
            id: self.id.clone(),
            contestants: self.contestants.clone(),
            phase: self.tracker.phase(),
            status: self.status,
            outcome: self.outcome.clone(),
            pool: self.pool.clone(),
            odds,
            wager_count: self.wagers.len(),
            created_at: self.created_at,
            closes_at: self.closes_at,
            settled_at: self.settled_at,
        }
    }
}
