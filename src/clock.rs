//! Contest clocks.
//!
//! The engine never reads wall time itself; it asks a `ContestClock` how
//! long a contest has left and whether it was ended. That keeps phase logic
//! a pure function of the readings and makes it trivial to drive in tests.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// External source of contest timing.
pub trait ContestClock: Send + Sync {
    /// Seconds until the contest ends. Unknown contests read as ended (0).
    fn remaining_seconds(&self, contest_id: &str) -> i64;

    /// Whether the contest was ended by its host regardless of time left.
    fn is_ended(&self, contest_id: &str) -> bool;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Manual clock
// ---------------------------------------------------------------------------

/// Clock whose readings are set by hand.
#[derive(Debug, Default)]
pub struct ManualClock {
    readings: Mutex<HashMap<String, (i64, bool)>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_remaining(&self, contest_id: &str, secs: i64) {
        let mut readings = lock(&self.readings);
        readings.entry(contest_id.to_string()).or_insert((0, false)).0 = secs;
    }

    pub fn set_ended(&self, contest_id: &str, ended: bool) {
        let mut readings = lock(&self.readings);
        readings.entry(contest_id.to_string()).or_insert((0, false)).1 = ended;
    }
}

impl ContestClock for ManualClock {
    fn remaining_seconds(&self, contest_id: &str) -> i64 {
        lock(&self.readings).get(contest_id).map(|r| r.0).unwrap_or(0)
    }

    fn is_ended(&self, contest_id: &str) -> bool {
        lock(&self.readings).get(contest_id).map(|r| r.1).unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Deadline clock
// ---------------------------------------------------------------------------

/// Wall-clock timing from registered deadlines.
#[derive(Debug, Default)]
pub struct DeadlineClock {
    deadlines: Mutex<HashMap<String, DateTime<Utc>>>,
    ended: Mutex<HashMap<String, bool>>,
}

impl DeadlineClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, contest_id: &str, closes_at: DateTime<Utc>) {
        lock(&self.deadlines).insert(contest_id.to_string(), closes_at);
    }

    /// Forget a contest's deadline and end signal.
    pub fn unregister(&self, contest_id: &str) {
        lock(&self.deadlines).remove(contest_id);
        lock(&self.ended).remove(contest_id);
    }

    pub fn deadline(&self, contest_id: &str) -> Option<DateTime<Utc>> {
        lock(&self.deadlines).get(contest_id).copied()
    }

    pub fn end(&self, contest_id: &str) {
        lock(&self.ended).insert(contest_id.to_string(), true);
    }

    /// Remaining seconds at an arbitrary instant.
    pub fn remaining_at(&self, contest_id: &str, now: DateTime<Utc>) -> i64 {
        self.deadline(contest_id)
            .map(|closes_at| (closes_at - now).num_seconds())
            .unwrap_or(0)
    }
}

impl ContestClock for DeadlineClock {
    fn remaining_seconds(&self, contest_id: &str) -> i64 {
        self.remaining_at(contest_id, Utc::now())
    }

    fn is_ended(&self, contest_id: &str) -> bool {
        lock(&self.ended).get(contest_id).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.remaining_seconds("c1"), 0);
        assert!(!clock.is_ended("c1"));

        clock.set_remaining("c1", 120);
        assert_eq!(clock.remaining_seconds("c1"), 120);

        clock.set_ended("c1", true);
        assert!(clock.is_ended("c1"));
        assert_eq!(clock.remaining_seconds("c1"), 120);
    }

    #[test]
    fn test_deadline_clock_counts_down() {
        let clock = DeadlineClock::new();
        let now = Utc::now();
        clock.register("c1", now + Duration::seconds(300));

        assert_eq!(clock.remaining_at("c1", now), 300);
        assert_eq!(clock.remaining_at("c1", now + Duration::seconds(250)), 50);
        assert!(clock.remaining_at("c1", now + Duration::seconds(400)) < 0);
    }

    #[test]
    fn test_deadline_clock_unregister() {
        let clock = DeadlineClock::new();
        clock.register("c1", Utc::now() + Duration::seconds(300));
        clock.end("c1");

        clock.unregister("c1");
        assert!(clock.deadline("c1").is_none());
        assert!(!clock.is_ended("c1"));
    }

    #[test]
    fn test_deadline_clock_unknown_contest_is_over() {
        let clock = DeadlineClock::new();
        assert_eq!(clock.remaining_seconds("nope"), 0);
        assert!(clock.deadline("nope").is_none());
    }

    #[test]
    fn test_deadline_clock_end() {
        let clock = DeadlineClock::new();
        clock.register("c1", Utc::now() + Duration::hours(1));
        assert!(!clock.is_ended("c1"));
        clock.end("c1");
        assert!(clock.is_ended("c1"));
        assert!(clock.remaining_seconds("c1") > 3000);
    }
}
