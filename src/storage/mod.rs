//! Persistence layer.
//!
//! Saves and loads a JSON snapshot of every contest (and, when the ledger is
//! in-memory, its balances and applied references) so a restart does not
//! drop open pools or forget which credits were already paid. This is a
//! restart convenience, not a transactional store: anything placed after
//! the last snapshot is lost on a crash.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::engine::Contest;
use crate::ledger::LedgerBook;

/// Default snapshot file path.
pub const DEFAULT_SNAPSHOT_FILE: &str = "arena_snapshot.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: DateTime<Utc>,
    pub contests: Vec<Contest>,
    /// In-memory ledger book, read under the same locks as `contests`.
    /// Absent when balances live elsewhere.
    #[serde(default)]
    pub ledger: Option<LedgerBook>,
}

impl Snapshot {
    pub fn new(contests: Vec<Contest>, ledger: Option<LedgerBook>) -> Self {
        Self {
            saved_at: Utc::now(),
            contests,
            ledger,
        }
    }

    pub fn wager_count(&self) -> usize {
        self.contests.iter().map(|c| c.wagers.len()).sum()
    }
}

/// Save a snapshot to a JSON file. Writes to a sibling temp file first and
/// renames it over the target, so a crash mid-write keeps the old snapshot.
pub fn save_snapshot(snapshot: &Snapshot, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_SNAPSHOT_FILE);
    let json = serde_json::to_string_pretty(snapshot)
        .context("Failed to serialise snapshot")?;

    let tmp = format!("{path}.tmp");
    std::fs::write(&tmp, &json)
        .context(format!("Failed to write snapshot to {tmp}"))?;
    std::fs::rename(&tmp, path)
        .context(format!("Failed to move snapshot into place at {path}"))?;

    debug!(
        path,
        contests = snapshot.contests.len(),
        wagers = snapshot.wager_count(),
        "Snapshot saved"
    );
    Ok(())
}

/// Load a snapshot from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_snapshot(path: Option<&str>) -> Result<Option<Snapshot>> {
    let path = path.unwrap_or(DEFAULT_SNAPSHOT_FILE);

    if !Path::new(path).exists() {
        info!(path, "No snapshot found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read snapshot from {path}"))?;

    let snapshot: Snapshot = serde_json::from_str(&json)
        .context(format!("Failed to parse snapshot from {path}"))?;

    info!(
        path,
        saved_at = %snapshot.saved_at,
        contests = snapshot.contests.len(),
        wagers = snapshot.wager_count(),
        "Snapshot loaded from disk"
    );

    Ok(Some(snapshot))
}

/// Delete the snapshot file (for testing or reset).
pub fn delete_snapshot(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_SNAPSHOT_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete snapshot file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
