//! ARENA — pari-mutuel battle wagering engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores contests from the last snapshot (or starts fresh), serves the
//! HTTP API, and snapshots periodically until shutdown.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use arena::api::{self, ApiState};
use arena::clock::DeadlineClock;
use arena::config::{AppConfig, LedgerKind};
use arena::engine::ArenaEngine;
use arena::ledger::{BalanceLedger, HttpLedger, InMemoryLedger};
use arena::storage::{self, Snapshot};

const BANNER: &str = r#"
    _    ____  _____ _   _    _
   / \  |  _ \| ____| \ | |  / \
  / _ \ | |_) |  _| |  \| | / _ \
 / ___ \|  _ <| |___| |\  |/ ___ \
/_/   \_\_| \_\_____|_| \_/_/   \_\

  Pari-mutuel battle wagering engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    let engine_cfg = cfg.engine.to_engine_config();
    info!(
        service = %cfg.service.name,
        house_edge = %engine_cfg.odds.house_edge,
        odds_floor = %engine_cfg.odds.odds_floor,
        closing_window_secs = engine_cfg.closing_window_secs,
        ledger = ?cfg.ledger.kind,
        "ARENA starting up"
    );

    // -- Restore snapshot ------------------------------------------------

    let snapshot_path = cfg.storage.snapshot_path.as_str();
    let snapshot = storage::load_snapshot(Some(snapshot_path))?;

    // -- Initialise components -------------------------------------------

    let (ledger, memory_ledger) = build_ledger(&cfg, snapshot.as_ref())?;
    let clock = Arc::new(DeadlineClock::new());
    let engine = Arc::new(ArenaEngine::new(engine_cfg, ledger, clock.clone()));

    if let Some(snapshot) = snapshot {
        for contest in &snapshot.contests {
            if let Some(closes_at) = contest.closes_at {
                clock.register(&contest.id, closes_at);
            }
        }
        let restored = engine.restore(snapshot.contests).await;
        info!(contests = restored, "Resumed from snapshot");
    } else {
        info!("Fresh start");
    }

    if cfg.api.enabled {
        let state = Arc::new(ApiState::new(
            engine.clone(),
            clock.clone(),
            cfg.service.default_contest_secs,
        ));
        api::spawn_api(state, cfg.api.port).await?;
    } else {
        warn!("API disabled in config; engine is only reachable in-process");
    }

    // -- Main loop -------------------------------------------------------

    let mut interval =
        tokio::time::interval(Duration::from_secs(cfg.storage.snapshot_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        snapshot_interval_secs = cfg.storage.snapshot_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = save(&engine, memory_ledger.as_deref(), snapshot_path).await {
                    error!(error = %e, "Failed to save snapshot");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // Save final snapshot
    save(&engine, memory_ledger.as_deref(), snapshot_path).await?;
    let contests = engine.contests().await;
    info!(
        contests = contests.len(),
        wagers = contests.iter().map(|c| c.wager_count).sum::<usize>(),
        "ARENA shut down cleanly."
    );

    Ok(())
}

/// Build the configured ledger. The in-memory ledger is also returned typed
/// so its book can be written into snapshots.
fn build_ledger(
    cfg: &AppConfig,
    snapshot: Option<&Snapshot>,
) -> Result<(Arc<dyn BalanceLedger>, Option<Arc<InMemoryLedger>>)> {
    let timeout = cfg.engine.to_engine_config().ledger_timeout;

    match cfg.ledger.kind {
        LedgerKind::Memory => {
            let ledger = match snapshot.and_then(|s| s.ledger.clone()) {
                Some(book) => {
                    info!(
                        accounts = book.balances.len(),
                        references = book.entries.len(),
                        "Ledger restored from snapshot"
                    );
                    InMemoryLedger::from_book(book)
                }
                None => {
                    info!(
                        accounts = cfg.ledger.seed_balances.len(),
                        "Ledger seeded from config"
                    );
                    InMemoryLedger::with_balances(cfg.ledger.seed_balances.clone())
                }
            };
            let ledger = Arc::new(ledger);
            let shared: Arc<dyn BalanceLedger> = ledger.clone();
            Ok((shared, Some(ledger)))
        }
        LedgerKind::Http => {
            let base_url = cfg
                .ledger
                .base_url
                .as_deref()
                .context("ledger.base_url is required for the HTTP ledger")?;

            let token = match cfg.ledger.api_key_env.as_deref() {
                Some(env) => match AppConfig::resolve_env(env) {
                    Ok(value) => Some(SecretString::new(value)),
                    Err(e) => {
                        warn!(error = %e, "No ledger token; calling ledger unauthenticated");
                        None
                    }
                },
                None => None,
            };

            info!(base_url, timeout_ms = timeout.as_millis() as u64, "Using HTTP ledger");
            let shared: Arc<dyn BalanceLedger> = Arc::new(HttpLedger::new(base_url, token, timeout)?);
            Ok((shared, None))
        }
    }
}

/// Write the current contests (and the in-memory ledger book) to disk. The
/// book is read while every contest is locked, so the two always agree.
async fn save(engine: &ArenaEngine, ledger: Option<&InMemoryLedger>, path: &str) -> Result<()> {
    let (contests, book) = engine.snapshot_with(|| ledger.map(|l| l.export())).await;
    storage::save_snapshot(&Snapshot::new(contests, book), Some(path))
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("arena=info"));

    let json_logging = std::env::var("ARENA_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
