//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the ledger token) are referenced by env-var name in the config
//! and resolved at runtime via `std::env::var`.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::rules::{OddsConfig, DEFAULT_CLOSING_WINDOW_SECS};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub engine: EngineSection,
    pub ledger: LedgerConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    /// Contest length when a create request names no deadline.
    pub default_contest_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSection {
    #[serde(default)]
    pub odds: OddsConfig,
    #[serde(default = "default_closing_window")]
    pub closing_window_secs: i64,
    #[serde(default = "default_ledger_timeout_ms")]
    pub ledger_timeout_ms: u64,
}

fn default_closing_window() -> i64 {
    DEFAULT_CLOSING_WINDOW_SECS
}

fn default_ledger_timeout_ms() -> u64 {
    5_000
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            odds: OddsConfig::default(),
            closing_window_secs: default_closing_window(),
            ledger_timeout_ms: default_ledger_timeout_ms(),
        }
    }
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            odds: self.odds.clone(),
            closing_window_secs: self.closing_window_secs,
            ledger_timeout: Duration::from_millis(self.ledger_timeout_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Memory,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub kind: LedgerKind,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Env var holding the bearer token for the HTTP ledger.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Opening balances for the in-memory ledger on a fresh start.
    #[serde(default)]
    pub seed_balances: HashMap<String, Decimal>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub snapshot_path: String,
    pub snapshot_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Err(e) = self.engine.odds.validate() {
            bail!("engine.odds: {e}");
        }
        if self.engine.closing_window_secs < 0 {
            bail!("engine.closing_window_secs must not be negative");
        }
        if self.engine.ledger_timeout_ms == 0 {
            bail!("engine.ledger_timeout_ms must be positive");
        }
        if self.service.default_contest_secs <= 0 {
            bail!("service.default_contest_secs must be positive");
        }
        if self.storage.snapshot_interval_secs == 0 {
            bail!("storage.snapshot_interval_secs must be positive");
        }
        if self.ledger.kind == LedgerKind::Http && self.ledger.base_url.is_none() {
            bail!("ledger.base_url is required when ledger.kind = \"http\"");
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
