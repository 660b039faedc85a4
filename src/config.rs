//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the webhook URL) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::types::Outcome;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub feed: FeedConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub name: String,
    /// Fallback polling interval when no push arrives.
    pub poll_interval_secs: u64,
    /// Quiet window after a push before the cycle runs; further pushes
    /// inside the window collapse into the same cycle.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Standing freebet watch, recomputed every cycle when set.
    #[serde(default)]
    pub freebet_watch: Option<FreebetWatchConfig>,
}

fn default_debounce_ms() -> u64 {
    500
}

/// A freebet the operator currently holds. The engine recomputes its
/// extraction against every match each cycle and alerts when a match
/// clears the threshold.
#[derive(Debug, Deserialize, Clone)]
pub struct FreebetWatchConfig {
    pub bookmaker_id: String,
    pub value: f64,
    pub outcome: Outcome,
    /// Alert only when extraction reaches this percentage.
    #[serde(default)]
    pub min_extraction_percent: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// "http" (snapshot endpoint) or "sqlite" (scraper-written store).
    pub mode: String,
    #[serde(default)]
    pub snapshot_url: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
    /// Restrict the sqlite feed to one league.
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    "ODDSIGHT/0.1.0 (odds-aggregation-engine)".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AlertsConfig {
    /// Env var holding the webhook URL. Absent means log-only alerts.
    #[serde(default)]
    pub webhook_url_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks that serde cannot express.
    fn validate(&self) -> Result<()> {
        match self.feed.mode.as_str() {
            "http" => {
                if self.feed.snapshot_url.is_none() {
                    anyhow::bail!("feed.mode = \"http\" requires feed.snapshot_url");
                }
            }
            "sqlite" => {
                if self.feed.database_url.is_none() {
                    anyhow::bail!("feed.mode = \"sqlite\" requires feed.database_url");
                }
            }
            other => anyhow::bail!("Unknown feed.mode: {other} (expected \"http\" or \"sqlite\")"),
        }

        if let Some(watch) = &self.engine.freebet_watch {
            if watch.value < 0.0 {
                anyhow::bail!("engine.freebet_watch.value must not be negative");
            }
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

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [engine]
        name = "ODDSIGHT-001"
        poll_interval_secs = 120

        [feed]
        mode = "sqlite"
        database_url = "sqlite://odds.db"
        league = "Premier League"

        [dashboard]
        enabled = true
        port = 8080
    "#;

    #[test]
    fn test_parse_minimal_config() {
        let cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.engine.name, "ODDSIGHT-001");
        assert_eq!(cfg.engine.poll_interval_secs, 120);
        assert_eq!(cfg.engine.debounce_ms, 500);
        assert!(cfg.engine.freebet_watch.is_none());
        assert_eq!(cfg.feed.league.as_deref(), Some("Premier League"));
        assert!(cfg.alerts.webhook_url_env.is_none());
    }

    #[test]
    fn test_parse_freebet_watch() {
        let toml_str = r#"
            [engine]
            name = "ODDSIGHT-001"
            poll_interval_secs = 120
            debounce_ms = 250

            [engine.freebet_watch]
            bookmaker_id = "bookb"
            value = 100.0
            outcome = "Away"
            min_extraction_percent = 30.0

            [feed]
            mode = "http"
            snapshot_url = "http://localhost:9000/snapshot"

            [dashboard]
            enabled = false
            port = 8080
        "#;

        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        cfg.validate().unwrap();
        let watch = cfg.engine.freebet_watch.unwrap();
        assert_eq!(watch.bookmaker_id, "bookb");
        assert_eq!(watch.value, 100.0);
        assert_eq!(watch.outcome, Outcome::Away);
        assert_eq!(watch.min_extraction_percent, 30.0);
        assert_eq!(cfg.engine.debounce_ms, 250);
    }

    #[test]
    fn test_http_mode_requires_url() {
        let toml_str = r#"
            [engine]
            name = "x"
            poll_interval_secs = 60

            [feed]
            mode = "http"

            [dashboard]
            enabled = false
            port = 8080
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_unknown_feed_mode_rejected() {
        let toml_str = r#"
            [engine]
            name = "x"
            poll_interval_secs = 60

            [feed]
            mode = "carrier-pigeon"

            [dashboard]
            enabled = false
            port = 8080
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_resolve_env_missing() {
        assert!(AppConfig::resolve_env("ODDSIGHT_TEST_DEFINITELY_UNSET_VAR").is_err());
    }
}
