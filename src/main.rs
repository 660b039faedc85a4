//! ODDSIGHT — Odds Aggregation & Opportunity Detection Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the quote feed, notification sinks and dashboard together, and
//! runs the update coordinator with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use oddsight::config::AppConfig;
use oddsight::dashboard::{self, DashboardState};
use oddsight::engine::coordinator::UpdateCoordinator;
use oddsight::feed::http::SnapshotFeed;
use oddsight::feed::store::QuoteStore;
use oddsight::feed::QuoteFeed;
use oddsight::notify::webhook::WebhookSink;
use oddsight::notify::{LogSink, NotificationSink};

const BANNER: &str = r#"
  ___  ____  ____  ____ ___ ____ _   _ _____
 / _ \|  _ \|  _ \/ ___|_ _/ ___| | | |_   _|
| | | | | | | | | \___ \| | |  _| |_| | | |
| |_| | |_| | |_| |___) | | |_| |  _  | | |
 \___/|____/|____/|____/___\____|_| |_| |_|

  Odds Aggregation & Opportunity Detection Engine
  v0.1.0
"#;

/// Capacity of the push-update channel. Pushes beyond a pending cycle
/// carry no extra information, so the channel stays tiny.
const PUSH_CHANNEL_CAPACITY: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        engine_name = %cfg.engine.name,
        poll_interval_secs = cfg.engine.poll_interval_secs,
        feed_mode = %cfg.feed.mode,
        "ODDSIGHT starting up"
    );

    // -- Initialise components -------------------------------------------

    // Quote feed
    let feed: Arc<dyn QuoteFeed> = match cfg.feed.mode.as_str() {
        "http" => {
            let url = cfg
                .feed
                .snapshot_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("feed.snapshot_url missing"))?;
            info!(url = %url, "Using HTTP snapshot feed");
            Arc::new(SnapshotFeed::new(url, &cfg.feed.user_agent)?)
        }
        "sqlite" => {
            let url = cfg
                .feed
                .database_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("feed.database_url missing"))?;
            info!(url = %url, league = ?cfg.feed.league, "Using SQLite quote store feed");
            Arc::new(QuoteStore::connect(&url, cfg.feed.league.clone()).await?)
        }
        other => anyhow::bail!("Unknown feed.mode: {other}"),
    };

    // Notification sinks (log always, webhook when configured)
    let mut sinks: Vec<Box<dyn NotificationSink>> = vec![Box::new(LogSink)];
    if let Some(env_name) = &cfg.alerts.webhook_url_env {
        match AppConfig::resolve_env(env_name) {
            Ok(url) => {
                info!("Webhook alerts enabled");
                sinks.push(Box::new(WebhookSink::new(url)?));
            }
            Err(e) => {
                warn!(error = %e, "Webhook URL not resolvable — log-only alerts");
            }
        }
    }

    if let Some(watch) = &cfg.engine.freebet_watch {
        info!(
            bookmaker = %watch.bookmaker_id,
            value = watch.value,
            outcome = %watch.outcome,
            min_extraction = watch.min_extraction_percent,
            "Freebet watch active"
        );
    }

    // Push channel + dashboard (the dashboard's /api/refresh is the
    // push ingress)
    let (push_tx, push_rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
    let dash_state = Arc::new(DashboardState::new(cfg.engine.name.clone(), push_tx));

    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(dash_state.clone(), cfg.dashboard.port)?;
    }

    let coordinator = UpdateCoordinator::new(
        feed,
        sinks,
        &cfg.engine,
        Some(dash_state),
    );

    // -- Main loop -------------------------------------------------------

    info!(
        interval_secs = cfg.engine.poll_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    tokio::select! {
        _ = coordinator.run(push_rx) => {
            warn!("Coordinator stopped unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    info!("ODDSIGHT shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("oddsight=info"));

    let json_logging = std::env::var("ODDSIGHT_LOG_JSON").is_ok();

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
