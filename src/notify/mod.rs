//! Notifications.
//!
//! Formats detected opportunities into human-readable alerts and fans
//! them out to configured sinks. Sinks are fire-and-forget: a failed
//! delivery is logged, never retried, and never blocks the cycle.

pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::types::{ArbitrageOpportunity, BookmakerQuote, FreebetOpportunity, MatchSnapshot};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One alert, ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Stable key so downstream consumers can suppress repeats.
    pub dedupe_key: String,
}

/// Abstraction over alert destinations.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;

    /// Sink name for logging and identification.
    fn name(&self) -> &str;
}

/// Sink that just writes alerts to the log. Always configured, so an
/// engine with no webhook still surfaces everything it finds.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        info!(
            title = %notification.title,
            dedupe_key = %notification.dedupe_key,
            "{}",
            notification.body
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Render an arbitrage alert.
///
/// Each leg line carries a deep link to the credited bookmaker's page
/// so the alert is actionable without opening the dashboard.
pub fn format_arbitrage(opp: &ArbitrageOpportunity, snapshot: &MatchSnapshot) -> Notification {
    let mut body = format!(
        "{} vs {} ({}) — index {:.4}, ROI {:.2}%",
        opp.home_team, opp.away_team, opp.league, opp.arbitrage_index, opp.roi_percent
    );
    for (outcome, price) in &opp.legs {
        body.push_str(&format!("\n  {outcome}: {price}"));
        if let Some(quote) = snapshot.quote_for(&price.bookmaker_id) {
            body.push_str(&format!("\n    {}", deep_link(quote)));
        }
    }

    Notification {
        title: format!("Surebet: {} vs {}", opp.home_team, opp.away_team),
        body,
        dedupe_key: format!("arb:{}", opp.key()),
    }
}

/// Render a freebet extraction alert, with a deep link to the freebet
/// bookmaker's page for the match.
pub fn format_freebet(opp: &FreebetOpportunity, snapshot: &MatchSnapshot) -> Notification {
    let r = &opp.result;
    let mut body = format!(
        "{} vs {} — freebet {:.2} on {} @ {}: lock in {:.2} ({:.1}% extraction)",
        opp.home_team,
        opp.away_team,
        opp.freebet_value,
        opp.freebet_outcome,
        opp.freebet_bookmaker,
        r.guaranteed_profit,
        r.extraction_percent,
    );
    body.push_str(&format!("\n  hedge HOME: {:.2}", r.stakes.home));
    if let Some(draw) = r.stakes.draw {
        body.push_str(&format!("\n  hedge DRAW: {draw:.2}"));
    }
    body.push_str(&format!("\n  hedge AWAY: {:.2}", r.stakes.away));
    if let Some(quote) = snapshot
        .quotes
        .iter()
        .find(|q| q.bookmaker_name == opp.freebet_bookmaker)
    {
        body.push_str(&format!("\n  {}", deep_link(quote)));
    }

    Notification {
        title: format!("Freebet: {} vs {}", opp.home_team, opp.away_team),
        body,
        dedupe_key: format!("freebet:{}", opp.key()),
    }
}

/// Build a clickable link to a bookmaker's page for this quote.
///
/// Scrapers that know the page attach it as `url` (or `link`) in the
/// quote's extra data. Without one we fall back to a bookmaker search
/// query over the fixture name.
pub fn deep_link(quote: &BookmakerQuote) -> String {
    for key in ["url", "link"] {
        if let Some(url) = quote.extra_data.get(key).and_then(|v| v.as_str()) {
            return url.to_string();
        }
    }

    format!(
        "https://www.google.com/search?q={}",
        urlencoding::encode(&format!(
            "{} {} vs {}",
            quote.bookmaker_name, quote.home_team, quote.away_team
        ))
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
