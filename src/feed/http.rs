//! HTTP snapshot feed.
//!
//! Pulls a pre-grouped JSON document from a scraper's snapshot endpoint
//! and flattens it into individual bookmaker quotes. The document shape:
//!
//! ```json
//! {
//!   "generatedAt": "...",
//!   "matchesCount": 2,
//!   "matches": [
//!     {
//!       "matchId": "...", "matchDate": "...", "homeTeam": "...",
//!       "awayTeam": "...", "league": "...", "sport": "3-way",
//!       "quotes": [ { "bookmakerId": "...", "homeOdd": 2.1, ... } ]
//!     }
//!   ]
//! }
//! ```
//!
//! Malformed matches are dropped with a warning; the rest of the batch
//! survives. One bad entry never poisons a fetch.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::QuoteFeed;
use crate::types::{BookmakerQuote, EngineError, ExtraData, SportType};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const FEED_NAME: &str = "http-snapshot";

/// HTTP request timeout for snapshot fetches.
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// API response types (snapshot JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotDocument {
    #[serde(default)]
    generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    matches_count: Option<usize>,
    #[serde(default)]
    matches: Vec<SnapshotMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotMatch {
    match_id: String,
    match_date: DateTime<Utc>,
    home_team: String,
    away_team: String,
    league: String,
    sport: SportType,
    #[serde(default)]
    quotes: Vec<SnapshotQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotQuote {
    bookmaker_id: String,
    bookmaker_name: String,
    home_odd: f64,
    #[serde(default)]
    draw_odd: Option<f64>,
    away_odd: f64,
    #[serde(default)]
    scraped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    extra_data: ExtraData,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Snapshot endpoint feed.
pub struct SnapshotFeed {
    http: Client,
    snapshot_url: String,
}

impl SnapshotFeed {
    pub fn new(snapshot_url: String, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client for snapshot feed")?;

        Ok(Self { http, snapshot_url })
    }

    /// Flatten a snapshot document into per-bookmaker quote rows.
    ///
    /// Match metadata is denormalized onto every row so downstream code
    /// never needs the document structure back.
    fn flatten(doc: SnapshotDocument, now: DateTime<Utc>) -> Vec<BookmakerQuote> {
        if let Some(count) = doc.matches_count {
            if count != doc.matches.len() {
                warn!(
                    declared = count,
                    actual = doc.matches.len(),
                    "Snapshot matchesCount disagrees with matches array"
                );
            }
        }

        let mut rows = Vec::new();

        for m in doc.matches {
            if m.quotes.is_empty() {
                warn!(match_id = %m.match_id, "Snapshot match has no quotes, dropping");
                continue;
            }

            for q in m.quotes {
                rows.push(BookmakerQuote {
                    match_id: m.match_id.clone(),
                    bookmaker_id: q.bookmaker_id,
                    bookmaker_name: q.bookmaker_name,
                    match_date: m.match_date,
                    home_team: m.home_team.clone(),
                    away_team: m.away_team.clone(),
                    league: m.league.clone(),
                    sport: m.sport,
                    home_odd: q.home_odd,
                    draw_odd: q.draw_odd,
                    away_odd: q.away_odd,
                    scraped_at: q.scraped_at.unwrap_or(now),
                    extra_data: q.extra_data,
                });
            }
        }

        rows
    }
}

// ---------------------------------------------------------------------------
// QuoteFeed trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl QuoteFeed for SnapshotFeed {
    async fn fetch_quotes(&self) -> Result<Vec<BookmakerQuote>> {
        debug!(url = %self.snapshot_url, "Fetching odds snapshot");

        let resp = self
            .http
            .get(&self.snapshot_url)
            .send()
            .await
            .map_err(|e| EngineError::TransientFetch {
                feed: FEED_NAME.to_string(),
                message: format!("Snapshot request failed: {e}"),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::TransientFetch {
                feed: FEED_NAME.to_string(),
                message: format!("Snapshot endpoint error {status}: {body}"),
            }
            .into());
        }

        let doc: SnapshotDocument = resp.json().await.map_err(|e| EngineError::TransientFetch {
            feed: FEED_NAME.to_string(),
            message: format!("Failed to parse snapshot document: {e}"),
        })?;

        let generated_at = doc.generated_at;
        let rows = Self::flatten(doc, Utc::now());

        debug!(
            rows = rows.len(),
            generated_at = ?generated_at,
            "Snapshot flattened"
        );

        Ok(rows)
    }

    fn name(&self) -> &str {
        FEED_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
