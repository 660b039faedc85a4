//! Quote feeds.
//!
//! Defines the `QuoteFeed` trait and provides implementations for:
//! - HTTP snapshot endpoint — pre-grouped JSON document from a scraper
//! - SQLite store — rows written by an external scraper process
//!
//! Feeds hand the engine a flat batch of bookmaker quotes per cycle;
//! grouping, staleness and dedupe are the aggregator's job.

pub mod http;
pub mod store;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::BookmakerQuote;

/// Abstraction over odds sources.
///
/// A fetch returns everything the source currently knows; the engine
/// treats each batch as a full snapshot, not a delta. Errors are
/// transient by convention — the coordinator logs and retries next
/// cycle.
#[async_trait]
pub trait QuoteFeed: Send + Sync {
    /// Fetch the current batch of quotes from this feed.
    async fn fetch_quotes(&self) -> Result<Vec<BookmakerQuote>>;

    /// Feed name for logging and identification.
    fn name(&self) -> &str;
}

/// A push notification that fresh data is available upstream.
///
/// Carries no payload. The coordinator reacts by running a full fetch,
/// so a burst of these collapses into one cycle.
#[derive(Debug, Clone)]
pub struct FeedUpdate {
    /// Which source announced the update (for logging).
    pub source: String,
}
