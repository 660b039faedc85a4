//! Shared types for the ODDSIGHT engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that feed, engine, and
//! notification modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key-value bag attached to a quote by the upstream scraper.
/// The engine never interprets its contents — it is only forwarded
/// to build deep links in notifications.
pub type ExtraData = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Number of possible results for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SportType {
    /// Binary sports — no draw possible (tennis, basketball with OT, ...).
    #[serde(rename = "2-way")]
    TwoWay,
    /// Ternary sports — home/draw/away (football, ...).
    #[serde(rename = "3-way")]
    ThreeWay,
}

impl SportType {
    /// Whether a draw is a possible result.
    pub fn has_draw(&self) -> bool {
        matches!(self, SportType::ThreeWay)
    }

    /// All known sport types (useful for iteration).
    pub const ALL: &'static [SportType] = &[SportType::TwoWay, SportType::ThreeWay];
}

impl fmt::Display for SportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SportType::TwoWay => write!(f, "2-way"),
            SportType::ThreeWay => write!(f, "3-way"),
        }
    }
}

/// Attempt to parse a string into a SportType (case-insensitive).
impl std::str::FromStr for SportType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "2-way" | "2way" | "two-way" | "binary" => Ok(SportType::TwoWay),
            "3-way" | "3way" | "three-way" | "ternary" => Ok(SportType::ThreeWay),
            _ => Err(anyhow::anyhow!("Unknown sport type: {s}")),
        }
    }
}

/// One of the backable results of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    /// The outcomes the *other* legs must cover when this one is backed.
    pub fn others(&self, sport: SportType) -> Vec<Outcome> {
        match (self, sport) {
            (Outcome::Home, SportType::TwoWay) => vec![Outcome::Away],
            (Outcome::Away, SportType::TwoWay) => vec![Outcome::Home],
            (Outcome::Draw, SportType::TwoWay) => vec![Outcome::Home, Outcome::Away],
            (Outcome::Home, SportType::ThreeWay) => vec![Outcome::Draw, Outcome::Away],
            (Outcome::Draw, SportType::ThreeWay) => vec![Outcome::Home, Outcome::Away],
            (Outcome::Away, SportType::ThreeWay) => vec![Outcome::Home, Outcome::Draw],
        }
    }

    /// All outcomes in display order.
    pub const ALL: &'static [Outcome] = &[Outcome::Home, Outcome::Draw, Outcome::Away];
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Home => write!(f, "HOME"),
            Outcome::Draw => write!(f, "DRAW"),
            Outcome::Away => write!(f, "AWAY"),
        }
    }
}

/// Attempt to parse a string into an Outcome (case-insensitive).
/// Accepts the common 1/X/2 notation as well.
impl std::str::FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "home" | "1" => Ok(Outcome::Home),
            "draw" | "x" => Ok(Outcome::Draw),
            "away" | "2" => Ok(Outcome::Away),
            _ => Err(anyhow::anyhow!("Unknown outcome: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// One bookmaker's price for one match at one point in time.
///
/// Immutable once created: a fresher quote for the same
/// (match_id, bookmaker_id) supersedes it, nothing mutates in place.
/// Match metadata is carried denormalized on the row — team/league
/// normalization happens upstream, so quotes for the same real-world
/// match share one `match_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmakerQuote {
    pub match_id: String,
    pub bookmaker_id: String,
    pub bookmaker_name: String,
    /// Scheduled kickoff of the match.
    pub match_date: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub sport: SportType,
    pub home_odd: f64,
    /// Absent for two-outcome sports.
    pub draw_odd: Option<f64>,
    pub away_odd: f64,
    /// When the upstream scraper captured this price.
    pub scraped_at: DateTime<Utc>,
    #[serde(default)]
    pub extra_data: ExtraData,
}

impl fmt::Display for BookmakerQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} vs {} | 1:{:.2}",
            self.bookmaker_name, self.home_team, self.away_team, self.home_odd,
        )?;
        if let Some(d) = self.draw_odd {
            write!(f, " X:{d:.2}")?;
        }
        write!(f, " 2:{:.2}", self.away_odd)
    }
}

impl BookmakerQuote {
    /// The odd quoted for a given outcome, if priced.
    pub fn odd_for(&self, outcome: Outcome) -> Option<f64> {
        match outcome {
            Outcome::Home => Some(self.home_odd),
            Outcome::Draw => self.draw_odd,
            Outcome::Away => Some(self.away_odd),
        }
    }

    /// Whether the required (home/away) odds are usable prices.
    /// Decimal odds below 1.0 cannot pay out and indicate a scrape glitch.
    pub fn is_priced(&self) -> bool {
        self.home_odd.is_finite()
            && self.home_odd > 1.0
            && self.away_odd.is_finite()
            && self.away_odd > 1.0
    }

    /// The draw odd, filtered down to usable prices only.
    pub fn priced_draw(&self) -> Option<f64> {
        self.draw_odd.filter(|d| d.is_finite() && *d > 1.0)
    }

    /// Age of this quote relative to the given wall-clock time.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.scraped_at).num_seconds()
    }

    /// Helper to build a test quote with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        BookmakerQuote {
            match_id: "match-001".to_string(),
            bookmaker_id: "booka".to_string(),
            bookmaker_name: "BookA".to_string(),
            match_date: Utc::now() + chrono::Duration::hours(3),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            league: "Premier League".to_string(),
            sport: SportType::ThreeWay,
            home_odd: 2.10,
            draw_odd: Some(3.40),
            away_odd: 4.50,
            scraped_at: Utc::now(),
            extra_data: ExtraData::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An extreme price (best or worst) plus the bookmaker credited with it.
///
/// When several bookmakers share the extreme, the credited bookmaker is
/// the first surviving quote in input order — the *value* is the
/// invariant, the identity is display-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestPrice {
    pub odd: f64,
    pub bookmaker_id: String,
    pub bookmaker_name: String,
}

impl fmt::Display for BestPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} @ {}", self.odd, self.bookmaker_name)
    }
}

/// The grouped view of all quotes for one match during one aggregation
/// cycle. Derived entirely from its quotes and recomputed every cycle —
/// never persisted independently. `quotes` is always non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: String,
    pub match_date: DateTime<Utc>,
    pub sport: SportType,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub quotes: Vec<BookmakerQuote>,
    pub best_home: BestPrice,
    /// Absent for two-outcome sports or when no quote prices the draw.
    pub best_draw: Option<BestPrice>,
    pub best_away: BestPrice,
    pub worst_home: BestPrice,
    pub worst_draw: Option<BestPrice>,
    pub worst_away: BestPrice,
}

impl fmt::Display for MatchSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vs {} ({}) | {} books | best 1:{}",
            self.home_team,
            self.away_team,
            self.league,
            self.quotes.len(),
            self.best_home,
        )?;
        if let Some(d) = &self.best_draw {
            write!(f, " X:{d}")?;
        }
        write!(f, " 2:{}", self.best_away)
    }
}

impl MatchSnapshot {
    /// Best price for a given outcome, if present.
    pub fn best_for(&self, outcome: Outcome) -> Option<&BestPrice> {
        match outcome {
            Outcome::Home => Some(&self.best_home),
            Outcome::Draw => self.best_draw.as_ref(),
            Outcome::Away => Some(&self.best_away),
        }
    }

    /// Worst price for a given outcome, if present.
    pub fn worst_for(&self, outcome: Outcome) -> Option<&BestPrice> {
        match outcome {
            Outcome::Home => Some(&self.worst_home),
            Outcome::Draw => self.worst_draw.as_ref(),
            Outcome::Away => Some(&self.worst_away),
        }
    }

    /// The quote contributed by a specific bookmaker, if any.
    pub fn quote_for(&self, bookmaker_id: &str) -> Option<&BookmakerQuote> {
        self.quotes.iter().find(|q| q.bookmaker_id == bookmaker_id)
    }

    /// Number of distinct bookmakers quoting this match.
    pub fn bookmaker_count(&self) -> usize {
        self.quotes.len()
    }
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

/// A risk-free arbitrage across bookmakers for one match.
///
/// Ephemeral: exists only while the arbitrage index of the match's
/// current snapshot is below 1; recomputed every cycle, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    /// The best price backing each leg of the arbitrage.
    pub legs: Vec<(Outcome, BestPrice)>,
    /// Sum of inverse best odds. Strictly below 1.0 by construction.
    pub arbitrage_index: f64,
    /// Guaranteed profit as a percentage of total stake.
    pub roi_percent: f64,
}

impl fmt::Display for ArbitrageOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vs {} | index={:.4} ROI={:.2}%",
            self.home_team, self.away_team, self.arbitrage_index, self.roi_percent,
        )?;
        for (outcome, price) in &self.legs {
            write!(f, " | {outcome} {price}")?;
        }
        Ok(())
    }
}

impl ArbitrageOpportunity {
    /// Identity used for cross-cycle change tracking.
    pub fn key(&self) -> String {
        self.match_id.clone()
    }
}

/// Real-money stakes hedging a freebet, per outcome.
/// The freebet leg itself costs no cash, so its entry is zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakePlan {
    pub home: f64,
    pub draw: Option<f64>,
    pub away: f64,
}

impl StakePlan {
    /// Total real money laid across the hedge legs.
    pub fn total(&self) -> f64 {
        self.home + self.draw.unwrap_or(0.0) + self.away
    }
}

/// Output of the freebet extraction math.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreebetResult {
    /// Profit-only payout of the free bet (stake is not returned).
    pub freebet_return: f64,
    pub stakes: StakePlan,
    pub total_hedge_stake: f64,
    pub guaranteed_profit: f64,
    /// Share of the freebet's face value converted to guaranteed cash.
    /// Negative when hedging costs exceed the freebet's payout.
    pub extraction_percent: f64,
}

impl fmt::Display for FreebetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "return={:.2} hedge={:.2} profit={:.2} extraction={:.1}%",
            self.freebet_return,
            self.total_hedge_stake,
            self.guaranteed_profit,
            self.extraction_percent,
        )
    }
}

/// A freebet-extraction opportunity for one match, parameterized by the
/// caller-supplied freebet. The engine computes this on request (or under
/// a configured standing watch) — it does not scan the data for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreebetOpportunity {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub freebet_bookmaker: String,
    pub freebet_outcome: Outcome,
    pub freebet_value: f64,
    pub result: FreebetResult,
}

impl fmt::Display for FreebetOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vs {} | {:.2} freebet on {} @ {} | {}",
            self.home_team,
            self.away_team,
            self.freebet_value,
            self.freebet_outcome,
            self.freebet_bookmaker,
            self.result,
        )
    }
}

impl FreebetOpportunity {
    /// Identity used for cross-cycle change tracking.
    pub fn key(&self) -> String {
        self.match_id.clone()
    }
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Summary of a single fetch → aggregate → detect → notify cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub timestamp: DateTime<Utc>,
    pub quotes_fetched: usize,
    pub matches_aggregated: usize,
    pub arbs_found: usize,
    pub arbs_new: usize,
    pub arbs_gone: usize,
    pub freebets_found: usize,
    pub freebets_new: usize,
    pub notifications_sent: usize,
    /// True when the feed fetch failed and the cycle was skipped
    /// (tracker state untouched).
    pub fetch_failed: bool,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fetch_failed {
            return write!(f, "Cycle #{}: fetch failed, skipped", self.cycle_number);
        }
        write!(
            f,
            "Cycle #{}: quotes={} matches={} arbs={} (+{}/-{}) freebets={} (+{}) notified={}",
            self.cycle_number,
            self.quotes_fetched,
            self.matches_aggregated,
            self.arbs_found,
            self.arbs_new,
            self.arbs_gone,
            self.freebets_found,
            self.freebets_new,
            self.notifications_sent,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for ODDSIGHT.
///
/// None of these are fatal: the engine degrades to "no new opportunities
/// reported this cycle" rather than crashing, because a missed cycle is
/// recoverable on the next trigger.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The feed is temporarily unavailable. The cycle is skipped and the
    /// fetch retried on the next scheduled trigger.
    #[error("Transient fetch error ({feed}): {message}")]
    TransientFetch { feed: String, message: String },

    /// A quote row is missing a required field. The row is dropped, the
    /// rest of the cycle proceeds.
    #[error("Malformed quote row: {0}")]
    MalformedRow(String),

    /// Programmer error (e.g. freebet calculation on an impossible
    /// outcome). Surfaced immediately to the caller, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
