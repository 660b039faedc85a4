//! SQLite quote store.
//!
//! An external scraper writes quote rows into SQLite; the engine reads
//! the whole table (optionally filtered by league) each cycle. One row
//! per (match, bookmaker) pair, upserted so re-scrapes overwrite.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use super::QuoteFeed;
use crate::types::{BookmakerQuote, EngineError, ExtraData, SportType};

const FEED_NAME: &str = "sqlite-store";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS quotes (
    match_id        TEXT NOT NULL,
    bookmaker_id    TEXT NOT NULL,
    bookmaker_name  TEXT NOT NULL,
    match_date      TEXT NOT NULL,
    home_team       TEXT NOT NULL,
    away_team       TEXT NOT NULL,
    league          TEXT NOT NULL,
    sport           TEXT NOT NULL,
    home_odd        REAL NOT NULL,
    draw_odd        REAL,
    away_odd        REAL NOT NULL,
    scraped_at      TEXT NOT NULL,
    extra_data      TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (match_id, bookmaker_id)
);
CREATE INDEX IF NOT EXISTS idx_quotes_league ON quotes (league);
CREATE INDEX IF NOT EXISTS idx_quotes_match_date ON quotes (match_date);
"#;

/// SQLite-backed quote source.
pub struct QuoteStore {
    pool: SqlitePool,
    /// Restrict reads to one league when set.
    league: Option<String>,
}

impl QuoteStore {
    /// Connect and ensure the schema exists.
    pub async fn connect(database_url: &str, league: Option<String>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(|e| {
                EngineError::Storage(format!("Failed to open quote store at {database_url}: {e}"))
            })?;

        sqlx::query(SCHEMA).execute(&pool).await.map_err(|e| {
            EngineError::Storage(format!("Failed to initialise quote store schema: {e}"))
        })?;

        info!(url = database_url, league = ?league, "Quote store ready");
        Ok(Self { pool, league })
    }

    /// Insert or overwrite the row for (match, bookmaker).
    pub async fn upsert_quote(&self, quote: &BookmakerQuote) -> Result<()> {
        let extra = serde_json::to_string(&quote.extra_data)
            .context("Failed to serialise quote extra data")?;

        sqlx::query(
            r#"
            INSERT INTO quotes (
                match_id, bookmaker_id, bookmaker_name, match_date,
                home_team, away_team, league, sport,
                home_odd, draw_odd, away_odd, scraped_at, extra_data
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (match_id, bookmaker_id) DO UPDATE SET
                bookmaker_name = excluded.bookmaker_name,
                match_date = excluded.match_date,
                home_team = excluded.home_team,
                away_team = excluded.away_team,
                league = excluded.league,
                sport = excluded.sport,
                home_odd = excluded.home_odd,
                draw_odd = excluded.draw_odd,
                away_odd = excluded.away_odd,
                scraped_at = excluded.scraped_at,
                extra_data = excluded.extra_data
            "#,
        )
        .bind(&quote.match_id)
        .bind(&quote.bookmaker_id)
        .bind(&quote.bookmaker_name)
        .bind(quote.match_date)
        .bind(&quote.home_team)
        .bind(&quote.away_team)
        .bind(&quote.league)
        .bind(quote.sport.to_string())
        .bind(quote.home_odd)
        .bind(quote.draw_odd)
        .bind(quote.away_odd)
        .bind(quote.scraped_at)
        .bind(extra)
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::Storage(format!("Failed to upsert quote: {e}")))?;

        Ok(())
    }

    /// Read quotes, optionally restricted by league and kickoff window.
    ///
    /// Rows that fail to decode (bad sport tag, corrupt extra data) are
    /// skipped with a warning rather than failing the batch.
    pub async fn fetch_filtered(
        &self,
        league: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<BookmakerQuote>> {
        let mut sql = String::from("SELECT * FROM quotes WHERE 1=1");
        if league.is_some() {
            sql.push_str(" AND league = ?");
        }
        if from.is_some() {
            sql.push_str(" AND match_date >= ?");
        }
        if to.is_some() {
            sql.push_str(" AND match_date <= ?");
        }
        sql.push_str(" ORDER BY match_date, match_id, bookmaker_id");

        let mut query = sqlx::query(&sql);
        if let Some(l) = league {
            query = query.bind(l.to_string());
        }
        if let Some(f) = from {
            query = query.bind(f);
        }
        if let Some(t) = to {
            query = query.bind(t);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::Storage(format!("Failed to read quotes from store: {e}")))?;

        let mut quotes = Vec::with_capacity(rows.len());
        for row in rows {
            match Self::decode_row(&row) {
                Ok(q) => quotes.push(q),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable quote row");
                }
            }
        }

        debug!(rows = quotes.len(), league = ?league, "Quote store read");
        Ok(quotes)
    }

    fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<BookmakerQuote, EngineError> {
        let decode = || -> Result<BookmakerQuote> {
            let sport_raw: String = row.try_get("sport")?;
            let sport: SportType = sport_raw.parse()?;

            let extra_raw: String = row.try_get("extra_data")?;
            let extra_data: ExtraData =
                serde_json::from_str(&extra_raw).context("Corrupt extra_data JSON")?;

            Ok(BookmakerQuote {
                match_id: row.try_get("match_id")?,
                bookmaker_id: row.try_get("bookmaker_id")?,
                bookmaker_name: row.try_get("bookmaker_name")?,
                match_date: row.try_get("match_date")?,
                home_team: row.try_get("home_team")?,
                away_team: row.try_get("away_team")?,
                league: row.try_get("league")?,
                sport,
                home_odd: row.try_get("home_odd")?,
                draw_odd: row.try_get("draw_odd")?,
                away_odd: row.try_get("away_odd")?,
                scraped_at: row.try_get("scraped_at")?,
                extra_data,
            })
        };

        decode().map_err(|e| EngineError::MalformedRow(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// QuoteFeed trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl QuoteFeed for QuoteStore {
    async fn fetch_quotes(&self) -> Result<Vec<BookmakerQuote>> {
        self.fetch_filtered(self.league.as_deref(), None, None)
            .await
    }

    fn name(&self) -> &str {
        FEED_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
