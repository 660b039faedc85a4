//! ODDSIGHT — odds aggregation and opportunity detection engine.
//!
//! Ingests bookmaker quotes from scraper feeds, aggregates them into
//! per-match snapshots with best/worst prices, and detects risk-free
//! opportunities: surebets (arbitrage across bookmakers) and freebet
//! extractions. Alerts fire only for opportunities that are new since
//! the previous cycle.

pub mod config;
pub mod dashboard;
pub mod engine;
pub mod feed;
pub mod notify;
pub mod types;
