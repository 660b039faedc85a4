//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.
//! `POST /api/refresh` doubles as the push-update ingress: an upstream
//! scraper hits it after writing fresh quotes, and the coordinator runs
//! a cycle in response.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::feed::FeedUpdate;
use crate::types::{ArbitrageOpportunity, CycleReport, FreebetOpportunity, MatchSnapshot};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers. The coordinator
/// publishes here after each successful cycle.
pub struct DashboardState {
    pub engine_name: String,
    pub start_time: DateTime<Utc>,
    pub snapshots: RwLock<Vec<MatchSnapshot>>,
    pub arbitrages: RwLock<Vec<ArbitrageOpportunity>>,
    pub freebets: RwLock<Vec<FreebetOpportunity>>,
    pub cycle_log: RwLock<Vec<CycleReport>>,
    /// Channel into the coordinator; `/api/refresh` pushes here.
    pub push_tx: mpsc::Sender<FeedUpdate>,
}

impl DashboardState {
    pub fn new(engine_name: String, push_tx: mpsc::Sender<FeedUpdate>) -> Self {
        Self {
            engine_name,
            start_time: Utc::now(),
            snapshots: RwLock::new(Vec::new()),
            arbitrages: RwLock::new(Vec::new()),
            freebets: RwLock::new(Vec::new()),
            cycle_log: RwLock::new(Vec::new()),
            push_tx,
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub engine: String,
    pub uptime_secs: i64,
    pub cycles_run: u64,
    pub matches_tracked: usize,
    pub open_arbitrages: usize,
    pub open_freebets: usize,
    pub last_cycle: Option<CycleReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpportunitiesResponse {
    pub arbitrages: Vec<ArbitrageOpportunity>,
    pub freebets: Vec<FreebetOpportunity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub accepted: bool,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let cycle_log = state.cycle_log.read().await;
    let last_cycle = cycle_log.last().cloned();
    let cycles_run = last_cycle.as_ref().map(|c| c.cycle_number).unwrap_or(0);

    Json(StatusResponse {
        engine: state.engine_name.clone(),
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
        cycles_run,
        matches_tracked: state.snapshots.read().await.len(),
        open_arbitrages: state.arbitrages.read().await.len(),
        open_freebets: state.freebets.read().await.len(),
        last_cycle,
    })
}

/// GET /api/snapshots
pub async fn get_snapshots(State(state): State<AppState>) -> Json<Vec<MatchSnapshot>> {
    Json(state.snapshots.read().await.clone())
}

/// GET /api/opportunities
pub async fn get_opportunities(State(state): State<AppState>) -> Json<OpportunitiesResponse> {
    Json(OpportunitiesResponse {
        arbitrages: state.arbitrages.read().await.clone(),
        freebets: state.freebets.read().await.clone(),
    })
}

/// GET /api/cycles
pub async fn get_cycles(State(state): State<AppState>) -> Json<Vec<CycleReport>> {
    let log = state.cycle_log.read().await;
    // Return last 100 cycles
    let start = log.len().saturating_sub(100);
    Json(log[start..].to_vec())
}

/// POST /api/refresh
///
/// Push ingress. A full channel means a cycle is already pending, so
/// the push still counts as accepted — the pending cycle will pick up
/// the same data.
pub async fn post_refresh(State(state): State<AppState>) -> (StatusCode, Json<RefreshResponse>) {
    match state.push_tx.try_send(FeedUpdate {
        source: "api".to_string(),
    }) {
        Ok(()) => (StatusCode::ACCEPTED, Json(RefreshResponse { accepted: true })),
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("Refresh push coalesced into pending cycle");
            (StatusCode::ACCEPTED, Json(RefreshResponse { accepted: true }))
        }
        Err(mpsc::error::TrySendError::Closed(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(RefreshResponse { accepted: false }),
        ),
    }
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
