//! Update coordinator — the fetch → aggregate → detect → notify loop.
//!
//! Cycles are triggered two ways: a push on the update channel (the
//! dashboard's `/api/refresh` ingress) or the fallback polling interval.
//! Pushes are debounced so a burst of scraper writes collapses into one
//! cycle, and cycles never overlap: each one is awaited before the next
//! trigger is examined.
//!
//! A failed fetch skips the cycle without touching tracker baselines, so
//! an opportunity that survives an outage is not re-announced when the
//! feed comes back.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, FreebetWatchConfig};
use crate::dashboard::AppState;
use crate::engine::aggregator::aggregate;
use crate::engine::detector::{detect_arbitrage, detect_freebet};
use crate::engine::tracker::ChangeTracker;
use crate::feed::{FeedUpdate, QuoteFeed};
use crate::notify::{format_arbitrage, format_freebet, Notification, NotificationSink};
use crate::types::{ArbitrageOpportunity, CycleReport, FreebetOpportunity, MatchSnapshot};

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct UpdateCoordinator {
    feed: Arc<dyn QuoteFeed>,
    sinks: Vec<Box<dyn NotificationSink>>,
    poll_interval_secs: u64,
    debounce_ms: u64,
    freebet_watch: Option<FreebetWatchConfig>,
    /// Independent baselines per opportunity kind.
    arb_tracker: ChangeTracker,
    freebet_tracker: ChangeTracker,
    dashboard: Option<AppState>,
    cycle_number: u64,
}

impl UpdateCoordinator {
    pub fn new(
        feed: Arc<dyn QuoteFeed>,
        sinks: Vec<Box<dyn NotificationSink>>,
        engine: &EngineConfig,
        dashboard: Option<AppState>,
    ) -> Self {
        Self {
            feed,
            sinks,
            poll_interval_secs: engine.poll_interval_secs.max(1),
            debounce_ms: engine.debounce_ms,
            freebet_watch: engine.freebet_watch.clone(),
            arb_tracker: ChangeTracker::new(),
            freebet_tracker: ChangeTracker::new(),
            dashboard,
            cycle_number: 0,
        }
    }

    /// Main loop. Runs until the push channel closes.
    ///
    /// The first interval tick fires immediately, so the engine scans on
    /// startup without waiting a full poll period.
    pub async fn run(mut self, mut push_rx: mpsc::Receiver<FeedUpdate>) {
        let mut ticker = interval(Duration::from_secs(self.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                maybe_update = push_rx.recv() => {
                    match maybe_update {
                        Some(update) => {
                            debug!(source = %update.source, "Push update received");
                            // Quiet window, then drain whatever else arrived
                            tokio::time::sleep(Duration::from_millis(self.debounce_ms)).await;
                            let mut coalesced = 0;
                            while push_rx.try_recv().is_ok() {
                                coalesced += 1;
                            }
                            if coalesced > 0 {
                                debug!(coalesced, "Push burst collapsed into one cycle");
                            }
                            self.run_cycle().await;
                            // A push cycle counts as fresh data; restart the clock
                            ticker.reset();
                        }
                        None => {
                            info!("Push channel closed, coordinator stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// One full cycle. Returns the report (also logged and published).
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle_number += 1;
        let now = Utc::now();

        let rows = match self.feed.fetch_quotes().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(
                    feed = self.feed.name(),
                    cycle = self.cycle_number,
                    error = %e,
                    "Feed fetch failed, skipping cycle"
                );
                let report = CycleReport {
                    cycle_number: self.cycle_number,
                    timestamp: now,
                    quotes_fetched: 0,
                    matches_aggregated: 0,
                    arbs_found: 0,
                    arbs_new: 0,
                    arbs_gone: 0,
                    freebets_found: 0,
                    freebets_new: 0,
                    notifications_sent: 0,
                    fetch_failed: true,
                };
                self.publish_report(&report).await;
                return report;
            }
        };

        let quotes_fetched = rows.len();
        let snapshots = aggregate(rows, now);

        let arbs: Vec<ArbitrageOpportunity> =
            snapshots.iter().filter_map(detect_arbitrage).collect();
        let arb_keys: HashSet<String> = arbs.iter().map(|a| format!("arb:{}", a.key())).collect();
        let arb_diff = self.arb_tracker.observe(arb_keys);

        let freebets = self.scan_freebets(&snapshots);
        let freebet_keys: HashSet<String> = freebets
            .iter()
            .map(|f| format!("freebet:{}", f.key()))
            .collect();
        let freebet_diff = self.freebet_tracker.observe(freebet_keys);

        let snapshot_for = |match_id: &str| snapshots.iter().find(|s| s.match_id == match_id);

        let mut notifications_sent = 0;
        for arb in &arbs {
            if arb_diff.added.contains(&format!("arb:{}", arb.key())) {
                let Some(snapshot) = snapshot_for(&arb.match_id) else {
                    continue;
                };
                if self.dispatch(&format_arbitrage(arb, snapshot)).await {
                    notifications_sent += 1;
                }
            }
        }
        for freebet in &freebets {
            if freebet_diff
                .added
                .contains(&format!("freebet:{}", freebet.key()))
            {
                let Some(snapshot) = snapshot_for(&freebet.match_id) else {
                    continue;
                };
                if self.dispatch(&format_freebet(freebet, snapshot)).await {
                    notifications_sent += 1;
                }
            }
        }

        let report = CycleReport {
            cycle_number: self.cycle_number,
            timestamp: now,
            quotes_fetched,
            matches_aggregated: snapshots.len(),
            arbs_found: arbs.len(),
            arbs_new: arb_diff.added.len(),
            arbs_gone: arb_diff.removed.len(),
            freebets_found: freebets.len(),
            freebets_new: freebet_diff.added.len(),
            notifications_sent,
            fetch_failed: false,
        };

        self.publish_state(snapshots, arbs, freebets).await;
        self.publish_report(&report).await;
        info!("{report}");

        report
    }

    /// Recompute the standing freebet watch against every match.
    ///
    /// Matches the watched bookmaker does not quote are skipped quietly;
    /// the watch only applies where that bookmaker is present.
    fn scan_freebets(&self, snapshots: &[MatchSnapshot]) -> Vec<FreebetOpportunity> {
        let Some(watch) = &self.freebet_watch else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for snapshot in snapshots {
            if snapshot.quote_for(&watch.bookmaker_id).is_none() {
                continue;
            }
            match detect_freebet(snapshot, &watch.bookmaker_id, watch.outcome, watch.value) {
                Ok(opp) => {
                    if opp.result.extraction_percent >= watch.min_extraction_percent {
                        found.push(opp);
                    }
                }
                Err(e) => {
                    debug!(match_id = %snapshot.match_id, error = %e, "Freebet watch skipped match");
                }
            }
        }
        found
    }

    /// Fan an alert out to every sink. True when at least one delivered.
    async fn dispatch(&self, notification: &Notification) -> bool {
        let mut delivered = false;
        for sink in &self.sinks {
            match sink.notify(notification).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    warn!(sink = sink.name(), error = %e, "Notification delivery failed");
                }
            }
        }
        delivered
    }

    async fn publish_state(
        &self,
        snapshots: Vec<MatchSnapshot>,
        arbs: Vec<ArbitrageOpportunity>,
        freebets: Vec<FreebetOpportunity>,
    ) {
        if let Some(dash) = &self.dashboard {
            *dash.snapshots.write().await = snapshots;
            *dash.arbitrages.write().await = arbs;
            *dash.freebets.write().await = freebets;
        }
    }

    async fn publish_report(&self, report: &CycleReport) {
        if let Some(dash) = &self.dashboard {
            dash.cycle_log.write().await.push(report.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
