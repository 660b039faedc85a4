//! Per-match snapshot aggregation.
//!
//! Groups raw per-bookmaker quote rows into one `MatchSnapshot` per match,
//! drops matches whose kickoff passed the staleness cutoff, dedupes
//! superseded quotes, and computes best/worst prices per outcome.
//!
//! Pure over its inputs plus the supplied wall-clock time — the caller
//! (the update coordinator) owns all scheduling and IO.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::types::{BestPrice, BookmakerQuote, MatchSnapshot, Outcome};

/// How long after kickoff a match remains eligible for aggregation, in
/// seconds. Hard cutoff: `match_date < now - 5 minutes` drops the match
/// entirely.
pub const KICKOFF_GRACE_SECS: i64 = 5 * 60;

/// Group raw quote rows into per-match snapshots.
///
/// - Matches with `match_date` more than five minutes in the past are
///   dropped entirely, fresh quotes or not.
/// - Rows lacking a required outcome odd are skipped with a warning;
///   nothing in this function ever errors.
/// - A fresher row for the same (match, bookmaker) supersedes an older one.
/// - Matches with zero surviving quotes are excluded, not returned empty.
///
/// Output is sorted by kickoff then match id so cycles are deterministic.
pub fn aggregate(rows: Vec<BookmakerQuote>, now: DateTime<Utc>) -> Vec<MatchSnapshot> {
    let cutoff = now - Duration::seconds(KICKOFF_GRACE_SECS);

    // BTreeMap keeps match iteration stable across cycles.
    let mut by_match: BTreeMap<String, Vec<BookmakerQuote>> = BTreeMap::new();

    for row in rows {
        if row.match_date < cutoff {
            debug!(
                match_id = %row.match_id,
                kickoff = %row.match_date,
                "Match past staleness cutoff, dropping"
            );
            continue;
        }

        if !row.is_priced() {
            warn!(
                match_id = %row.match_id,
                bookmaker = %row.bookmaker_id,
                home_odd = row.home_odd,
                away_odd = row.away_odd,
                "Quote lacks a required outcome odd, skipping row"
            );
            continue;
        }

        by_match.entry(row.match_id.clone()).or_default().push(row);
    }

    let mut snapshots: Vec<MatchSnapshot> = by_match
        .into_values()
        .filter_map(|quotes| build_snapshot(dedupe(quotes)))
        .collect();

    snapshots.sort_by(|a, b| {
        a.match_date
            .cmp(&b.match_date)
            .then_with(|| a.match_id.cmp(&b.match_id))
    });

    snapshots
}

/// Keep only the freshest quote per bookmaker, preserving the input order
/// of the surviving rows (tie-break credit goes to the first survivor).
fn dedupe(quotes: Vec<BookmakerQuote>) -> Vec<BookmakerQuote> {
    let mut kept: Vec<BookmakerQuote> = Vec::with_capacity(quotes.len());

    for quote in quotes {
        match kept.iter_mut().find(|k| k.bookmaker_id == quote.bookmaker_id) {
            Some(existing) if quote.scraped_at > existing.scraped_at => *existing = quote,
            Some(_) => {} // older duplicate, superseded row wins
            None => kept.push(quote),
        }
    }

    kept
}

/// Compute best/worst prices and assemble the snapshot.
/// Returns None when no quotes survived.
fn build_snapshot(quotes: Vec<BookmakerQuote>) -> Option<MatchSnapshot> {
    let first = quotes.first()?.clone();

    let (best_home, worst_home) = extremes(&quotes, Outcome::Home)?;
    let (best_away, worst_away) = extremes(&quotes, Outcome::Away)?;

    // Draw stats only for ternary sports with at least one priced draw.
    let (best_draw, worst_draw) = if first.sport.has_draw() {
        match extremes(&quotes, Outcome::Draw) {
            Some((best, worst)) => (Some(best), Some(worst)),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    Some(MatchSnapshot {
        match_id: first.match_id,
        match_date: first.match_date,
        sport: first.sport,
        home_team: first.home_team,
        away_team: first.away_team,
        league: first.league,
        quotes,
        best_home,
        best_draw,
        best_away,
        worst_home,
        worst_draw,
        worst_away,
    })
}

/// (best, worst) price for an outcome across all quotes pricing it.
///
/// Strict comparisons: when several bookmakers share the extreme value
/// the first quote in order keeps the credit. Only the value is an
/// invariant; the credited identity is for display.
fn extremes(quotes: &[BookmakerQuote], outcome: Outcome) -> Option<(BestPrice, BestPrice)> {
    let mut best: Option<BestPrice> = None;
    let mut worst: Option<BestPrice> = None;

    for quote in quotes {
        let odd = match outcome {
            Outcome::Draw => quote.priced_draw(),
            other => quote.odd_for(other),
        };
        let Some(odd) = odd else { continue };

        let candidate = BestPrice {
            odd,
            bookmaker_id: quote.bookmaker_id.clone(),
            bookmaker_name: quote.bookmaker_name.clone(),
        };

        match &best {
            Some(b) if odd <= b.odd => {}
            _ => best = Some(candidate.clone()),
        }
        match &worst {
            Some(w) if odd >= w.odd => {}
            _ => worst = Some(candidate),
        }
    }

    Some((best?, worst?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SportType;

    fn quote(
        match_id: &str,
        bookmaker: &str,
        home: f64,
        draw: Option<f64>,
        away: f64,
    ) -> BookmakerQuote {
        BookmakerQuote {
            match_id: match_id.to_string(),
            bookmaker_id: bookmaker.to_lowercase(),
            bookmaker_name: bookmaker.to_string(),
            match_date: Utc::now() + Duration::hours(2),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            league: "Premier League".to_string(),
            sport: SportType::ThreeWay,
            home_odd: home,
            draw_odd: draw,
            away_odd: away,
            scraped_at: Utc::now(),
            extra_data: Default::default(),
        }
    }

    #[test]
    fn test_aggregate_groups_by_match() {
        let rows = vec![
            quote("m1", "BookA", 2.10, Some(3.40), 4.50),
            quote("m1", "BookB", 2.00, Some(3.50), 4.20),
            quote("m2", "BookA", 1.80, Some(3.20), 5.00),
        ];
        let snapshots = aggregate(rows, Utc::now());
        assert_eq!(snapshots.len(), 2);
        let m1 = snapshots.iter().find(|s| s.match_id == "m1").unwrap();
        assert_eq!(m1.bookmaker_count(), 2);
    }

    #[test]
    fn test_aggregate_empty_input() {
        let snapshots = aggregate(Vec::new(), Utc::now());
        assert!(snapshots.is_empty());
    }

    #[test]
    fn test_best_and_worst_per_outcome() {
        let rows = vec![
            quote("m1", "BookA", 2.10, Some(3.40), 4.50),
            quote("m1", "BookB", 2.00, Some(3.60), 4.20),
            quote("m1", "BookC", 2.05, Some(3.10), 4.80),
        ];
        let snapshots = aggregate(rows, Utc::now());
        let s = &snapshots[0];

        assert_eq!(s.best_home.odd, 2.10);
        assert_eq!(s.best_home.bookmaker_name, "BookA");
        assert_eq!(s.worst_home.odd, 2.00);
        assert_eq!(s.worst_home.bookmaker_name, "BookB");

        assert_eq!(s.best_draw.as_ref().unwrap().odd, 3.60);
        assert_eq!(s.worst_draw.as_ref().unwrap().odd, 3.10);

        assert_eq!(s.best_away.odd, 4.80);
        assert_eq!(s.worst_away.odd, 4.20);
    }

    #[test]
    fn test_best_worst_bounds_invariant() {
        let rows = vec![
            quote("m1", "BookA", 2.10, Some(3.40), 4.50),
            quote("m1", "BookB", 2.00, Some(3.60), 4.20),
            quote("m1", "BookC", 2.05, None, 4.80),
        ];
        let snapshots = aggregate(rows, Utc::now());
        let s = &snapshots[0];

        for outcome in [Outcome::Home, Outcome::Draw, Outcome::Away] {
            let best = s.best_for(outcome).unwrap().odd;
            let worst = s.worst_for(outcome).unwrap().odd;
            for q in &s.quotes {
                let odd = match outcome {
                    Outcome::Draw => q.priced_draw(),
                    other => q.odd_for(other),
                };
                if let Some(odd) = odd {
                    assert!(worst <= odd && odd <= best, "bounds violated for {outcome}");
                }
            }
        }
    }

    #[test]
    fn test_tie_break_first_quote_credited() {
        // Both books quote the same best home odd; first in wins the credit
        let rows = vec![
            quote("m1", "BookA", 2.10, Some(3.40), 4.50),
            quote("m1", "BookB", 2.10, Some(3.40), 4.50),
        ];
        let snapshots = aggregate(rows, Utc::now());
        assert_eq!(snapshots[0].best_home.bookmaker_name, "BookA");
        assert_eq!(snapshots[0].best_home.odd, 2.10);
    }

    #[test]
    fn test_stale_match_dropped() {
        let mut stale = quote("m1", "BookA", 2.10, Some(3.40), 4.50);
        stale.match_date = Utc::now() - Duration::minutes(10);
        // Quote itself is fresh — the match kickoff is what matters
        stale.scraped_at = Utc::now();

        let fresh = quote("m2", "BookA", 1.90, Some(3.30), 4.10);

        let snapshots = aggregate(vec![stale, fresh], Utc::now());
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].match_id, "m2");
    }

    #[test]
    fn test_staleness_boundary_inside_grace() {
        // Kickoff 4 minutes ago is still within the 5-minute grace
        let mut q = quote("m1", "BookA", 2.10, Some(3.40), 4.50);
        q.match_date = Utc::now() - Duration::minutes(4);
        let snapshots = aggregate(vec![q], Utc::now());
        assert_eq!(snapshots.len(), 1);
    }

    #[test]
    fn test_unpriced_rows_skipped_not_fatal() {
        let mut bad = quote("m1", "BookA", 0.0, Some(3.40), 4.50);
        bad.home_odd = 0.0;
        let good = quote("m1", "BookB", 2.00, Some(3.50), 4.20);

        let snapshots = aggregate(vec![bad, good], Utc::now());
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].bookmaker_count(), 1);
        assert_eq!(snapshots[0].quotes[0].bookmaker_name, "BookB");
    }

    #[test]
    fn test_match_with_only_unpriced_rows_excluded() {
        let mut bad = quote("m1", "BookA", 2.10, Some(3.40), 4.50);
        bad.away_odd = f64::NAN;
        let snapshots = aggregate(vec![bad], Utc::now());
        assert!(snapshots.is_empty());
    }

    #[test]
    fn test_fresher_quote_supersedes() {
        let now = Utc::now();
        let mut old = quote("m1", "BookA", 2.10, Some(3.40), 4.50);
        old.scraped_at = now - Duration::minutes(3);
        let mut new = quote("m1", "BookA", 2.30, Some(3.40), 4.50);
        new.scraped_at = now;

        let snapshots = aggregate(vec![old, new], now);
        assert_eq!(snapshots[0].bookmaker_count(), 1);
        assert_eq!(snapshots[0].best_home.odd, 2.30);
    }

    #[test]
    fn test_older_duplicate_ignored() {
        let now = Utc::now();
        let mut new = quote("m1", "BookA", 2.30, Some(3.40), 4.50);
        new.scraped_at = now;
        let mut old = quote("m1", "BookA", 2.10, Some(3.40), 4.50);
        old.scraped_at = now - Duration::minutes(3);

        // Fresher row arrives first; older duplicate must not clobber it
        let snapshots = aggregate(vec![new, old], now);
        assert_eq!(snapshots[0].best_home.odd, 2.30);
    }

    #[test]
    fn test_two_way_sport_has_no_draw_stats() {
        let mut q = quote("m1", "BookA", 1.60, None, 2.40);
        q.sport = SportType::TwoWay;
        let snapshots = aggregate(vec![q], Utc::now());
        assert!(snapshots[0].best_draw.is_none());
        assert!(snapshots[0].worst_draw.is_none());
    }

    #[test]
    fn test_ternary_with_no_priced_draws() {
        // ThreeWay sport but no bookmaker prices the draw — draw stats absent
        let rows = vec![
            quote("m1", "BookA", 2.10, None, 4.50),
            quote("m1", "BookB", 2.00, Some(0.0), 4.20),
        ];
        let snapshots = aggregate(rows, Utc::now());
        assert!(snapshots[0].best_draw.is_none());
    }

    #[test]
    fn test_output_sorted_by_kickoff() {
        let mut late = quote("m-late", "BookA", 2.0, Some(3.0), 4.0);
        late.match_date = Utc::now() + Duration::hours(6);
        let mut early = quote("m-early", "BookA", 2.0, Some(3.0), 4.0);
        early.match_date = Utc::now() + Duration::hours(1);

        let snapshots = aggregate(vec![late, early], Utc::now());
        assert_eq!(snapshots[0].match_id, "m-early");
        assert_eq!(snapshots[1].match_id, "m-late");
    }
}
