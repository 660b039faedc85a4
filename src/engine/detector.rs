//! Opportunity detection.
//!
//! Pure functions computing the arbitrage index / ROI and the freebet
//! extraction stakes from a match snapshot. No IO, no side effects —
//! the update coordinator feeds these once per cycle, and the freebet
//! entry point is also callable directly on request.

use tracing::debug;

use crate::types::{
    ArbitrageOpportunity, EngineError, FreebetOpportunity, FreebetResult, MatchSnapshot, Outcome,
    StakePlan,
};

// ---------------------------------------------------------------------------
// Arbitrage
// ---------------------------------------------------------------------------

/// Detect a risk-free arbitrage across the snapshot's best prices.
///
/// The arbitrage index is the sum of inverse best odds:
/// `1/best_home + 1/best_away`, plus `1/best_draw` for ternary sports —
/// but only when a nonzero best draw exists. A ternary snapshot without
/// draw data falls back to the binary formula; that fallback is a
/// deliberate policy, not a gap.
///
/// Returns `Some` iff the index is *strictly* below 1.0 — an index of
/// exactly 1.0 is not an opportunity.
pub fn detect_arbitrage(snapshot: &MatchSnapshot) -> Option<ArbitrageOpportunity> {
    let mut legs = vec![(Outcome::Home, snapshot.best_home.clone())];

    let mut index = 1.0 / snapshot.best_home.odd + 1.0 / snapshot.best_away.odd;

    if snapshot.sport.has_draw() {
        if let Some(draw) = &snapshot.best_draw {
            if draw.odd != 0.0 {
                index += 1.0 / draw.odd;
                legs.push((Outcome::Draw, draw.clone()));
            }
        }
    }

    legs.push((Outcome::Away, snapshot.best_away.clone()));

    if index >= 1.0 {
        return None;
    }

    let roi_percent = (1.0 - index) * 100.0;

    debug!(
        match_id = %snapshot.match_id,
        index,
        roi = roi_percent,
        legs = legs.len(),
        "Arbitrage detected"
    );

    Some(ArbitrageOpportunity {
        match_id: snapshot.match_id.clone(),
        home_team: snapshot.home_team.clone(),
        away_team: snapshot.away_team.clone(),
        league: snapshot.league.clone(),
        legs,
        arbitrage_index: index,
        roi_percent,
    })
}

// ---------------------------------------------------------------------------
// Freebet extraction
// ---------------------------------------------------------------------------

/// Compute the hedge stakes that lock in the value of a freebet.
///
/// The freebet pays profit only (`value * (odd - 1)`); the stake itself is
/// never returned. Each other outcome is hedged with
/// `stake = freebet_return / odd`, so every result pays out exactly the
/// freebet's return, and `guaranteed_profit` is what remains after the
/// hedges are funded. `extraction_percent` is that profit as a share of
/// the freebet's face value — negative when the hedges cost more than the
/// freebet pays. A zero-value freebet yields all zeros, never NaN.
///
/// `draw_odd` is `None` for two-outcome sports; requesting the `Draw`
/// outcome without a draw odd is a configuration error, as are negative
/// freebet values and non-positive odds — programmer errors surfaced
/// immediately, never retried.
pub fn calculate_freebet_extraction(
    home_odd: f64,
    draw_odd: Option<f64>,
    away_odd: f64,
    freebet_value: f64,
    outcome: Outcome,
) -> Result<FreebetResult, EngineError> {
    if freebet_value < 0.0 {
        return Err(EngineError::Config(format!(
            "negative freebet value: {freebet_value}"
        )));
    }

    let freebet_odd = match outcome {
        Outcome::Home => home_odd,
        Outcome::Away => away_odd,
        Outcome::Draw => draw_odd.ok_or_else(|| {
            EngineError::Config("freebet on DRAW but no draw odd is available".to_string())
        })?,
    };

    for odd in [Some(home_odd), draw_odd, Some(away_odd)].into_iter().flatten() {
        if !odd.is_finite() || odd <= 0.0 {
            return Err(EngineError::Config(format!("non-positive odd: {odd}")));
        }
    }

    let freebet_return = freebet_value * (freebet_odd - 1.0);

    let stake_against = |other: Outcome| -> Option<f64> {
        if other == outcome {
            return None;
        }
        let odd = match other {
            Outcome::Home => Some(home_odd),
            Outcome::Draw => draw_odd,
            Outcome::Away => Some(away_odd),
        }?;
        Some(freebet_return / odd)
    };

    let stakes = StakePlan {
        home: stake_against(Outcome::Home).unwrap_or(0.0),
        draw: match (outcome, draw_odd) {
            (_, None) => None,
            (Outcome::Draw, Some(_)) => Some(0.0),
            _ => stake_against(Outcome::Draw),
        },
        away: stake_against(Outcome::Away).unwrap_or(0.0),
    };

    let total_hedge_stake = stakes.total();
    let guaranteed_profit = freebet_return - total_hedge_stake;

    let extraction_percent = if freebet_value == 0.0 {
        0.0
    } else {
        guaranteed_profit / freebet_value * 100.0
    };

    Ok(FreebetResult {
        freebet_return,
        stakes,
        total_hedge_stake,
        guaranteed_profit,
        extraction_percent,
    })
}

/// Freebet calculation entry point over a match snapshot.
///
/// The freebet leg is priced at the named bookmaker's own quote for the
/// chosen outcome; the hedges are laid at the snapshot's best prices for
/// the remaining outcomes (you are free to shop the hedge legs around).
pub fn detect_freebet(
    snapshot: &MatchSnapshot,
    bookmaker_id: &str,
    outcome: Outcome,
    freebet_value: f64,
) -> Result<FreebetOpportunity, EngineError> {
    let quote = snapshot.quote_for(bookmaker_id).ok_or_else(|| {
        EngineError::Config(format!(
            "bookmaker {bookmaker_id} has no quote for match {}",
            snapshot.match_id
        ))
    })?;

    let freebet_odd = quote.odd_for(outcome).ok_or_else(|| {
        EngineError::Config(format!(
            "bookmaker {bookmaker_id} does not price {outcome} for match {}",
            snapshot.match_id
        ))
    })?;

    // Hedge legs at the snapshot's best prices; the freebet leg at the
    // chosen bookmaker's own odd.
    let hedge = |o: Outcome| -> Option<f64> {
        if o == outcome {
            Some(freebet_odd)
        } else {
            snapshot.best_for(o).map(|p| p.odd)
        }
    };

    let result = calculate_freebet_extraction(
        hedge(Outcome::Home).unwrap_or(freebet_odd),
        hedge(Outcome::Draw),
        hedge(Outcome::Away).unwrap_or(freebet_odd),
        freebet_value,
        outcome,
    )?;

    Ok(FreebetOpportunity {
        match_id: snapshot.match_id.clone(),
        home_team: snapshot.home_team.clone(),
        away_team: snapshot.away_team.clone(),
        freebet_bookmaker: quote.bookmaker_name.clone(),
        freebet_outcome: outcome,
        freebet_value,
        result,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::aggregator::aggregate;
    use crate::types::{BookmakerQuote, SportType};
    use chrono::{Duration, Utc};

    fn quote(
        bookmaker: &str,
        home: f64,
        draw: Option<f64>,
        away: f64,
        sport: SportType,
    ) -> BookmakerQuote {
        BookmakerQuote {
            match_id: "m1".to_string(),
            bookmaker_id: bookmaker.to_lowercase(),
            bookmaker_name: bookmaker.to_string(),
            match_date: Utc::now() + Duration::hours(2),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            league: "Premier League".to_string(),
            sport,
            home_odd: home,
            draw_odd: draw,
            away_odd: away,
            scraped_at: Utc::now(),
            extra_data: Default::default(),
        }
    }

    fn snapshot(quotes: Vec<BookmakerQuote>) -> MatchSnapshot {
        let mut snaps = aggregate(quotes, Utc::now());
        assert_eq!(snaps.len(), 1);
        snaps.remove(0)
    }

    // -- Arbitrage tests --

    #[test]
    fn test_arbitrage_ternary_three_books() {
        // 1/2.10 + 1/3.40 + 1/4.50 ≈ 0.99253 → ROI ≈ 0.747%
        let s = snapshot(vec![
            quote("BookA", 2.10, Some(1.01), 1.01, SportType::ThreeWay),
            quote("BookB", 1.01, Some(3.40), 1.01, SportType::ThreeWay),
            quote("BookC", 1.01, Some(1.01), 4.50, SportType::ThreeWay),
        ]);
        let opp = detect_arbitrage(&s).expect("should be an arbitrage");
        assert!((opp.arbitrage_index - 0.99253).abs() < 1e-4);
        assert!((opp.roi_percent - 0.747).abs() < 0.001);
        assert_eq!(opp.legs.len(), 3);
        assert_eq!(opp.legs[0].1.bookmaker_name, "BookA");
        assert_eq!(opp.legs[1].1.bookmaker_name, "BookB");
        assert_eq!(opp.legs[2].1.bookmaker_name, "BookC");
    }

    #[test]
    fn test_arbitrage_binary() {
        // 1/2.20 + 1/2.20 ≈ 0.909 → arbitrage
        let s = snapshot(vec![
            quote("BookA", 2.20, None, 1.50, SportType::TwoWay),
            quote("BookB", 1.50, None, 2.20, SportType::TwoWay),
        ]);
        let opp = detect_arbitrage(&s).unwrap();
        assert_eq!(opp.legs.len(), 2);
        assert!((opp.arbitrage_index - (1.0 / 2.20 + 1.0 / 2.20)).abs() < 1e-12);
    }

    #[test]
    fn test_no_arbitrage_above_one() {
        let s = snapshot(vec![quote("BookA", 1.90, Some(3.40), 4.00, SportType::ThreeWay)]);
        assert!(detect_arbitrage(&s).is_none());
    }

    #[test]
    fn test_index_exactly_one_is_not_an_opportunity() {
        // 1/2 + 1/2 == 1.0 exactly — strict inequality, not an arbitrage
        let s = snapshot(vec![
            quote("BookA", 2.0, None, 1.5, SportType::TwoWay),
            quote("BookB", 1.5, None, 2.0, SportType::TwoWay),
        ]);
        assert!(detect_arbitrage(&s).is_none());
    }

    #[test]
    fn test_ternary_without_draw_falls_back_to_binary() {
        // No bookmaker prices the draw; 1/2.5 + 1/2.5 = 0.8 must still fire
        let s = snapshot(vec![
            quote("BookA", 2.5, None, 2.0, SportType::ThreeWay),
            quote("BookB", 2.0, None, 2.5, SportType::ThreeWay),
        ]);
        let opp = detect_arbitrage(&s).unwrap();
        assert!((opp.arbitrage_index - 0.8).abs() < 1e-12);
        assert_eq!(opp.legs.len(), 2);
        assert!(opp.legs.iter().all(|(o, _)| *o != Outcome::Draw));
    }

    #[test]
    fn test_roi_formula() {
        let s = snapshot(vec![
            quote("BookA", 4.0, None, 1.2, SportType::TwoWay),
            quote("BookB", 1.2, None, 4.0, SportType::TwoWay),
        ]);
        let opp = detect_arbitrage(&s).unwrap();
        assert!((opp.roi_percent - (1.0 - opp.arbitrage_index) * 100.0).abs() < 1e-12);
    }

    // -- Freebet tests --

    #[test]
    fn test_freebet_spec_scenario() {
        // 100 freebet on AWAY @ 3.00, hedges home=2.00 draw=3.50:
        // return=200, home stake=100, draw stake≈57.14,
        // profit≈42.86, extraction≈42.86%
        let r =
            calculate_freebet_extraction(2.00, Some(3.50), 3.00, 100.0, Outcome::Away).unwrap();
        assert!((r.freebet_return - 200.0).abs() < 1e-10);
        assert!((r.stakes.home - 100.0).abs() < 1e-10);
        assert!((r.stakes.draw.unwrap() - 57.142857).abs() < 1e-4);
        assert_eq!(r.stakes.away, 0.0);
        assert!((r.guaranteed_profit - 42.857142).abs() < 1e-4);
        assert!((r.extraction_percent - 42.857142).abs() < 1e-4);
    }

    #[test]
    fn test_freebet_zero_value() {
        let r = calculate_freebet_extraction(2.0, Some(3.5), 3.0, 0.0, Outcome::Home).unwrap();
        assert_eq!(r.extraction_percent, 0.0);
        assert_eq!(r.freebet_return, 0.0);
        assert_eq!(r.stakes.home, 0.0);
        assert_eq!(r.stakes.draw, Some(0.0));
        assert_eq!(r.stakes.away, 0.0);
        assert!(!r.extraction_percent.is_nan());
    }

    #[test]
    fn test_freebet_binary_match() {
        // 50 freebet on HOME @ 2.40, hedge away @ 2.10:
        // return=70, away stake=33.33, profit=36.67
        let r = calculate_freebet_extraction(2.40, None, 2.10, 50.0, Outcome::Home).unwrap();
        assert!((r.freebet_return - 70.0).abs() < 1e-10);
        assert_eq!(r.stakes.home, 0.0);
        assert!(r.stakes.draw.is_none());
        assert!((r.stakes.away - 70.0 / 2.10).abs() < 1e-10);
        assert!((r.guaranteed_profit - (70.0 - 70.0 / 2.10)).abs() < 1e-10);
    }

    #[test]
    fn test_freebet_on_draw() {
        // 100 freebet on DRAW @ 3.50: return=250, hedge home and away
        let r = calculate_freebet_extraction(2.0, Some(3.5), 3.0, 100.0, Outcome::Draw).unwrap();
        assert!((r.freebet_return - 250.0).abs() < 1e-10);
        assert_eq!(r.stakes.draw, Some(0.0));
        assert!((r.stakes.home - 125.0).abs() < 1e-10);
        assert!((r.stakes.away - 250.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_freebet_negative_extraction() {
        // Short odds on the freebet, long hedges: extraction goes negative
        let r = calculate_freebet_extraction(1.10, Some(8.0), 15.0, 100.0, Outcome::Home).unwrap();
        assert!(r.extraction_percent < 0.0);
        assert!(r.guaranteed_profit < 0.0);
    }

    #[test]
    fn test_freebet_draw_without_draw_odd_is_config_error() {
        let err =
            calculate_freebet_extraction(2.0, None, 3.0, 100.0, Outcome::Draw).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_freebet_negative_value_is_config_error() {
        let err =
            calculate_freebet_extraction(2.0, Some(3.5), 3.0, -5.0, Outcome::Home).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_freebet_non_positive_odd_is_config_error() {
        let err =
            calculate_freebet_extraction(2.0, Some(0.0), 3.0, 100.0, Outcome::Home).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    // -- Snapshot entry point --

    #[test]
    fn test_detect_freebet_uses_named_bookmaker_and_best_hedges() {
        let s = snapshot(vec![
            quote("BookA", 2.00, Some(3.50), 3.00, SportType::ThreeWay),
            quote("BookB", 1.80, Some(3.20), 2.80, SportType::ThreeWay),
        ]);
        // Freebet at BookA's away odd (3.00); hedges at best home (2.00,
        // BookA) and best draw (3.50, BookA).
        let opp = detect_freebet(&s, "booka", Outcome::Away, 100.0).unwrap();
        assert_eq!(opp.freebet_bookmaker, "BookA");
        assert_eq!(opp.freebet_outcome, Outcome::Away);
        assert!((opp.result.freebet_return - 200.0).abs() < 1e-10);
        assert!((opp.result.extraction_percent - 42.857142).abs() < 1e-4);
    }

    #[test]
    fn test_detect_freebet_unknown_bookmaker() {
        let s = snapshot(vec![quote("BookA", 2.0, Some(3.5), 3.0, SportType::ThreeWay)]);
        let err = detect_freebet(&s, "nope", Outcome::Home, 100.0).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_detect_freebet_draw_on_two_way_match() {
        let s = snapshot(vec![quote("BookA", 1.6, None, 2.4, SportType::TwoWay)]);
        let err = detect_freebet(&s, "booka", Outcome::Draw, 100.0).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
