//! Opportunity change tracking.
//!
//! Diffs the set of opportunity keys between consecutive cycles so the
//! coordinator only alerts on genuinely new findings. The first
//! observation seeds the baseline silently: on a cold start everything
//! currently open would otherwise spam as "new".

use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Keys that appeared and disappeared between two consecutive cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl KeyDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone)]
enum TrackerState {
    /// No cycle observed yet. The first set seeds the baseline and the
    /// diff stays empty.
    Uninitialized,
    Tracking(HashSet<String>),
}

/// Tracks one kind of opportunity (arbitrage, freebet watch) across
/// cycles. Each kind gets its own tracker so their baselines never mix.
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    state: TrackerState,
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl ChangeTracker {
    pub fn new() -> Self {
        Self {
            state: TrackerState::Uninitialized,
        }
    }

    /// Compare `current` against the last observed set without advancing
    /// the baseline. Uninitialized trackers report an empty diff.
    pub fn diff(&self, current: &HashSet<String>) -> KeyDiff {
        let previous = match &self.state {
            TrackerState::Uninitialized => return KeyDiff::default(),
            TrackerState::Tracking(prev) => prev,
        };

        let mut added: Vec<String> = current.difference(previous).cloned().collect();
        let mut removed: Vec<String> = previous.difference(current).cloned().collect();
        added.sort();
        removed.sort();

        KeyDiff { added, removed }
    }

    /// Replace the baseline with `current`. Kept separate from `diff` so
    /// a failed cycle can leave the baseline untouched.
    pub fn advance(&mut self, current: HashSet<String>) {
        self.state = TrackerState::Tracking(current);
    }

    /// Diff and advance in one step, for successful cycles.
    pub fn observe(&mut self, current: HashSet<String>) -> KeyDiff {
        let diff = self.diff(&current);
        self.advance(current);
        diff
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, TrackerState::Tracking(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cold_start_is_silent() {
        let mut tracker = ChangeTracker::new();
        assert!(!tracker.is_initialized());

        let diff = tracker.observe(keys(&["arb:m1", "arb:m2"]));
        assert!(diff.is_empty());
        assert!(tracker.is_initialized());
    }

    #[test]
    fn test_added_and_removed() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(keys(&["arb:m1", "arb:m2"]));

        let diff = tracker.observe(keys(&["arb:m2", "arb:m3"]));
        assert_eq!(diff.added, vec!["arb:m3".to_string()]);
        assert_eq!(diff.removed, vec!["arb:m1".to_string()]);
    }

    #[test]
    fn test_identical_cycle_reports_nothing() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(keys(&["arb:m1"]));

        let diff = tracker.observe(keys(&["arb:m1"]));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_empty_current_removes_everything() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(keys(&["arb:m1", "arb:m2"]));

        let diff = tracker.observe(HashSet::new());
        assert!(diff.added.is_empty());
        assert_eq!(
            diff.removed,
            vec!["arb:m1".to_string(), "arb:m2".to_string()]
        );
    }

    #[test]
    fn test_diff_does_not_advance() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(keys(&["arb:m1"]));

        let current = keys(&["arb:m1", "arb:m2"]);
        let first = tracker.diff(&current);
        let second = tracker.diff(&current);
        assert_eq!(first, second);
        assert_eq!(first.added, vec!["arb:m2".to_string()]);

        tracker.advance(current.clone());
        assert!(tracker.diff(&current).is_empty());
    }

    #[test]
    fn test_diff_on_uninitialized_is_empty() {
        let tracker = ChangeTracker::new();
        assert!(tracker.diff(&keys(&["arb:m1"])).is_empty());
    }
}
