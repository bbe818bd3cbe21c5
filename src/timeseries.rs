//! Per-team score history reconstructed from match-relative deltas.
//!
//! Progress updates only report how many points each participant earned in
//! the running match. The accumulator keeps a baseline per team (its total
//! before the match) and records `baseline + delta` for every participant on
//! each tick. Teams that are known but not playing repeat their baseline.
//! The history is a sliding window: once it holds `window` points, the oldest
//! point is evicted for every new one.

use std::collections::{BTreeMap, VecDeque};

use tokio::sync::watch;

use crate::config::DEFAULT_TIMESERIES_WINDOW;
use crate::protocol::{MatchProgress, Team, TeamId};

/// Absolute score of every known team at one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScorePoint {
    pub tick: u64,
    pub scores: BTreeMap<TeamId, i64>,
}

/// Ordered, bounded score history, oldest first.
pub type ScoreTimeseries = VecDeque<ScorePoint>;

/// Builds the score timeseries from leaderboard totals and progress deltas.
#[derive(Debug)]
pub struct ScoreTimeseriesAccumulator {
    baseline: BTreeMap<TeamId, i64>,
    tick: u64,
    window: usize,
    tx: watch::Sender<ScoreTimeseries>,
}

impl Default for ScoreTimeseriesAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESERIES_WINDOW)
    }
}

impl ScoreTimeseriesAccumulator {
    /// Create an empty accumulator keeping at most `window` points (min 1).
    pub fn new(window: usize) -> Self {
        let (tx, _rx) = watch::channel(VecDeque::new());
        Self {
            baseline: BTreeMap::new(),
            tick: 0,
            window: window.max(1),
            tx,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn baseline(&self) -> &BTreeMap<TeamId, i64> {
        &self.baseline
    }

    /// Clone of the current history.
    pub fn points(&self) -> ScoreTimeseries {
        self.tx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Receiver that observes every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<ScoreTimeseries> {
        self.tx.subscribe()
    }

    /// Empty history, tick back to 0, baseline cleared.
    pub(crate) fn reset(&mut self) {
        self.baseline.clear();
        self.tick = 0;
        self.tx.send_replace(VecDeque::new());
    }

    /// Replace the baseline with the leaderboard totals.
    pub(crate) fn reseed_baseline(&mut self, leaderboard: &[Team]) {
        self.baseline.clear();
        self.merge_baseline(leaderboard);
    }

    /// Overwrite the baseline of every team on the leaderboard, keeping
    /// entries for teams it does not list.
    pub(crate) fn merge_baseline(&mut self, leaderboard: &[Team]) {
        self.baseline.extend(
            leaderboard
                .iter()
                .map(|team| (team.id.clone(), team.total_score)),
        );
    }

    /// Advance one tick and append the point for `progress`.
    ///
    /// Participants without a baseline get one of 0 before their delta is
    /// added.
    pub(crate) fn record(&mut self, progress: &MatchProgress) -> ScorePoint {
        self.tick += 1;

        let mut scores = self.baseline.clone();
        for (team_id, team) in &progress.per_team {
            let base = *self.baseline.entry(team_id.clone()).or_insert(0);
            scores.insert(team_id.clone(), base.saturating_add(team.score));
        }

        let point = ScorePoint {
            tick: self.tick,
            scores,
        };
        let window = self.window;
        self.tx.send_modify(|series| {
            series.push_back(point.clone());
            while series.len() > window {
                series.pop_front();
            }
        });
        point
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::TeamProgress;

    fn progress(entries: &[(&str, i64)]) -> MatchProgress {
        MatchProgress {
            round: 1,
            total_rounds: 10,
            per_team: entries
                .iter()
                .map(|(id, score)| {
                    (
                        (*id).to_string(),
                        TeamProgress {
                            score: *score,
                            last_move: None,
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn adds_delta_to_leaderboard_baseline() {
        let mut acc = ScoreTimeseriesAccumulator::default();
        acc.reseed_baseline(&[Team::new("A", "Alpha", 40), Team::new("B", "Beta", 10)]);
        let point = acc.record(&progress(&[("A", 5), ("B", 2)]));
        assert_eq!(point.tick, 1);
        assert_eq!(point.scores["A"], 45);
        assert_eq!(point.scores["B"], 12);
    }

    #[test]
    fn idle_teams_repeat_their_baseline() {
        let mut acc = ScoreTimeseriesAccumulator::default();
        acc.reseed_baseline(&[
            Team::new("A", "Alpha", 40),
            Team::new("B", "Beta", 10),
            Team::new("C", "Gamma", 7),
        ]);
        acc.record(&progress(&[("A", 1), ("B", 1)]));
        let point = acc.record(&progress(&[("A", 2), ("B", 4)]));
        assert_eq!(point.scores["C"], 7);
        assert_eq!(point.scores.len(), 3);
    }

    #[test]
    fn unseen_team_starts_from_zero() {
        let mut acc = ScoreTimeseriesAccumulator::default();
        acc.reseed_baseline(&[Team::new("A", "Alpha", 40)]);
        let point = acc.record(&progress(&[("A", 1), ("Z", 6)]));
        assert_eq!(point.scores["Z"], 6);
        assert_eq!(acc.baseline()["Z"], 0);
    }

    #[test]
    fn window_evicts_oldest_first() {
        let mut acc = ScoreTimeseriesAccumulator::default();
        for i in 0..101 {
            acc.record(&progress(&[("A", i)]));
        }
        let points = acc.points();
        assert_eq!(points.len(), 100);
        assert_eq!(points.front().unwrap().tick, 2);
        assert_eq!(points.back().unwrap().tick, 101);
        assert_eq!(acc.tick(), 101);
    }

    #[test]
    fn merge_keeps_unlisted_teams() {
        let mut acc = ScoreTimeseriesAccumulator::default();
        acc.reseed_baseline(&[Team::new("A", "Alpha", 1), Team::new("B", "Beta", 2)]);
        acc.merge_baseline(&[Team::new("A", "Alpha", 9)]);
        assert_eq!(acc.baseline()["A"], 9);
        assert_eq!(acc.baseline()["B"], 2);

        acc.reseed_baseline(&[Team::new("C", "Gamma", 3)]);
        assert_eq!(acc.baseline().len(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut acc = ScoreTimeseriesAccumulator::new(5);
        acc.reseed_baseline(&[Team::new("A", "Alpha", 1)]);
        acc.record(&progress(&[("A", 1)]));
        acc.reset();
        assert!(acc.is_empty());
        assert_eq!(acc.tick(), 0);
        assert!(acc.baseline().is_empty());
        assert_eq!(acc.window(), 5);
    }
}
