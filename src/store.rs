//! Canonical in-memory tournament state.
//!
//! [`TournamentStateStore`] holds tournament status, leaderboard, current match
//! and match progress. Mutation is crate-private: only the dispatcher (and the
//! snapshot seeding path that runs through it) writes. Readers either take a
//! [`snapshot`](TournamentStateStore::snapshot) or
//! [`subscribe`](TournamentStateStore::subscribe) to a `watch` channel that is
//! updated after every change.

use tokio::sync::watch;

use crate::protocol::{Match, MatchProgress, Team, Tournament, TournamentStatus};

/// Everything the dashboard renders besides the score timeseries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TournamentState {
    pub tournament: Tournament,
    /// Server-ordered; never re-sorted locally.
    pub leaderboard: Vec<Team>,
    pub current_match: Option<Match>,
    pub match_progress: Option<MatchProgress>,
}

/// Observable holder of [`TournamentState`].
#[derive(Debug)]
pub struct TournamentStateStore {
    tx: watch::Sender<TournamentState>,
}

impl Default for TournamentStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TournamentStateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TournamentState::default());
        Self { tx }
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> TournamentState {
        self.tx.borrow().clone()
    }

    pub fn status(&self) -> TournamentStatus {
        self.tx.borrow().tournament.status
    }

    /// Receiver that observes every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<TournamentState> {
        self.tx.subscribe()
    }

    pub(crate) fn set_tournament(&self, tournament: Tournament) {
        self.tx.send_modify(|s| s.tournament = tournament);
    }

    pub(crate) fn set_status(&self, status: TournamentStatus) {
        self.tx.send_modify(|s| s.tournament.status = status);
    }

    pub(crate) fn set_leaderboard(&self, leaderboard: Vec<Team>) {
        self.tx.send_modify(|s| s.leaderboard = leaderboard);
    }

    /// Replace the current match and drop the previous match's progress.
    pub(crate) fn begin_match(&self, current: Match) {
        self.tx.send_modify(|s| {
            s.current_match = Some(current);
            s.match_progress = None;
        });
    }

    pub(crate) fn set_progress(&self, progress: MatchProgress) {
        self.tx.send_modify(|s| s.match_progress = Some(progress));
    }

    /// Leaderboard update at the end of a match.
    pub(crate) fn complete_match(&self, leaderboard: Option<Vec<Team>>) {
        self.tx.send_modify(|s| {
            if let Some(leaderboard) = leaderboard {
                s.leaderboard = leaderboard;
            }
            s.match_progress = None;
        });
    }

    /// Final leaderboard; the tournament is over and no match is running.
    pub(crate) fn finish(&self, leaderboard: Option<Vec<Team>>) {
        self.tx.send_modify(|s| {
            s.tournament.status = TournamentStatus::Finished;
            if let Some(leaderboard) = leaderboard {
                s.leaderboard = leaderboard;
            }
            s.current_match = None;
        });
    }

    pub(crate) fn reset(&self) {
        self.tx.send_replace(TournamentState::default());
    }
}
