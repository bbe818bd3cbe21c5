//! Inbound frame decoding and the tournament state machine.
//!
//! [`MessageDispatcher`] owns the [`TournamentStateStore`] and the
//! [`ScoreTimeseriesAccumulator`]. Every decoded [`ServerMessage`] maps to one
//! synchronous transition over both. Frames that do not decode are logged and
//! dropped; they never reach the connection layer.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::LiveConfig;
use crate::event::{emit_event, LiveEvent};
use crate::protocol::{Match, ServerMessage, Snapshot, Team, Tournament, TournamentStatus};
use crate::store::TournamentStateStore;
use crate::timeseries::ScoreTimeseriesAccumulator;

/// Presentation side effects triggered by state transitions.
///
/// All methods default to no-ops. Delays are passed through for the renderer
/// to honour; the dispatcher never sleeps.
pub trait PresentationHooks: Send {
    /// A new tournament started.
    fn intro(&mut self) {}

    /// A match started; play its visual after `after`.
    fn match_start(&mut self, _current: &Match, _after: Duration) {}

    /// A match ended; play its visual after `after`.
    fn match_end(&mut self, _leaderboard: &[Team], _after: Duration) {}

    /// Show a success message.
    fn notify(&mut self, _message: &str) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl PresentationHooks for NoHooks {}

/// Hooks that forward every cue as a [`LiveEvent`] on a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelHooks {
    tx: mpsc::Sender<LiveEvent>,
}

impl ChannelHooks {
    pub fn new(tx: mpsc::Sender<LiveEvent>) -> Self {
        Self { tx }
    }
}

impl PresentationHooks for ChannelHooks {
    fn intro(&mut self) {
        emit_event(&self.tx, LiveEvent::Intro);
    }

    fn match_start(&mut self, current: &Match, after: Duration) {
        emit_event(
            &self.tx,
            LiveEvent::MatchStartCue {
                current_match: current.clone(),
                after,
            },
        );
    }

    fn match_end(&mut self, leaderboard: &[Team], after: Duration) {
        emit_event(
            &self.tx,
            LiveEvent::MatchEndCue {
                leaderboard: leaderboard.to_vec(),
                after,
            },
        );
    }

    fn notify(&mut self, message: &str) {
        emit_event(
            &self.tx,
            LiveEvent::Notification {
                message: message.to_string(),
            },
        );
    }
}

/// Maps inbound messages onto the store and the score timeseries.
pub struct MessageDispatcher {
    store: TournamentStateStore,
    series: ScoreTimeseriesAccumulator,
    hooks: Box<dyn PresentationHooks>,
    match_start_cue_delay: Duration,
    match_end_cue_delay: Duration,
}

impl MessageDispatcher {
    pub fn new(config: &LiveConfig, hooks: Box<dyn PresentationHooks>) -> Self {
        Self {
            store: TournamentStateStore::new(),
            series: ScoreTimeseriesAccumulator::new(config.timeseries_window),
            hooks,
            match_start_cue_delay: config.match_start_cue_delay,
            match_end_cue_delay: config.match_end_cue_delay,
        }
    }

    pub fn store(&self) -> &TournamentStateStore {
        &self.store
    }

    pub fn timeseries(&self) -> &ScoreTimeseriesAccumulator {
        &self.series
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn PresentationHooks>) {
        self.hooks = hooks;
    }

    /// Decode one raw frame and apply it.
    ///
    /// Returns the tag that was applied, or `None` if the frame was
    /// discarded because it did not decode.
    pub fn handle_frame(&mut self, raw: &str) -> Option<&'static str> {
        match serde_json::from_str::<ServerMessage>(raw) {
            Ok(msg) => {
                let tag = msg.tag();
                self.apply(msg);
                Some(tag)
            }
            Err(e) => {
                warn!("failed to decode server frame: {e}; raw: {raw}");
                None
            }
        }
    }

    /// Apply one decoded message.
    pub fn apply(&mut self, msg: ServerMessage) {
        debug!(tag = msg.tag(), "dispatching");
        match msg {
            ServerMessage::InitialState {
                tournament,
                leaderboard,
            } => {
                self.initialize(tournament, leaderboard.unwrap_or_default());
            }
            ServerMessage::TournamentStarted => {
                self.series.reset();
                self.hooks.intro();
                self.mark_running("Tournament started");
            }
            ServerMessage::ShowdownStarted => {
                self.mark_running("Showdown started");
            }
            ServerMessage::MatchStarted { data } => {
                self.hooks.match_start(&data, self.match_start_cue_delay);
                self.store.begin_match(data);
            }
            ServerMessage::MatchProgress { data } => {
                let point = self.series.record(&data);
                debug!(tick = point.tick, teams = point.scores.len(), "score point");
                self.store.set_progress(data);
            }
            ServerMessage::MatchCompleted { leaderboard } => {
                if let Some(leaderboard) = &leaderboard {
                    self.series.merge_baseline(leaderboard);
                }
                self.hooks.match_end(
                    leaderboard.as_deref().unwrap_or_default(),
                    self.match_end_cue_delay,
                );
                self.store.complete_match(leaderboard);
            }
            ServerMessage::TournamentFinished { leaderboard } => {
                self.store.finish(leaderboard);
                self.hooks.notify("Tournament finished");
            }
            ServerMessage::ShowdownFinished { leaderboard } => {
                self.store.finish(leaderboard);
                self.hooks.notify("Showdown finished");
            }
            ServerMessage::TournamentPaused => {
                self.store.set_status(TournamentStatus::Paused);
            }
            ServerMessage::TournamentResumed => {
                self.store.set_status(TournamentStatus::Running);
            }
            ServerMessage::TournamentReset => {
                self.store.reset();
                self.series.reset();
            }
            ServerMessage::Unknown => {}
        }
    }

    /// Seed from a pulled snapshot, exactly like `initial_state`.
    pub fn seed(&mut self, snapshot: Snapshot) {
        debug!(teams = snapshot.leaderboard.len(), "seeding from snapshot");
        self.initialize(snapshot.tournament, snapshot.leaderboard);
    }

    fn initialize(&mut self, tournament: Option<Tournament>, leaderboard: Vec<Team>) {
        if let Some(tournament) = tournament {
            self.store.set_tournament(tournament);
        }
        self.series.reseed_baseline(&leaderboard);
        self.store.set_leaderboard(leaderboard);
    }

    /// Shared by `tournament_started` and `showdown_started`.
    fn mark_running(&mut self, message: &str) {
        self.store.set_status(TournamentStatus::Running);
        self.hooks.notify(message);
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("status", &self.store.status())
            .field("tick", &self.series.tick())
            .field("points", &self.series.len())
            .finish()
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
    use crate::store::TournamentState;
    use std::sync::{Arc, Mutex};

    /// Records hook calls as short strings.
    #[derive(Clone, Default)]
    struct RecordingHooks {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl PresentationHooks for RecordingHooks {
        fn intro(&mut self) {
            self.calls.lock().unwrap().push("intro".into());
        }
        fn match_start(&mut self, current: &Match, after: Duration) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("match_start:{}:{}", current.match_number, after.as_millis()));
        }
        fn match_end(&mut self, leaderboard: &[Team], after: Duration) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("match_end:{}:{}", leaderboard.len(), after.as_millis()));
        }
        fn notify(&mut self, message: &str) {
            self.calls.lock().unwrap().push(format!("notify:{message}"));
        }
    }

    fn dispatcher() -> (MessageDispatcher, Arc<Mutex<Vec<String>>>) {
        let hooks = RecordingHooks::default();
        let calls = Arc::clone(&hooks.calls);
        let config = LiveConfig::new("http://localhost/api");
        (MessageDispatcher::new(&config, Box::new(hooks)), calls)
    }

    const LEADERBOARD_40_10: &str = r#"{"type":"initial_state","tournament":{"status":"running"},
        "leaderboard":[{"id":"A","name":"Alpha","total_score":40},{"id":"B","name":"Beta","total_score":10}]}"#;

    const PROGRESS_5_2: &str = r#"{"type":"match_progress","data":{"round":1,"total_rounds":5,
        "team_a":{"id":"A","score":5,"last_move":"cooperate"},
        "team_b":{"id":"B","score":2,"last_move":"defect"}}}"#;

    #[test]
    fn initial_state_sets_tournament_leaderboard_and_baseline() {
        let (mut d, _) = dispatcher();
        assert_eq!(d.handle_frame(LEADERBOARD_40_10), Some("initial_state"));
        let state = d.store().snapshot();
        assert_eq!(state.tournament.status, TournamentStatus::Running);
        assert_eq!(state.leaderboard.len(), 2);
        assert_eq!(d.timeseries().baseline()["A"], 40);
    }

    #[test]
    fn initial_state_without_leaderboard_empties_it() {
        let (mut d, _) = dispatcher();
        d.handle_frame(LEADERBOARD_40_10);
        d.handle_frame(r#"{"type":"initial_state","tournament":{"status":"idle"}}"#);
        assert!(d.store().snapshot().leaderboard.is_empty());
        assert!(d.timeseries().baseline().is_empty());
    }

    #[test]
    fn progress_point_is_baseline_plus_delta() {
        let (mut d, _) = dispatcher();
        d.handle_frame(LEADERBOARD_40_10);
        d.handle_frame(PROGRESS_5_2);
        let points = d.timeseries().points();
        let point = points.back().unwrap();
        assert_eq!(point.tick, 1);
        assert_eq!(point.scores["A"], 45);
        assert_eq!(point.scores["B"], 12);
        assert_eq!(d.store().snapshot().match_progress.unwrap().round, 1);
    }

    #[test]
    fn tournament_started_clears_series_and_runs() {
        let (mut d, calls) = dispatcher();
        d.handle_frame(LEADERBOARD_40_10);
        d.handle_frame(PROGRESS_5_2);
        d.handle_frame(r#"{"type":"tournament_started"}"#);
        assert!(d.timeseries().is_empty());
        assert_eq!(d.timeseries().tick(), 0);
        assert!(d.timeseries().baseline().is_empty());
        assert_eq!(d.store().status(), TournamentStatus::Running);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["intro".to_string(), "notify:Tournament started".to_string()]
        );
    }

    #[test]
    fn tournament_started_on_empty_series_is_fine() {
        let (mut d, _) = dispatcher();
        d.handle_frame(r#"{"type":"tournament_started"}"#);
        assert!(d.timeseries().is_empty());
        assert_eq!(d.store().status(), TournamentStatus::Running);
    }

    #[test]
    fn showdown_started_keeps_series() {
        let (mut d, calls) = dispatcher();
        d.handle_frame(LEADERBOARD_40_10);
        d.handle_frame(PROGRESS_5_2);
        d.handle_frame(r#"{"type":"tournament_paused"}"#);
        d.handle_frame(r#"{"type":"showdown_started"}"#);
        assert_eq!(d.timeseries().len(), 1);
        assert_eq!(d.timeseries().tick(), 1);
        assert_eq!(d.timeseries().baseline()["A"], 40);
        assert_eq!(d.store().status(), TournamentStatus::Running);
        assert_eq!(*calls.lock().unwrap(), vec!["notify:Showdown started".to_string()]);
    }

    #[test]
    fn match_started_replaces_match_and_clears_progress() {
        let (mut d, calls) = dispatcher();
        d.handle_frame(PROGRESS_5_2);
        d.handle_frame(
            r#"{"type":"match_started","data":{"match_number":7,"team_a":{"id":"A"},"team_b":{"id":"B"}}}"#,
        );
        let state = d.store().snapshot();
        assert_eq!(state.current_match.unwrap().match_number, 7);
        assert!(state.match_progress.is_none());
        assert_eq!(*calls.lock().unwrap(), vec!["match_start:7:500".to_string()]);
    }

    #[test]
    fn match_completed_updates_leaderboard_and_next_baseline() {
        let (mut d, calls) = dispatcher();
        d.handle_frame(LEADERBOARD_40_10);
        d.handle_frame(PROGRESS_5_2);
        d.handle_frame(
            r#"{"type":"match_completed","leaderboard":[{"id":"A","name":"Alpha","total_score":45},{"id":"B","name":"Beta","total_score":12}]}"#,
        );
        let state = d.store().snapshot();
        assert_eq!(state.leaderboard[0].total_score, 45);
        assert!(state.match_progress.is_none());
        assert_eq!(d.timeseries().baseline()["A"], 45);
        assert_eq!(*calls.lock().unwrap(), vec!["match_end:2:2000".to_string()]);

        d.handle_frame(
            r#"{"type":"match_progress","data":{"participants":[{"id":"A","score":1}]}}"#,
        );
        let points = d.timeseries().points();
        assert_eq!(points.back().unwrap().scores["A"], 46);
        assert_eq!(points.back().unwrap().scores["B"], 12);
    }

    #[test]
    fn finished_sets_status_leaderboard_and_clears_match() {
        for tag in ["tournament_finished", "showdown_finished"] {
            let (mut d, calls) = dispatcher();
            d.handle_frame(
                r#"{"type":"match_started","data":{"match_number":1,"participants":[{"id":"A"}]}}"#,
            );
            d.handle_frame(&format!(
                r#"{{"type":"{tag}","leaderboard":[{{"id":"A","name":"Alpha","total_score":9}}]}}"#
            ));
            let state = d.store().snapshot();
            assert_eq!(state.tournament.status, TournamentStatus::Finished);
            assert_eq!(state.leaderboard, vec![Team::new("A", "Alpha", 9)]);
            assert!(state.current_match.is_none());
            assert!(calls.lock().unwrap().last().unwrap().starts_with("notify:"));
        }
    }

    #[test]
    fn pause_and_resume() {
        let (mut d, _) = dispatcher();
        d.handle_frame(r#"{"type":"tournament_paused"}"#);
        assert_eq!(d.store().status(), TournamentStatus::Paused);
        d.handle_frame(r#"{"type":"tournament_resumed"}"#);
        assert_eq!(d.store().status(), TournamentStatus::Running);
    }

    #[test]
    fn reset_is_idempotent() {
        let (mut d, _) = dispatcher();
        d.handle_frame(r#"{"type":"tournament_reset"}"#);
        assert_eq!(d.store().snapshot(), TournamentState::default());

        d.handle_frame(LEADERBOARD_40_10);
        d.handle_frame(
            r#"{"type":"match_started","data":{"match_number":1,"participants":[{"id":"A"},{"id":"B"}]}}"#,
        );
        d.handle_frame(PROGRESS_5_2);
        d.handle_frame(r#"{"type":"tournament_reset"}"#);

        assert_eq!(d.store().snapshot(), TournamentState::default());
        assert!(d.timeseries().is_empty());
        assert_eq!(d.timeseries().tick(), 0);
        assert!(d.timeseries().baseline().is_empty());
    }

    #[test]
    fn malformed_frames_change_nothing() {
        let (mut d, calls) = dispatcher();
        d.handle_frame(LEADERBOARD_40_10);
        let before = d.store().snapshot();
        for raw in ["pong", "", "{", r#"{"data":{}}"#, r#"{"type":7}"#, r#"{"type":"match_progress"}"#] {
            assert_eq!(d.handle_frame(raw), None, "{raw:?}");
        }
        assert_eq!(d.store().snapshot(), before);
        assert!(d.timeseries().is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_tag_is_a_no_op() {
        let (mut d, _) = dispatcher();
        d.handle_frame(LEADERBOARD_40_10);
        let before = d.store().snapshot();
        assert_eq!(d.handle_frame(r#"{"type":"round_robin_seeded","data":[1,2]}"#), Some("unknown"));
        assert_eq!(d.store().snapshot(), before);
    }

    #[test]
    fn seed_matches_initial_state() {
        let (mut d, _) = dispatcher();
        d.seed(Snapshot {
            tournament: Some(Tournament::new(TournamentStatus::Paused)),
            leaderboard: vec![Team::new("A", "Alpha", 3)],
        });
        assert_eq!(d.store().status(), TournamentStatus::Paused);
        assert_eq!(d.timeseries().baseline()["A"], 3);
    }

    #[tokio::test]
    async fn channel_hooks_emit_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let config = LiveConfig::new("http://localhost/api");
        let mut d = MessageDispatcher::new(&config, Box::new(ChannelHooks::new(tx)));
        d.handle_frame(r#"{"type":"tournament_started"}"#);
        assert_eq!(rx.recv().await.unwrap(), LiveEvent::Intro);
        assert_eq!(
            rx.recv().await.unwrap(),
            LiveEvent::Notification {
                message: "Tournament started".into()
            }
        );
    }
}
