//! Integration-style client tests for the tournament live client.
//!
//! Uses the scripted `MockConnector` from `tests/common` to drive
//! `LiveClient` through connection lifecycles and server frame sequences,
//! verifying reconnect timing, keepalive cadence, state transitions, the
//! score timeseries, and event delivery.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

mod common;

use std::time::Duration;

use tokio::sync::mpsc;
use tournament_live::protocol::{Team, Tournament, TournamentStatus};
use tournament_live::{ConnectionState, LiveClient, LiveConfig, LiveError, LiveEvent, Snapshot};

use common::{
    initial_state_json, match_completed_json, match_progress_json, match_started_json, tag_json,
    tournament_finished_json, Attempt, MockConnector, Recorder,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn config() -> LiveConfig {
    LiveConfig::new("http://localhost:8000/api")
}

fn start(attempts: Vec<Attempt>) -> (LiveClient, mpsc::Receiver<LiveEvent>, Recorder) {
    let (connector, recorder) = MockConnector::new(attempts);
    let (client, events) = LiveClient::start(connector, config());
    (client, events, recorder)
}

fn start_single(frames: Vec<String>) -> (LiveClient, mpsc::Receiver<LiveEvent>, Recorder) {
    let (connector, recorder) = MockConnector::single(frames);
    let (client, events) = LiveClient::start(connector, config());
    (client, events, recorder)
}

async fn next_event(rx: &mut mpsc::Receiver<LiveEvent>) -> LiveEvent {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Wait until the frames scripted so far have been applied.
async fn wait_for_state(
    client: &LiveClient,
    pred: impl FnMut(&tournament_live::TournamentState) -> bool,
) {
    let mut rx = client.subscribe_state();
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("state sender dropped");
}

fn team(id: &str, score: i64) -> Team {
    Team::new(id, format!("Team {id}"), score)
}

// ════════════════════════════════════════════════════════════════════
// Reconnect
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn server_close_schedules_exactly_one_reconnect_after_fixed_delay() {
    let (mut client, mut events, recorder) = start(vec![Attempt::Open(vec![None]), Attempt::Open(vec![])]);

    assert_eq!(next_event(&mut events).await, LiveEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        LiveEvent::Disconnected { reason: None }
    );
    assert_eq!(
        next_event(&mut events).await,
        LiveEvent::ReconnectScheduled {
            delay: Duration::from_millis(3000)
        }
    );
    assert_eq!(next_event(&mut events).await, LiveEvent::Connected);

    let attempts = recorder.attempts();
    assert_eq!(attempts.len(), 2);
    let gap = attempts[1] - attempts[0];
    assert!(
        gap >= Duration::from_millis(3000) && gap < Duration::from_millis(3100),
        "reconnect gap was {gap:?}"
    );
    assert_eq!(client.connection_state(), ConnectionState::Open);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_retry_forever_without_backoff() {
    let (mut client, mut events, recorder) = start(vec![]);

    tokio::time::sleep(Duration::from_millis(12_500)).await;

    let attempts = recorder.attempts();
    assert_eq!(attempts.len(), 5, "attempts at 0, 3, 6, 9 and 12 seconds");
    for pair in attempts.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= Duration::from_millis(3000) && gap < Duration::from_millis(3100),
            "gap {gap:?}"
        );
    }

    // Each failure reports once and schedules once.
    for _ in 0..5 {
        assert!(matches!(
            next_event(&mut events).await,
            LiveEvent::Disconnected { reason: Some(_) }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            LiveEvent::ReconnectScheduled { .. }
        ));
    }
    assert_eq!(client.connection_state(), ConnectionState::Closed);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn receive_error_closes_and_reconnects() {
    let (mut client, mut events, recorder) = start(vec![
        Attempt::Open(vec![Some(Err(LiveError::TransportReceive(
            "reset by peer".into(),
        )))]),
        Attempt::Open(vec![]),
    ]);

    assert_eq!(next_event(&mut events).await, LiveEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        LiveEvent::Disconnected {
            reason: Some("transport receive error: reset by peer".into())
        }
    );
    assert!(matches!(
        next_event(&mut events).await,
        LiveEvent::ReconnectScheduled { .. }
    ));
    assert_eq!(next_event(&mut events).await, LiveEvent::Connected);
    assert_eq!(recorder.attempts().len(), 2);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn state_survives_reconnect() {
    let (mut client, mut events, _recorder) = start(vec![
        Attempt::Open(vec![
            Some(Ok(initial_state_json("running", &[("A", 10), ("B", 4)]))),
            None,
        ]),
        Attempt::Open(vec![]),
    ]);

    assert_eq!(next_event(&mut events).await, LiveEvent::Connected);
    let _ = next_event(&mut events).await; // Disconnected
    let _ = next_event(&mut events).await; // ReconnectScheduled
    assert_eq!(next_event(&mut events).await, LiveEvent::Connected);

    let state = client.state();
    assert_eq!(state.tournament.status, TournamentStatus::Running);
    assert_eq!(state.leaderboard, vec![team("A", 10), team("B", 4)]);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reconnects_while_event_receiver_is_never_drained() {
    // Cue events from a few matches fill the channel before the server closes.
    let mut first = Vec::new();
    for n in 1..=10 {
        first.push(Some(Ok(match_started_json(n, "A", "B"))));
        first.push(Some(Ok(match_completed_json(&[("A", 1), ("B", 0)]))));
    }
    first.push(None);

    let (connector, recorder) = MockConnector::new(vec![Attempt::Open(first), Attempt::Open(vec![])]);
    let (mut client, _events) =
        LiveClient::start(connector, config().with_event_channel_capacity(4));

    tokio::time::sleep(Duration::from_secs(60)).await;

    let attempts = recorder.attempts();
    assert_eq!(attempts.len(), 2, "exactly one reconnect after the close");
    let gap = attempts[1] - attempts[0];
    assert!(gap >= Duration::from_millis(3000) && gap < Duration::from_millis(3100));
    assert_eq!(client.connection_state(), ConnectionState::Open);
    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Keepalive
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn keepalive_sent_every_interval_while_open() {
    let (mut client, mut events, recorder) = start_single(vec![]);
    assert_eq!(next_event(&mut events).await, LiveEvent::Connected);

    tokio::time::sleep(Duration::from_millis(24_900)).await;
    assert!(recorder.sent().is_empty(), "no keepalive before the first interval");

    tokio::time::sleep(Duration::from_millis(25_200)).await;
    assert_eq!(recorder.sent(), vec!["ping".to_string(), "ping".to_string()]);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn no_keepalive_while_closed() {
    let (mut client, _events, recorder) = start(vec![Attempt::Open(vec![None])]);

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(recorder.sent().is_empty());
    assert!(recorder.attempts().len() > 1);
    assert_eq!(client.connection_state(), ConnectionState::Closed);
    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Frame handling
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_dropped_without_closing() {
    let (mut client, mut events, recorder) = start_single(vec![
        "not json".into(),
        r#"{"type":"match_started"}"#.into(),
        r#"{"type":"#.into(),
        initial_state_json("running", &[("A", 5)]),
        "[1,2,3]".into(),
    ]);

    assert_eq!(next_event(&mut events).await, LiveEvent::Connected);
    wait_for_state(&client, |s| s.leaderboard.len() == 1).await;

    let state = client.state();
    assert_eq!(state.tournament.status, TournamentStatus::Running);
    assert!(state.current_match.is_none());

    // Nothing else is emitted and the connection stays up.
    let more = tokio::time::timeout(Duration::from_secs(5), events.recv()).await;
    assert!(more.is_err(), "unexpected event: {more:?}");
    assert_eq!(client.connection_state(), ConnectionState::Open);
    assert_eq!(recorder.attempts().len(), 1);
    client.shutdown().await;
}

#[tokio::test]
async fn unknown_tags_are_ignored() {
    let (mut client, _events, _recorder) = start_single(vec![
        initial_state_json("idle", &[("A", 1)]),
        r#"{"type":"fireworks","data":{"color":"gold"}}"#.into(),
        tag_json("tournament_paused"),
    ]);

    wait_for_state(&client, |s| s.tournament.status == TournamentStatus::Paused).await;
    assert_eq!(client.state().leaderboard, vec![team("A", 1)]);
    client.shutdown().await;
}

#[tokio::test]
async fn end_to_end_tournament_flow() {
    let (mut client, mut events, _recorder) = start_single(vec![
        tag_json("tournament_started"),
        match_started_json(1, "A", "B"),
        match_progress_json(1, 3, &[("A", 1), ("B", 0)]),
        match_progress_json(2, 3, &[("A", 3), ("B", 1)]),
        match_progress_json(3, 3, &[("A", 7), ("B", 3)]),
        match_completed_json(&[("A", 7), ("B", 3)]),
    ]);
    client
        .seed(Snapshot {
            tournament: Some(Tournament::new(TournamentStatus::Idle)),
            leaderboard: vec![team("A", 0), team("B", 0)],
        })
        .unwrap();

    wait_for_state(&client, |s| {
        s.leaderboard.first().is_some_and(|t| t.total_score == 7)
    })
    .await;

    let state = client.state();
    assert_eq!(state.leaderboard, vec![team("A", 7), team("B", 3)]);
    assert_eq!(state.tournament.status, TournamentStatus::Running);
    assert!(state.match_progress.is_none());
    assert_eq!(state.current_match.as_ref().map(|m| m.match_number), Some(1));

    let series = client.timeseries();
    let ticks: Vec<u64> = series.iter().map(|p| p.tick).collect();
    assert_eq!(ticks, vec![1, 2, 3]);
    let last = series.back().unwrap();
    assert_eq!(last.scores.get("A"), Some(&7));
    assert_eq!(last.scores.get("B"), Some(&3));

    assert_eq!(next_event(&mut events).await, LiveEvent::Connected);
    assert_eq!(next_event(&mut events).await, LiveEvent::Intro);
    assert_eq!(
        next_event(&mut events).await,
        LiveEvent::Notification {
            message: "Tournament started".into()
        }
    );
    match next_event(&mut events).await {
        LiveEvent::MatchStartCue {
            current_match,
            after,
        } => {
            assert_eq!(current_match.match_number, 1);
            assert_eq!(after, Duration::from_millis(500));
        }
        other => panic!("expected MatchStartCue, got {other:?}"),
    }
    match next_event(&mut events).await {
        LiveEvent::MatchEndCue { leaderboard, after } => {
            assert_eq!(leaderboard, vec![team("A", 7), team("B", 3)]);
            assert_eq!(after, Duration::from_millis(2000));
        }
        other => panic!("expected MatchEndCue, got {other:?}"),
    }
    client.shutdown().await;
}

#[tokio::test]
async fn second_match_builds_on_completed_leaderboard() {
    let (mut client, _events, _recorder) = start_single(vec![
        initial_state_json("running", &[("A", 40), ("B", 10), ("C", 0)]),
        match_started_json(1, "A", "B"),
        match_progress_json(1, 1, &[("A", 5), ("B", 2)]),
        match_completed_json(&[("A", 45), ("B", 12), ("C", 0)]),
        match_started_json(2, "B", "C"),
        match_progress_json(1, 1, &[("B", 1), ("C", 4)]),
    ]);

    wait_for_state(&client, |s| {
        s.current_match.as_ref().is_some_and(|m| m.match_number == 2) && s.match_progress.is_some()
    })
    .await;

    let series = client.timeseries();
    assert_eq!(series.len(), 2);
    let first = &series[0].scores;
    assert_eq!((first["A"], first["B"], first["C"]), (45, 12, 0));
    let second = &series[1].scores;
    assert_eq!((second["A"], second["B"], second["C"]), (45, 13, 4));
    client.shutdown().await;
}

#[tokio::test]
async fn showdown_start_keeps_history_tournament_start_clears_it() {
    let (mut client, _events, _recorder) = start_single(vec![
        initial_state_json("running", &[("A", 0)]),
        match_progress_json(1, 2, &[("A", 1)]),
        tag_json("tournament_paused"),
        tag_json("showdown_started"),
        tag_json("match_completed"),
    ]);
    // match_completed without a leaderboard only clears progress.
    wait_for_state(&client, |s| {
        s.tournament.status == TournamentStatus::Running && s.match_progress.is_none()
    })
    .await;
    assert_eq!(client.timeseries().len(), 1);
    client.shutdown().await;

    let (mut client, _events, _recorder) = start_single(vec![
        initial_state_json("idle", &[("A", 0)]),
        match_progress_json(1, 2, &[("A", 1)]),
        tag_json("tournament_started"),
    ]);
    wait_for_state(&client, |s| s.tournament.status == TournamentStatus::Running).await;
    assert!(client.timeseries().is_empty());
    client.shutdown().await;
}

#[tokio::test]
async fn finish_then_reset() {
    let (mut client, _events, _recorder) = start_single(vec![
        initial_state_json("running", &[("A", 3)]),
        match_started_json(4, "A", "B"),
        tournament_finished_json(&[("A", 9), ("B", 2)]),
    ]);
    wait_for_state(&client, |s| s.tournament.status == TournamentStatus::Finished).await;
    let state = client.state();
    assert!(state.current_match.is_none());
    assert_eq!(state.leaderboard, vec![team("A", 9), team("B", 2)]);
    client.shutdown().await;

    let (mut client, _events, _recorder) = start_single(vec![
        initial_state_json("running", &[("A", 3)]),
        match_progress_json(1, 2, &[("A", 1)]),
        tag_json("tournament_reset"),
    ]);
    wait_for_state(&client, |s| {
        s.tournament.status == TournamentStatus::Idle && s.leaderboard.is_empty()
    })
    .await;
    assert!(client.state().match_progress.is_none());
    assert!(client.timeseries().is_empty());
    client.shutdown().await;
}

#[tokio::test]
async fn timeseries_window_is_configurable() {
    let (connector, _recorder) = MockConnector::single(vec![
        initial_state_json("running", &[("A", 0)]),
        match_progress_json(1, 3, &[("A", 1)]),
        match_progress_json(2, 3, &[("A", 2)]),
        match_progress_json(3, 3, &[("A", 3)]),
    ]);
    let (mut client, _events) = LiveClient::start(connector, config().with_timeseries_window(2));

    let mut series = client.subscribe_timeseries();
    series
        .wait_for(|s| s.back().is_some_and(|p| p.tick == 3))
        .await
        .unwrap();
    let ticks: Vec<u64> = client.timeseries().iter().map(|p| p.tick).collect();
    assert_eq!(ticks, vec![2, 3]);
    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Seeding
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn snapshot_after_stream_state_replaces_leaderboard_only() {
    let (mut client, _events, _recorder) =
        start_single(vec![initial_state_json("running", &[("A", 10), ("B", 4)])]);
    wait_for_state(&client, |s| s.leaderboard.len() == 2).await;

    client
        .seed(Snapshot {
            tournament: None,
            leaderboard: vec![team("A", 12), team("B", 4)],
        })
        .unwrap();
    wait_for_state(&client, |s| {
        s.leaderboard.first().is_some_and(|t| t.total_score == 12)
    })
    .await;
    assert_eq!(client.state().tournament.status, TournamentStatus::Running);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn seed_is_applied_while_disconnected() {
    let (mut client, _events, _recorder) = start(vec![]);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    client
        .seed(Snapshot {
            tournament: Some(Tournament::new(TournamentStatus::Paused)),
            leaderboard: vec![team("A", 1)],
        })
        .unwrap();
    wait_for_state(&client, |s| s.tournament.status == TournamentStatus::Paused).await;
    assert_eq!(client.connection_state(), ConnectionState::Closed);
    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Shutdown
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn shutdown_closes_transport_and_stops_reconnecting() {
    let (mut client, mut events, recorder) = start_single(vec![]);
    assert_eq!(next_event(&mut events).await, LiveEvent::Connected);

    client.shutdown().await;
    assert_eq!(recorder.closes(), 1);
    assert!(!client.is_running());
    assert_eq!(client.connection_state(), ConnectionState::Closed);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(recorder.attempts().len(), 1);
    assert!(recorder.sent().is_empty(), "no keepalive after shutdown");
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_reconnect_wait_cancels_timer() {
    let (mut client, mut events, recorder) = start(vec![]);
    assert!(matches!(
        next_event(&mut events).await,
        LiveEvent::Disconnected { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        LiveEvent::ReconnectScheduled { .. }
    ));

    client.shutdown().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(recorder.attempts().len(), 1);
    assert!(matches!(client.seed(Snapshot::default()), Err(LiveError::NotConnected)));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_closes_transport_and_stops_reconnecting() {
    let (client, mut events, recorder) = start_single(vec![]);
    assert_eq!(next_event(&mut events).await, LiveEvent::Connected);

    drop(client);
    assert_eq!(
        next_event(&mut events).await,
        LiveEvent::Disconnected {
            reason: Some("client shut down".into())
        }
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(recorder.closes(), 1);
    assert_eq!(recorder.attempts().len(), 1);
}
