//! # Live Dashboard Example
//!
//! Connects to a running tournament service, seeds state from the snapshot
//! endpoints, and logs every state change and presentation cue until Ctrl+C.
//!
//! ## Running
//!
//! ```sh
//! TOURNAMENT_URL=http://localhost:8000/api cargo run --example live_dashboard
//! ```
//!
//! Set `ADMIN_KEY` to also send a pause and a resume request on startup.

use tournament_live::{AdminClient, LiveClient, LiveConfig, LiveEvent, SnapshotLoader};

const DEFAULT_URL: &str = "http://localhost:8000/api";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let url = std::env::var("TOURNAMENT_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let config = LiveConfig::new(url);
    tracing::info!("Streaming from {}", config.ws_url()?);

    let (mut client, mut events) = LiveClient::connect(config.clone())?;

    // A failed snapshot is not fatal; the stream's initial_state seeds too.
    if let Err(e) = client.load_snapshot(&SnapshotLoader::new(&config)?).await {
        tracing::warn!("Snapshot unavailable: {e}");
    }

    if let Ok(key) = std::env::var("ADMIN_KEY") {
        let admin = AdminClient::new(&config, key)?;
        for result in [admin.pause().await, admin.resume().await] {
            if let Err(e) = result {
                tracing::warn!("{}", e.user_message());
            }
        }
    }

    let mut state = client.subscribe_state();
    let mut series = client.subscribe_timeseries();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            Some(event) = events.recv() => match event {
                LiveEvent::MatchStartCue { current_match, .. } => {
                    let ids: Vec<_> = current_match
                        .participants
                        .iter()
                        .map(|t| t.name.clone().unwrap_or_else(|| t.id.clone()))
                        .collect();
                    tracing::info!("Match {}: {}", current_match.match_number, ids.join(" vs "));
                }
                LiveEvent::MatchEndCue { leaderboard, .. } => {
                    if let Some(leader) = leaderboard.first() {
                        tracing::info!("Leader: {} ({})", leader.name, leader.total_score);
                    }
                }
                other => tracing::info!("{other:?}"),
            },

            Ok(()) = state.changed() => {
                let s = state.borrow_and_update();
                if let Some(progress) = &s.match_progress {
                    tracing::debug!("Round {}/{}", progress.round, progress.total_rounds);
                } else {
                    tracing::info!("Status {:?}, {} teams", s.tournament.status, s.leaderboard.len());
                }
            }

            Ok(()) = series.changed() => {
                if let Some(point) = series.borrow_and_update().back() {
                    tracing::debug!("tick {} {:?}", point.tick, point.scores);
                }
            }
        }
    }

    client.shutdown().await;
    Ok(())
}
