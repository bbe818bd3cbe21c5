//! Wire types for the tournament live stream and snapshot endpoints.
//!
//! Inbound stream frames are JSON objects tagged by a `type` field. Payloads
//! sit next to the tag, under `data`, `tournament` or `leaderboard` depending
//! on the message:
//!
//! ```json
//! {"type": "initial_state", "tournament": {"status": "running"}, "leaderboard": []}
//! {"type": "match_started", "data": {"match_number": 3, "team_a": {"id": "A"}, "team_b": {"id": "B"}}}
//! {"type": "match_completed", "leaderboard": [{"id": "A", "name": "Alpha", "total_score": 40}]}
//! ```
//!
//! Unknown tags decode to [`ServerMessage::Unknown`] so newer servers do not
//! break older clients.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Unique identifier for teams, assigned by the server.
pub type TeamId = String;

// ── Enums ───────────────────────────────────────────────────────────

/// Lifecycle status of the tournament.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Finished,
}

/// A team's move in the last played round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    #[serde(alias = "C", alias = "COOPERATE", alias = "Cooperate")]
    Cooperate,
    #[serde(alias = "D", alias = "DEFECT", alias = "Defect")]
    Defect,
}

// ── Structs ─────────────────────────────────────────────────────────

/// Tournament status as reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Tournament {
    pub status: TournamentStatus,
}

impl Tournament {
    pub fn new(status: TournamentStatus) -> Self {
        Self { status }
    }
}

/// One leaderboard entry.
///
/// `total_score` is the authoritative cumulative score as last reported by
/// the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    pub id: TeamId,
    #[serde(default)]
    pub name: String,
    pub total_score: i64,
}

impl Team {
    pub fn new(id: impl Into<TeamId>, name: impl Into<String>, total_score: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            total_score,
        }
    }
}

/// Reference to a team taking part in a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamRef {
    pub id: TeamId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TeamRef {
    pub fn new(id: impl Into<TeamId>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// The match currently being played.
///
/// Decodes from either a `participants` array or the fixed
/// `team_a`/`team_b`/`team_c` slots; always serializes as `participants`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawMatch")]
pub struct Match {
    pub match_number: u32,
    pub participants: Vec<TeamRef>,
}

#[derive(Deserialize)]
struct RawMatch {
    match_number: u32,
    #[serde(default)]
    participants: Vec<TeamRef>,
    #[serde(default)]
    team_a: Option<TeamRef>,
    #[serde(default)]
    team_b: Option<TeamRef>,
    #[serde(default)]
    team_c: Option<TeamRef>,
}

impl From<RawMatch> for Match {
    fn from(raw: RawMatch) -> Self {
        let participants = if raw.participants.is_empty() {
            [raw.team_a, raw.team_b, raw.team_c]
                .into_iter()
                .flatten()
                .collect()
        } else {
            raw.participants
        };
        Self {
            match_number: raw.match_number,
            participants,
        }
    }
}

/// Per-team progress inside the running match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamProgress {
    /// Score earned in this match so far, relative to the pre-match baseline.
    pub score: i64,
    /// `None` until the first round has been played.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_move: Option<Move>,
}

/// Progress of the running match, replaced wholesale on every update.
///
/// `per_team` preserves participant order. Decodes from a `per_team` map, a
/// `participants` array, or the fixed `team_a`/`team_b`/`team_c` slots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(from = "RawMatchProgress")]
pub struct MatchProgress {
    pub round: u32,
    pub total_rounds: u32,
    pub per_team: IndexMap<TeamId, TeamProgress>,
}

#[derive(Deserialize)]
struct RawParticipantProgress {
    id: TeamId,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    last_move: Option<Move>,
}

impl RawParticipantProgress {
    fn into_entry(self) -> (TeamId, TeamProgress) {
        (
            self.id,
            TeamProgress {
                score: self.score,
                last_move: self.last_move,
            },
        )
    }
}

#[derive(Deserialize)]
struct RawMatchProgress {
    #[serde(default)]
    round: u32,
    #[serde(default)]
    total_rounds: u32,
    #[serde(default)]
    per_team: IndexMap<TeamId, TeamProgress>,
    #[serde(default)]
    participants: Vec<RawParticipantProgress>,
    #[serde(default)]
    team_a: Option<RawParticipantProgress>,
    #[serde(default)]
    team_b: Option<RawParticipantProgress>,
    #[serde(default)]
    team_c: Option<RawParticipantProgress>,
}

impl From<RawMatchProgress> for MatchProgress {
    fn from(raw: RawMatchProgress) -> Self {
        let mut per_team = raw.per_team;
        let listed = if raw.participants.is_empty() {
            [raw.team_a, raw.team_b, raw.team_c]
                .into_iter()
                .flatten()
                .collect()
        } else {
            raw.participants
        };
        per_team.extend(listed.into_iter().map(RawParticipantProgress::into_entry));
        Self {
            round: raw.round,
            total_rounds: raw.total_rounds,
            per_team,
        }
    }
}

/// One-shot pull of tournament status and leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Snapshot {
    #[serde(default)]
    pub tournament: Option<Tournament>,
    #[serde(default)]
    pub leaderboard: Vec<Team>,
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types pushed from server to client over the live stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full state sent right after the stream opens.
    InitialState {
        #[serde(default)]
        tournament: Option<Tournament>,
        #[serde(default)]
        leaderboard: Option<Vec<Team>>,
    },
    /// A new tournament started; score history starts over.
    TournamentStarted,
    /// A showdown started inside the current tournament.
    ShowdownStarted,
    /// A new match started.
    MatchStarted { data: Match },
    /// Round-by-round progress of the running match.
    MatchProgress { data: MatchProgress },
    /// The running match ended; carries the updated leaderboard.
    MatchCompleted {
        #[serde(default)]
        leaderboard: Option<Vec<Team>>,
    },
    /// The tournament ended.
    TournamentFinished {
        #[serde(default)]
        leaderboard: Option<Vec<Team>>,
    },
    /// The showdown ended.
    ShowdownFinished {
        #[serde(default)]
        leaderboard: Option<Vec<Team>>,
    },
    TournamentPaused,
    TournamentResumed,
    /// Everything goes back to idle.
    TournamentReset,
    /// Any tag this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// The wire tag of this message, for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::InitialState { .. } => "initial_state",
            Self::TournamentStarted => "tournament_started",
            Self::ShowdownStarted => "showdown_started",
            Self::MatchStarted { .. } => "match_started",
            Self::MatchProgress { .. } => "match_progress",
            Self::MatchCompleted { .. } => "match_completed",
            Self::TournamentFinished { .. } => "tournament_finished",
            Self::ShowdownFinished { .. } => "showdown_finished",
            Self::TournamentPaused => "tournament_paused",
            Self::TournamentResumed => "tournament_resumed",
            Self::TournamentReset => "tournament_reset",
            Self::Unknown => "unknown",
        }
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

    #[test]
    fn match_slots_normalize_to_participants() {
        let json = r#"{"match_number":4,"team_a":{"id":"A","name":"Alpha"},"team_b":{"id":"B"}}"#;
        let m: Match = serde_json::from_str(json).unwrap();
        assert_eq!(m.match_number, 4);
        let ids: Vec<_> = m.participants.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["A", "B"]);
        assert_eq!(m.participants[0].name.as_deref(), Some("Alpha"));
    }

    #[test]
    fn match_participants_array_wins_over_slots() {
        let json = r#"{"match_number":1,"participants":[{"id":"X"},{"id":"Y"},{"id":"Z"},{"id":"W"}],"team_a":{"id":"A"}}"#;
        let m: Match = serde_json::from_str(json).unwrap();
        assert_eq!(m.participants.len(), 4);
        assert_eq!(m.participants[3].id, "W");
    }

    #[test]
    fn progress_slots_keep_order_and_skip_missing_third() {
        let json = r#"{"round":2,"total_rounds":10,
            "team_a":{"id":"B","score":3,"last_move":"cooperate"},
            "team_b":{"id":"A","score":1,"last_move":"D"}}"#;
        let p: MatchProgress = serde_json::from_str(json).unwrap();
        assert_eq!(p.round, 2);
        assert_eq!(p.total_rounds, 10);
        let ids: Vec<_> = p.per_team.keys().map(String::as_str).collect();
        assert_eq!(ids, ["B", "A"]);
        assert_eq!(p.per_team["A"].last_move, Some(Move::Defect));
        assert_eq!(p.per_team["B"].last_move, Some(Move::Cooperate));
    }

    #[test]
    fn progress_serializes_to_a_shape_it_can_read_back() {
        let json = r#"{"round":1,"total_rounds":3,"participants":[{"id":"A","score":5}]}"#;
        let p: MatchProgress = serde_json::from_str(json).unwrap();
        let back: MatchProgress =
            serde_json::from_str(&serde_json::to_string(&p).unwrap()).unwrap();
        assert_eq!(back, p);
        assert_eq!(back.per_team["A"].last_move, None);
    }

    #[test]
    fn unknown_tag_is_not_an_error() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"confetti","data":{"color":"red"}}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }

    #[test]
    fn missing_tag_is_an_error() {
        assert!(serde_json::from_str::<ServerMessage>(r#"{"data":{}}"#).is_err());
    }

    #[test]
    fn unit_tags_ignore_extra_fields() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"tournament_paused","data":{"by":"admin"}}"#)
                .unwrap();
        assert_eq!(msg, ServerMessage::TournamentPaused);
        assert_eq!(msg.tag(), "tournament_paused");
    }

    #[test]
    fn status_uses_lowercase_names() {
        let t: Tournament = serde_json::from_str(r#"{"status":"finished"}"#).unwrap();
        assert_eq!(t.status, TournamentStatus::Finished);
        assert_eq!(
            serde_json::to_string(&Tournament::default()).unwrap(),
            r#"{"status":"idle"}"#
        );
    }
}
