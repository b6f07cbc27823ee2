// Protocol messages for client-server communication.
//
// Two enums define the full protocol vocabulary:
// - `ClientMessage`: sent by game clients to the coordinator.
// - `ServerMessage`: sent by the coordinator to game clients.
//
// Both are adjacently tagged (`tag = "type"`, `content = "data"`) so each
// serializes to the `{"type": ..., "data": {...}}` shape the wire format
// requires. The `ClientEnvelope` / `ServerEnvelope` wrappers flatten the
// tagged enum and add the top-level `player_id` / `timestamp` fields,
// producing exactly:
//
//   {"type": "<kind>", "data": {...}, "player_id": "<id>", "timestamp": "<RFC3339>"}
//
// Supporting structs (`SessionSettings`, `SessionSnapshot`, `Question`,
// `ScoreEntry`, `AnswerResult`) are shared by both directions. All types
// derive `Serialize`/`Deserialize` for the newline framing in `framing.rs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PlayerId, SessionId, SessionState};

/// Messages sent by a client to the coordinator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on a new socket, establishing player identity.
    /// The server generates a `player_id` when the field is absent.
    Handshake {
        #[serde(default)]
        player_id: Option<PlayerId>,
        #[serde(default)]
        player_name: Option<String>,
    },
    /// Create a new session with the sender as host and first player.
    CreateSession(SessionSettings),
    /// Join an existing session by id.
    JoinSession { session_id: SessionId },
    /// Toggle the sender's ready flag in their session's lobby.
    SetReady { ready: bool },
    /// Answer the currently active question. First answer wins.
    SubmitAnswer { answer: String },
    /// Leave the current session and disconnect.
    LeaveSession {},
    /// Keepalive; refreshes the sender's last-seen timestamp.
    Ping {},
}

/// Messages sent by the coordinator to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted; echoes the (possibly generated) player id.
    HandshakeAck {
        player_id: PlayerId,
        server_time: DateTime<Utc>,
    },
    /// Session created; the requester is host and first player.
    SessionCreated { session: SessionSnapshot },
    /// Join succeeded; full session snapshot for the new member.
    SessionJoined { session: SessionSnapshot },
    /// Another player joined the session.
    PlayerJoined {
        player_id: PlayerId,
        player_name: String,
    },
    /// A player's ready flag changed.
    PlayerReady { player_id: PlayerId, ready: bool },
    /// A player left the session.
    PlayerLeft { player_id: PlayerId },
    /// All players were ready and the question list is loaded.
    GameStarted { question_count: u32 },
    /// A question is now active. Never carries the correct answer.
    Question {
        index: u32,
        total: u32,
        text: String,
        options: Vec<String>,
        time_limit_seconds: u32,
    },
    /// The question closed; per-player outcomes and running totals.
    QuestionResult {
        correct_answer: String,
        results: Vec<AnswerResult>,
    },
    /// All questions exhausted; final ranking, descending by score.
    GameFinished { final_scores: Vec<ScoreEntry> },
    /// The session ended (host left or server shutdown).
    SessionEnded {},
    /// A request failed; human-readable reason.
    Error { message: String },
    /// Reply to `ping`.
    Pong { server_time: DateTime<Utc> },
}

/// Client→server wire envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    #[serde(flatten)]
    pub message: ClientMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    pub timestamp: DateTime<Utc>,
}

impl ClientEnvelope {
    /// Wrap a message with the sender's id and the current time.
    pub fn new(message: ClientMessage, player_id: Option<PlayerId>) -> Self {
        Self {
            message,
            player_id,
            timestamp: Utc::now(),
        }
    }
}

/// Server→client wire envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    #[serde(flatten)]
    pub message: ServerMessage,
    pub timestamp: DateTime<Utc>,
}

impl ServerEnvelope {
    /// Wrap a message with the current time.
    pub fn new(message: ServerMessage) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Immutable configuration of a session, fixed at creation. Also the
/// `create_session` payload; every field has a default so clients only send
/// what they care about.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default = "default_question_type")]
    pub question_type: String,
    #[serde(default)]
    pub category_id: Option<u32>,
    #[serde(default = "default_category_name")]
    pub category_name: String,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    #[serde(default = "default_questions_per_game")]
    pub questions_per_game: u32,
    #[serde(default = "default_time_limit")]
    pub time_limit_per_question: u32,
}

fn default_language() -> String {
    "en".into()
}

fn default_difficulty() -> String {
    "medium".into()
}

fn default_question_type() -> String {
    "multiple".into()
}

fn default_category_name() -> String {
    "All categories".into()
}

fn default_max_players() -> u32 {
    4
}

fn default_questions_per_game() -> u32 {
    10
}

fn default_time_limit() -> u32 {
    30
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            difficulty: default_difficulty(),
            question_type: default_question_type(),
            category_id: None,
            category_name: default_category_name(),
            max_players: default_max_players(),
            questions_per_game: default_questions_per_game(),
            time_limit_per_question: default_time_limit(),
        }
    }
}

/// One quiz question as supplied by the question source. The wire `question`
/// message carries only `text` and `options` — the correct answer stays on
/// the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// Public identity and aggregate state of a session member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_id: PlayerId,
    pub player_name: String,
    pub ready: bool,
    pub score: u32,
}

/// Serializable view of a session, sent on create/join.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub host_player_id: PlayerId,
    pub host_player_name: String,
    #[serde(flatten)]
    pub settings: SessionSettings,
    pub state: SessionState,
    pub current_question_index: u32,
    pub player_count: u32,
    pub ready_count: u32,
    pub players: Vec<PlayerInfo>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One ranking entry in `game_finished`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub player_name: String,
    pub score: u32,
}

/// One player's outcome for a single question in `question_result`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub player_id: PlayerId,
    pub player_name: String,
    pub answer: Option<String>,
    pub correct: bool,
    pub points_awarded: u32,
    pub total_score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_envelope_wire_shape() {
        let envelope = ClientEnvelope::new(
            ClientMessage::Handshake {
                player_id: Some(PlayerId("p-1".into())),
                player_name: Some("Alice".into()),
            },
            Some(PlayerId("p-1".into())),
        );
        let value: serde_json::Value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "handshake");
        assert_eq!(value["data"]["player_id"], "p-1");
        assert_eq!(value["data"]["player_name"], "Alice");
        assert_eq!(value["player_id"], "p-1");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn client_envelope_roundtrip() {
        let envelope = ClientEnvelope::new(
            ClientMessage::SubmitAnswer {
                answer: "Rome".into(),
            },
            Some(PlayerId("p-2".into())),
        );
        let json = serde_json::to_string(&envelope).unwrap();
        let recovered: ClientEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, envelope);
    }

    #[test]
    fn create_session_payload_defaults() {
        let json = r#"{
            "type": "create_session",
            "data": {"language": "de", "category_name": "History"},
            "timestamp": "2024-01-01T00:00:00Z"
        }"#;
        let envelope: ClientEnvelope = serde_json::from_str(json).unwrap();
        match envelope.message {
            ClientMessage::CreateSession(settings) => {
                assert_eq!(settings.language, "de");
                assert_eq!(settings.category_name, "History");
                assert_eq!(settings.max_players, 4);
                assert_eq!(settings.questions_per_game, 10);
                assert_eq!(settings.time_limit_per_question, 30);
                assert_eq!(settings.difficulty, "medium");
                assert_eq!(settings.category_id, None);
            }
            other => panic!("expected CreateSession, got {other:?}"),
        }
    }

    #[test]
    fn handshake_without_identity_parses() {
        let json = r#"{"type": "handshake", "data": {}, "timestamp": "2024-01-01T00:00:00Z"}"#;
        let envelope: ClientEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(
            envelope.message,
            ClientMessage::Handshake {
                player_id: None,
                player_name: None,
            }
        );
        assert_eq!(envelope.player_id, None);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = r#"{"type": "warp_speed", "data": {}, "timestamp": "2024-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<ClientEnvelope>(json).is_err());
    }

    #[test]
    fn server_question_never_carries_answer() {
        let envelope = ServerEnvelope::new(ServerMessage::Question {
            index: 1,
            total: 10,
            text: "Capital of Italy?".into(),
            options: vec!["Rome".into(), "Milan".into()],
            time_limit_seconds: 30,
        });
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&json).unwrap()["type"],
            "question"
        );
        assert!(!json.contains("correct_answer"));
    }

    #[test]
    fn session_snapshot_flattens_settings() {
        let snapshot = SessionSnapshot {
            session_id: SessionId("s-1".into()),
            host_player_id: PlayerId("p-1".into()),
            host_player_name: "Alice".into(),
            settings: SessionSettings::default(),
            state: SessionState::WaitingForPlayers,
            current_question_index: 0,
            player_count: 1,
            ready_count: 0,
            players: vec![PlayerInfo {
                player_id: PlayerId("p-1".into()),
                player_name: "Alice".into(),
                ready: false,
                score: 0,
            }],
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        // Settings fields sit at the top level of the snapshot object.
        assert_eq!(value["max_players"], 4);
        assert_eq!(value["state"], "waiting");
        let recovered: SessionSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(recovered, snapshot);
    }
}
