// Core identifier and state types for the trivia protocol.
//
// `PlayerId` and `SessionId` are opaque string newtypes. Clients may supply
// their own player id during the handshake; the server generates one
// (UUIDv4) when the field is absent. Session ids are always server-assigned.
//
// `SessionState` is shared between the server's state machine and the
// session snapshots sent to clients, so the wire names live here too.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque player identifier. Client-supplied or server-generated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Generate a fresh random id (UUIDv4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned session identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh random id (UUIDv4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle states of a multiplayer session.
///
/// `WaitingForPlayers` is the initial state; `Finished` is terminal — once a
/// session is finished no score or question mutation is permitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[serde(rename = "waiting")]
    WaitingForPlayers,
    Starting,
    InProgress,
    QuestionActive,
    WaitingAnswers,
    ShowingResults,
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_player_ids_are_unique() {
        assert_ne!(PlayerId::generate(), PlayerId::generate());
    }

    #[test]
    fn session_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&SessionState::WaitingForPlayers).unwrap(),
            r#""waiting""#
        );
        assert_eq!(
            serde_json::to_string(&SessionState::QuestionActive).unwrap(),
            r#""question_active""#
        );
        let state: SessionState = serde_json::from_str(r#""finished""#).unwrap();
        assert_eq!(state, SessionState::Finished);
    }
}
