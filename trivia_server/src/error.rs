// Typed errors for the session state machine and the client connect path.
//
// Handler code on the server maps `SessionError` values to `error` replies;
// none of these ever crash the event loop. The only fatal condition in the
// whole crate is failing to bind the listen port, which stays a plain
// `io::Error` from `start_server`.

use thiserror::Error;

use trivia_protocol::types::SessionState;

/// Rejections produced by `Session` guard checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is full")]
    Full,

    #[error("unknown player")]
    UnknownPlayer,

    #[error("already answered this question")]
    AlreadyAnswered,

    #[error("not all players are ready")]
    NotReady,

    #[error("operation not valid in state {0:?}")]
    WrongState(SessionState),

    #[error("session already finished")]
    Finished,
}

/// Failures while connecting a `TriviaClient`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake rejected: {0}")]
    Rejected(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}
