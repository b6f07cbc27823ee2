// trivia_protocol — wire protocol for the trivia session coordinator.
//
// This crate defines the message types, envelopes, and framing used by the
// coordinator (`trivia_server`) and game clients to communicate over TCP.
// It is shared between both sides and has no networking of its own.
//
// Module overview:
// - `types.rs`:    Identifier newtypes — `PlayerId`, `SessionId` — and the
//                  `SessionState` lifecycle enum.
// - `message.rs`:  Client-to-server and server-to-client message enums, the
//                  wire envelopes, and supporting structs
//                  (`SessionSettings`, `SessionSnapshot`, `Question`, ...).
// - `framing.rs`:  Newline-delimited framing over any `BufRead`/`Write`
//                  stream: one JSON object per line, reassembled across
//                  arbitrary read boundaries.
//
// Design decisions:
// - **JSON serialization.** One object per newline-terminated frame; the
//   envelope shape is `{"type", "data", "player_id", "timestamp"}`.
// - **Adjacent tagging.** Each message enum carries its kind in `type` and
//   its payload in `data`, so an unknown kind fails to parse and can be
//   dropped by the receiver without tearing the connection down.
// - **No async runtime.** Uses `std::io` traits for framing, compatible
//   with blocking TCP streams and buffered wrappers.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use message::{
    AnswerResult, ClientEnvelope, ClientMessage, PlayerInfo, Question, ScoreEntry,
    ServerEnvelope, ServerMessage, SessionSettings, SessionSnapshot,
};
pub use types::{PlayerId, SessionId, SessionState};
