// trivia_server — multiplayer session coordinator for timed trivia matches.
//
// The coordinator accepts TCP connections from trivia clients, groups
// players into sessions, runs each session's lobby/question/scoring state
// machine, and broadcasts every state change to the session's members. It
// never fetches or translates question content — a `QuestionSource`
// supplies the ordered question list when a match starts.
//
// Module overview:
// - `session.rs`:    Session state machine — roster, ready gate, question
//                    progression, timed scoring. Pure state, no sockets.
//                    The core data structure that `server.rs` drives.
// - `server.rs`:     TCP listener, reader threads (one per client), and the
//                    main event loop. Uses `std::net` with a thread-per-reader
//                    architecture and an `mpsc` channel to funnel events into
//                    the single-threaded registries.
// - `connection.rs`: Per-player socket handle (write half, identity,
//                    last-seen timestamp).
// - `questions.rs`:  The `QuestionSource` trait and a fixed in-memory
//                    implementation.
// - `client.rs`:     `TriviaClient`, the blocking client counterpart used by
//                    frontends and the integration tests.
// - `error.rs`:      Typed session and client errors.
//
// Dependencies: `trivia_protocol` (shared message types and framing).
//
// The coordinator can run as a standalone binary (`main.rs`) or be embedded
// in a host process via the library API (`start_server`).

pub mod client;
pub mod connection;
pub mod error;
pub mod questions;
pub mod server;
pub mod session;

pub use client::TriviaClient;
pub use server::{ServerConfig, ServerEvent, ServerHandle, start_server};
