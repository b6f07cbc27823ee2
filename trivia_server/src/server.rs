// TCP server and main event loop for the session coordinator.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (`TcpListener::accept()` loop): accepts new TCP
//   connections and sends `InternalEvent::NewConnection` to the main thread.
// - **Reader threads** (one per client): read the handshake frame first
//   (under `HANDSHAKE_TIMEOUT`, so a silent peer only ever ties up its own
//   thread), report it as `InternalEvent::HandshakeComplete`, then call
//   `framing::read_frame()` in a loop, deserialize `ClientEnvelope`, and
//   send `InternalEvent::MessageFrom` to the main thread. On read
//   error/EOF, send `InternalEvent::Disconnected`. Malformed frames are
//   logged and dropped without tearing the socket down.
// - **Main thread**: owns the `players` and `sessions` registries, receives
//   events from the channel, and dispatches them. Uses `recv_timeout` as the
//   housekeeping tick — question deadlines and the idle sweep run every
//   iteration, so there is no separate timer thread.
//
// The main thread is the only writer to client TCP streams. Reader threads
// only read. This avoids concurrent read/write on the same `TcpStream`.
//
// Inbound messages are attributed to the player id bound to the connection
// at handshake time (the reader thread's tag), not to the envelope's
// `player_id` field, so a client cannot act on another player's behalf.
//
// Shutdown: the main thread checks a `keep_running` flag (cleared by
// `ServerHandle::stop`), breaks out of the event loop, and closes every
// client socket on the way out.

use std::collections::HashMap;
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use chrono::Utc;

use trivia_protocol::framing::read_frame;
use trivia_protocol::message::{ClientEnvelope, ClientMessage, ServerMessage, SessionSettings};
use trivia_protocol::types::{PlayerId, SessionId, SessionState};

use crate::connection::PlayerConnection;
use crate::error::SessionError;
use crate::questions::QuestionSource;
use crate::session::Session;

/// Housekeeping cadence for the event loop: question deadlines and the
/// idle sweep are checked at least this often.
const TICK: Duration = Duration::from_millis(250);

/// Read timeout for the handshake frame, so a silent peer only occupies its
/// own connection thread. Cleared before the long-lived reader loop.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Events sent from listener/reader threads to the main thread.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
    },
    HandshakeComplete {
        stream: TcpStream,
        reader: BufReader<TcpStream>,
        addr: SocketAddr,
        player_id: PlayerId,
        player_name: Option<String>,
    },
    MessageFrom {
        player_id: PlayerId,
        envelope: ClientEnvelope,
    },
    Disconnected {
        player_id: PlayerId,
    },
}

/// Typed notifications for an embedding host process (GUI, CLI). The
/// server core has no callbacks; subscribers drain the channel returned by
/// `start_server`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    PlayerConnected {
        player_id: PlayerId,
        player_name: String,
    },
    PlayerDisconnected {
        player_id: PlayerId,
    },
    SessionCreated {
        session_id: SessionId,
        host: PlayerId,
    },
    GameStarted {
        session_id: SessionId,
    },
    GameFinished {
        session_id: SessionId,
    },
    SessionEnded {
        session_id: SessionId,
    },
}

/// Configuration for starting a coordinator.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Connections silent for longer than this are reaped.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8888,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Handle returned by `start_server` to control the running server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Signal the server to stop and wait for it to shut down. All client
    /// sockets are closed. Idempotent in effect — the flag is already
    /// cleared on a second call.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread {
            let _ = handle.join();
        }
    }
}

/// Start the coordinator on a background thread. Returns a handle for
/// stopping it, the actual bound address (useful when port 0 lets the OS
/// pick), and the event channel for the embedding process.
///
/// Failing to bind the listen port is the only fatal error.
pub fn start_server(
    config: ServerConfig,
    question_source: Box<dyn QuestionSource>,
) -> std::io::Result<(ServerHandle, SocketAddr, Receiver<ServerEvent>)> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();
    let (events_tx, events_rx) = mpsc::channel();

    let thread = thread::spawn(move || {
        run_server(listener, config, question_source, keep_running_clone, events_tx);
    });

    Ok((
        ServerHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
        events_rx,
    ))
}

/// Main event loop. Runs until `keep_running` is cleared.
fn run_server(
    listener: TcpListener,
    config: ServerConfig,
    question_source: Box<dyn QuestionSource>,
    keep_running: Arc<AtomicBool>,
    events: Sender<ServerEvent>,
) {
    let mut state = ServerState {
        players: HashMap::new(),
        sessions: HashMap::new(),
        question_source,
        events,
        idle_timeout: config.idle_timeout,
        name_counter: 0,
    };

    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    // Non-blocking listener so the accept thread can check keep_running.
    listener.set_nonblocking(true).ok();

    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(false).ok();
                    let _ = tx_listener.send(InternalEvent::NewConnection { stream });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(_) => break,
            }
        }
    });

    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(TICK) {
            Ok(event) => {
                handle_event(&mut state, event, &tx, &keep_running);
                // Drain any additional events that arrived during handling.
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut state, event, &tx, &keep_running);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        state.enforce_question_deadlines();
        state.expire_idle_players();
    }

    // Shutdown: close every client socket; reader threads see EOF and exit.
    for conn in state.players.values() {
        conn.disconnect();
    }
    tracing::info!("server stopped");
}

/// Dispatch a single internal event.
fn handle_event(
    state: &mut ServerState,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        InternalEvent::NewConnection { stream } => {
            handle_new_connection(stream, tx);
        }
        InternalEvent::HandshakeComplete {
            stream,
            reader,
            addr,
            player_id,
            player_name,
        } => {
            register_player(
                state,
                stream,
                reader,
                addr,
                player_id,
                player_name,
                tx,
                keep_running,
            );
        }
        InternalEvent::MessageFrom {
            player_id,
            envelope,
        } => {
            state.handle_message(&player_id, envelope);
        }
        InternalEvent::Disconnected { player_id } => {
            state.drop_player(&player_id);
        }
    }
}

/// Hand a new TCP connection to its own thread for the handshake read.
/// The event loop never blocks on a client socket; a peer that connects
/// and sends nothing only ties up the thread spawned here.
fn handle_new_connection(stream: TcpStream, tx: &Sender<InternalEvent>) {
    let tx = tx.clone();
    thread::spawn(move || {
        if let Some(event) = read_handshake(stream) {
            let _ = tx.send(event);
        }
    });
}

/// Blocking handshake read, run on the connection's thread under
/// `HANDSHAKE_TIMEOUT`. Returns the registration event for the main loop,
/// or `None` to drop the connection.
fn read_handshake(stream: TcpStream) -> Option<InternalEvent> {
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT)).ok()?;
    let addr = stream.peer_addr().ok()?;
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let handshake_bytes = read_frame(&mut reader).ok()?;
    let envelope: ClientEnvelope = match serde_json::from_slice(&handshake_bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("dropping connection from {addr}: bad handshake frame: {e}");
            return None;
        }
    };

    let ClientMessage::Handshake {
        player_id,
        player_name,
    } = envelope.message
    else {
        tracing::warn!("dropping connection from {addr}: expected handshake first");
        return None;
    };

    // Clear the handshake timeout for the long-lived reader loop.
    reader.get_ref().set_read_timeout(None).ok();

    Some(InternalEvent::HandshakeComplete {
        stream,
        reader,
        addr,
        player_id: player_id.unwrap_or_else(PlayerId::generate),
        player_name,
    })
}

/// Register a player whose handshake completed: reply with `handshake_ack`
/// and spawn the long-lived reader thread, reusing the buffered reader so
/// frames that arrived behind the handshake are not lost.
#[allow(clippy::too_many_arguments)]
fn register_player(
    state: &mut ServerState,
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    addr: SocketAddr,
    player_id: PlayerId,
    player_name: Option<String>,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    let player_name = player_name.unwrap_or_else(|| state.next_generated_name());
    let mut conn = PlayerConnection::new(player_id.clone(), player_name.clone(), addr, stream);

    if state.players.contains_key(&player_id) {
        conn.send(&ServerMessage::Error {
            message: "player id already connected".into(),
        });
        conn.disconnect();
        return;
    }

    conn.send(&ServerMessage::HandshakeAck {
        player_id: player_id.clone(),
        server_time: Utc::now(),
    });

    let tx_reader = tx.clone();
    let keep_running_reader = keep_running.clone();
    let reader_player_id = player_id.clone();
    thread::spawn(move || {
        reader_loop(reader, reader_player_id, tx_reader, keep_running_reader);
    });

    tracing::info!("player connected: {player_name} ({player_id}) from {addr}");
    state.players.insert(player_id.clone(), conn);
    let _ = state.events.send(ServerEvent::PlayerConnected {
        player_id,
        player_name,
    });
}

/// Reader loop for a single client. Runs in its own thread. Malformed
/// frames are dropped (the connection survives, per the protocol-error
/// policy); read errors and EOF surface as a disconnect.
fn reader_loop(
    mut reader: BufReader<TcpStream>,
    player_id: PlayerId,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match read_frame(&mut reader) {
            Ok(bytes) => match serde_json::from_slice::<ClientEnvelope>(&bytes) {
                Ok(envelope) => {
                    let player_id = player_id.clone();
                    if tx
                        .send(InternalEvent::MessageFrom {
                            player_id,
                            envelope,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("dropping malformed frame from {player_id}: {e}");
                }
            },
            Err(_) => {
                // Read error or EOF.
                let _ = tx.send(InternalEvent::Disconnected { player_id });
                break;
            }
        }
    }
}

/// Registries and collaborators owned by the main thread. All session and
/// connection mutation goes through these methods, which serializes message
/// handling per session as required.
struct ServerState {
    players: HashMap<PlayerId, PlayerConnection>,
    sessions: HashMap<SessionId, Session>,
    question_source: Box<dyn QuestionSource>,
    events: Sender<ServerEvent>,
    idle_timeout: Duration,
    name_counter: u64,
}

impl ServerState {
    /// Route one parsed message to its handler. The sender is identified by
    /// the reader thread's tag, never by the envelope.
    fn handle_message(&mut self, player_id: &PlayerId, envelope: ClientEnvelope) {
        let Some(conn) = self.players.get_mut(player_id) else {
            return; // Raced with removal.
        };
        conn.touch();

        match envelope.message {
            ClientMessage::Handshake { .. } => {
                tracing::warn!("ignoring repeated handshake from {player_id}");
            }
            ClientMessage::CreateSession(settings) => self.create_session(player_id, settings),
            ClientMessage::JoinSession { session_id } => {
                self.join_session(player_id, &session_id);
            }
            ClientMessage::SetReady { ready } => self.set_ready(player_id, ready),
            ClientMessage::SubmitAnswer { answer } => self.submit_answer(player_id, answer),
            ClientMessage::LeaveSession {} => self.drop_player(player_id),
            ClientMessage::Ping {} => self.send_to(
                player_id,
                &ServerMessage::Pong {
                    server_time: Utc::now(),
                },
            ),
        }
    }

    /// Fallback display name for handshakes that omit one. Monotonic, so
    /// names stay distinct even after earlier players depart.
    fn next_generated_name(&mut self) -> String {
        self.name_counter += 1;
        format!("Player_{}", self.name_counter)
    }

    fn send_to(&mut self, player_id: &PlayerId, message: &ServerMessage) {
        if let Some(conn) = self.players.get_mut(player_id) {
            conn.send(message);
        }
    }

    fn send_error(&mut self, player_id: &PlayerId, message: impl Into<String>) {
        self.send_to(
            player_id,
            &ServerMessage::Error {
                message: message.into(),
            },
        );
    }

    /// Send a message to every member of a session, optionally excluding one.
    fn broadcast(
        &mut self,
        session_id: &SessionId,
        message: &ServerMessage,
        exclude: Option<&PlayerId>,
    ) {
        let member_ids = self
            .sessions
            .get(session_id)
            .map(Session::player_ids)
            .unwrap_or_default();
        for id in member_ids {
            if Some(&id) != exclude {
                self.send_to(&id, message);
            }
        }
    }

    fn create_session(&mut self, player_id: &PlayerId, settings: SessionSettings) {
        let Some(conn) = self.players.get(player_id) else {
            return;
        };
        if conn.session.is_some() {
            self.send_error(player_id, "already in a session");
            return;
        }
        if settings.max_players < 2 {
            self.send_error(player_id, "max_players must be at least 2");
            return;
        }

        let host_name = conn.player_name.clone();
        let session_id = SessionId::generate();
        let mut session = Session::new(
            session_id.clone(),
            player_id.clone(),
            host_name.clone(),
            settings,
        );
        if let Err(e) = session.add_player(player_id.clone(), host_name) {
            self.send_error(player_id, e.to_string());
            return;
        }
        let snapshot = session.snapshot();
        self.sessions.insert(session_id.clone(), session);
        if let Some(conn) = self.players.get_mut(player_id) {
            conn.session = Some(session_id.clone());
        }

        self.send_to(player_id, &ServerMessage::SessionCreated { session: snapshot });
        tracing::info!("session created: {session_id} by {player_id}");
        let _ = self.events.send(ServerEvent::SessionCreated {
            session_id,
            host: player_id.clone(),
        });
    }

    fn join_session(&mut self, player_id: &PlayerId, session_id: &SessionId) {
        let Some(conn) = self.players.get(player_id) else {
            return;
        };
        if conn.session.is_some() {
            self.send_error(player_id, "already in a session");
            return;
        }
        let player_name = conn.player_name.clone();

        let result = match self.sessions.get_mut(session_id) {
            None => Err("session not found".to_string()),
            Some(session) => session
                .add_player(player_id.clone(), player_name.clone())
                .map(|()| session.snapshot())
                .map_err(|e| match e {
                    SessionError::Full => "session is full".into(),
                    SessionError::WrongState(_) => "session already started".into(),
                    other => other.to_string(),
                }),
        };

        match result {
            Ok(snapshot) => {
                if let Some(conn) = self.players.get_mut(player_id) {
                    conn.session = Some(session_id.clone());
                }
                self.send_to(player_id, &ServerMessage::SessionJoined { session: snapshot });
                self.broadcast(
                    session_id,
                    &ServerMessage::PlayerJoined {
                        player_id: player_id.clone(),
                        player_name,
                    },
                    Some(player_id),
                );
                tracing::info!("{player_id} joined session {session_id}");
            }
            Err(message) => self.send_error(player_id, message),
        }
    }

    fn set_ready(&mut self, player_id: &PlayerId, ready: bool) {
        let Some(session_id) = self.session_of(player_id) else {
            self.send_error(player_id, "not in a session");
            return;
        };
        let result = match self.sessions.get_mut(&session_id) {
            None => return,
            Some(session) => session
                .set_ready(player_id, ready)
                .map(|()| session.all_players_ready()),
        };
        match result {
            Ok(all_ready) => {
                self.broadcast(
                    &session_id,
                    &ServerMessage::PlayerReady {
                        player_id: player_id.clone(),
                        ready,
                    },
                    None,
                );
                if all_ready {
                    self.start_game(&session_id);
                }
            }
            Err(e) => self.send_error(player_id, e.to_string()),
        }
    }

    /// All players ready: fetch questions from the source and start the
    /// match. A source failure reverts the session to the lobby.
    fn start_game(&mut self, session_id: &SessionId) {
        let settings = match self.sessions.get_mut(session_id) {
            None => return,
            Some(session) => {
                if let Err(e) = session.start() {
                    tracing::warn!("cannot start session {session_id}: {e}");
                    return;
                }
                session.settings().clone()
            }
        };

        let questions = match self.question_source.fetch(&settings) {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => {
                self.fail_start(session_id, "question source returned no questions");
                return;
            }
            Err(reason) => {
                self.fail_start(session_id, &reason);
                return;
            }
        };

        let question_count = match self.sessions.get_mut(session_id) {
            None => return,
            Some(session) => match session.load_questions(questions) {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!("cannot load questions into {session_id}: {e}");
                    return;
                }
            },
        };

        self.broadcast(
            session_id,
            &ServerMessage::GameStarted { question_count },
            None,
        );
        tracing::info!("game started in session {session_id} ({question_count} questions)");
        let _ = self.events.send(ServerEvent::GameStarted {
            session_id: session_id.clone(),
        });
        self.advance_question(session_id);
    }

    fn fail_start(&mut self, session_id: &SessionId, reason: &str) {
        tracing::warn!("session {session_id} failed to start: {reason}");
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.abort_start();
        }
        self.broadcast(
            session_id,
            &ServerMessage::Error {
                message: format!("failed to load questions: {reason}"),
            },
            None,
        );
    }

    /// Broadcast the next question, or finish the game when the sequence
    /// is exhausted.
    fn advance_question(&mut self, session_id: &SessionId) {
        let step = match self.sessions.get_mut(session_id) {
            None => return,
            Some(session) => match session.next_question() {
                Ok(Some((index, question))) => Some((
                    index,
                    session.question_count() as u32,
                    question,
                    session.settings().time_limit_per_question,
                )),
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!("cannot advance session {session_id}: {e}");
                    return;
                }
            },
        };

        match step {
            Some((index, total, question, time_limit_seconds)) => {
                self.broadcast(
                    session_id,
                    &ServerMessage::Question {
                        index,
                        total,
                        text: question.text,
                        options: question.options,
                        time_limit_seconds,
                    },
                    None,
                );
            }
            None => self.finish_game(session_id),
        }
    }

    fn finish_game(&mut self, session_id: &SessionId) {
        let final_scores = match self.sessions.get_mut(session_id) {
            None => return,
            Some(session) => {
                if session.finish().is_err() {
                    return;
                }
                session.final_scores()
            }
        };
        self.broadcast(
            session_id,
            &ServerMessage::GameFinished { final_scores },
            None,
        );
        tracing::info!("game finished in session {session_id}");
        let _ = self.events.send(ServerEvent::GameFinished {
            session_id: session_id.clone(),
        });
    }

    fn submit_answer(&mut self, player_id: &PlayerId, answer: String) {
        let Some(session_id) = self.session_of(player_id) else {
            self.send_error(player_id, "not in a session");
            return;
        };
        let result = match self.sessions.get_mut(&session_id) {
            None => return,
            Some(session) => session
                .submit_answer(player_id, answer)
                .map(|()| session.all_answered()),
        };
        match result {
            Ok(true) => self.close_question(&session_id),
            Ok(false) => {}
            Err(e) => self.send_error(player_id, e.to_string()),
        }
    }

    /// Close the answer window, score the question, broadcast the results,
    /// and advance. Reached when everyone answered or the deadline fired.
    fn close_question(&mut self, session_id: &SessionId) {
        let (correct_answer, results) = match self.sessions.get_mut(session_id) {
            None => return,
            Some(session) => {
                if session.close_answer_window().is_err() {
                    return;
                }
                let Some(correct) = session
                    .current_question()
                    .map(|q| q.correct_answer.clone())
                else {
                    return;
                };
                match session.calculate_scores() {
                    Ok(results) => (correct, results),
                    Err(e) => {
                        tracing::warn!("cannot score session {session_id}: {e}");
                        return;
                    }
                }
            }
        };

        self.broadcast(
            session_id,
            &ServerMessage::QuestionResult {
                correct_answer,
                results,
            },
            None,
        );
        self.advance_question(session_id);
    }

    /// Remove a player entirely: session cleanup, socket close, registry
    /// removal. Explicit `leave_session`, reader-thread disconnects, and
    /// the idle sweep all route here.
    fn drop_player(&mut self, player_id: &PlayerId) {
        let Some(conn) = self.players.get_mut(player_id) else {
            return;
        };
        let session_id = conn.session.take();

        if let Some(session_id) = session_id {
            let is_host = self
                .sessions
                .get(&session_id)
                .is_some_and(|s| s.host() == player_id);
            if is_host {
                // Host departure ends the match for everyone.
                self.end_session(&session_id);
            } else {
                let (close_early, start_now) = match self.sessions.get_mut(&session_id) {
                    None => (false, false),
                    Some(session) => {
                        session.remove_player(player_id);
                        let close_early = session.state() == SessionState::QuestionActive
                            && session.player_count() > 0
                            && session.all_answered();
                        let start_now = session.state() == SessionState::WaitingForPlayers
                            && session.all_players_ready();
                        (close_early, start_now)
                    }
                };
                self.broadcast(
                    &session_id,
                    &ServerMessage::PlayerLeft {
                        player_id: player_id.clone(),
                    },
                    None,
                );
                // The departed player may have been the last one holding
                // the question open, or the only member not yet ready.
                if close_early {
                    self.close_question(&session_id);
                }
                if start_now {
                    self.start_game(&session_id);
                }
            }
        }

        if let Some(conn) = self.players.remove(player_id) {
            conn.disconnect();
            tracing::info!("player disconnected: {} ({player_id})", conn.player_name);
            let _ = self.events.send(ServerEvent::PlayerDisconnected {
                player_id: player_id.clone(),
            });
        }
    }

    /// Tear down a session: notify members, finish the state machine, and
    /// clear everyone's membership. Members other than the departing host
    /// stay connected.
    fn end_session(&mut self, session_id: &SessionId) {
        let Some(mut session) = self.sessions.remove(session_id) else {
            return;
        };
        let _ = session.finish();
        for member_id in session.player_ids() {
            if let Some(conn) = self.players.get_mut(&member_id) {
                conn.session = None;
            }
            if &member_id != session.host() {
                self.send_to(&member_id, &ServerMessage::SessionEnded {});
            }
        }
        tracing::info!("session ended: {session_id}");
        let _ = self.events.send(ServerEvent::SessionEnded {
            session_id: session_id.clone(),
        });
    }

    fn session_of(&self, player_id: &PlayerId) -> Option<SessionId> {
        self.players
            .get(player_id)
            .and_then(|conn| conn.session.clone())
    }

    /// Force-close questions whose time limit elapsed, regardless of
    /// `all_answered`.
    fn enforce_question_deadlines(&mut self) {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.question_expired())
            .map(|(id, _)| id.clone())
            .collect();
        for session_id in expired {
            tracing::debug!("question deadline reached in session {session_id}");
            self.close_question(&session_id);
        }
    }

    /// Reap connections that have been silent past the idle timeout, as a
    /// forced leave.
    fn expire_idle_players(&mut self) {
        let expired: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|(_, conn)| conn.idle_for() > self.idle_timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for player_id in expired {
            tracing::info!("idle timeout for {player_id}");
            self.drop_player(&player_id);
        }
    }
}
