// Client counterpart to the coordinator.
//
// `TriviaClient` owns the write half of the connection; a background reader
// thread parses inbound frames and pushes them onto an internal channel.
// The owning thread consumes them with `poll` (non-blocking drain) or
// `recv_timeout` (bounded wait), so callers never block on the socket
// directly and a GUI loop can poll once per frame.

use std::io::{BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use trivia_protocol::framing::{read_frame, write_frame};
use trivia_protocol::message::{
    ClientEnvelope, ClientMessage, ServerEnvelope, ServerMessage, SessionSettings,
};
use trivia_protocol::types::{PlayerId, SessionId};

use crate::error::ClientError;

/// How long `connect` waits for the server's `handshake_ack`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected trivia client.
///
/// Convenience methods (`create_session`, `join_session`, ...) only send the
/// request; the server's reply arrives later through `poll`/`recv_timeout`
/// like any other message.
pub struct TriviaClient {
    player_id: PlayerId,
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerEnvelope>,
    closed: bool,
}

impl TriviaClient {
    /// Connect, perform the handshake, and spawn the reader thread.
    ///
    /// The client generates its own player id. An `error` reply during the
    /// handshake becomes `ClientError::Rejected`; any other unexpected reply
    /// is `ClientError::Protocol`.
    pub fn connect(addr: impl ToSocketAddrs, player_name: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let mut writer = BufWriter::new(stream.try_clone()?);
        let mut reader = BufReader::new(stream);

        let player_id = PlayerId::generate();
        send_envelope(
            &mut writer,
            &ClientEnvelope::new(
                ClientMessage::Handshake {
                    player_id: Some(player_id.clone()),
                    player_name: Some(player_name.to_string()),
                },
                Some(player_id.clone()),
            ),
        )?;

        let reply = read_envelope(&mut reader)?;
        match reply.message {
            ServerMessage::HandshakeAck { .. } => {}
            ServerMessage::Error { message } => return Err(ClientError::Rejected(message)),
            other => {
                return Err(ClientError::Protocol(format!(
                    "expected handshake_ack, got {other:?}"
                )));
            }
        }

        reader.get_ref().set_read_timeout(None)?;

        let (tx, rx): (Sender<ServerEnvelope>, Receiver<ServerEnvelope>) = mpsc::channel();
        thread::spawn(move || {
            loop {
                let Ok(bytes) = read_frame(&mut reader) else {
                    break; // EOF or socket error: inbox sender drops.
                };
                match serde_json::from_slice::<ServerEnvelope>(&bytes) {
                    Ok(envelope) => {
                        if tx.send(envelope).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("discarding unparseable server frame: {e}");
                    }
                }
            }
        });

        Ok(Self {
            player_id,
            writer,
            inbox: rx,
            closed: false,
        })
    }

    /// The id this client identifies as, as confirmed by the handshake.
    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    /// Drain every message received so far without blocking.
    pub fn poll(&mut self) -> Vec<ServerEnvelope> {
        let mut messages = Vec::new();
        loop {
            match self.inbox.try_recv() {
                Ok(envelope) => messages.push(envelope),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        messages
    }

    /// Wait up to `timeout` for the next message. `None` on timeout or
    /// when the connection has closed.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<ServerEnvelope> {
        match self.inbox.recv_timeout(timeout) {
            Ok(envelope) => Some(envelope),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// Whether the reader thread has observed the connection closing.
    /// Updated by `poll`/`recv_timeout`.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn create_session(&mut self, settings: SessionSettings) -> Result<(), ClientError> {
        self.send(ClientMessage::CreateSession(settings))
    }

    pub fn join_session(&mut self, session_id: SessionId) -> Result<(), ClientError> {
        self.send(ClientMessage::JoinSession { session_id })
    }

    pub fn set_ready(&mut self, ready: bool) -> Result<(), ClientError> {
        self.send(ClientMessage::SetReady { ready })
    }

    pub fn submit_answer(&mut self, answer: impl Into<String>) -> Result<(), ClientError> {
        self.send(ClientMessage::SubmitAnswer {
            answer: answer.into(),
        })
    }

    pub fn leave_session(&mut self) -> Result<(), ClientError> {
        self.send(ClientMessage::LeaveSession {})
    }

    pub fn ping(&mut self) -> Result<(), ClientError> {
        self.send(ClientMessage::Ping {})
    }

    fn send(&mut self, message: ClientMessage) -> Result<(), ClientError> {
        let envelope = ClientEnvelope::new(message, Some(self.player_id.clone()));
        send_envelope(&mut self.writer, &envelope)
    }

    /// Close the socket. Idempotent; the reader thread exits on its own.
    pub fn disconnect(&mut self) {
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
        self.closed = true;
    }
}

fn send_envelope<W: Write>(writer: &mut W, envelope: &ClientEnvelope) -> Result<(), ClientError> {
    let json = serde_json::to_vec(envelope)
        .map_err(|e| ClientError::Protocol(format!("serialize failed: {e}")))?;
    write_frame(writer, &json)?;
    Ok(())
}

fn read_envelope<R: std::io::BufRead>(reader: &mut R) -> Result<ServerEnvelope, ClientError> {
    let bytes = read_frame(reader)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ClientError::Protocol(format!("bad server frame: {e}")))
}
