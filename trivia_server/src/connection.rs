// Server-side handle for one player's socket.
//
// `PlayerConnection` owns the buffered write half of an accepted stream plus
// the player's identity and liveness state. The event loop is the only
// caller of `send`, so no locking is needed. Write errors are swallowed
// after logging — the reader thread for the same socket will surface the
// broken pipe as a disconnect event, which is the single cleanup path.
//
// Per-question answer state lives in the owning `Session`, not here; the
// connection only tracks what outlives a session (identity, last-seen,
// which session the player is in).

use std::io::BufWriter;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Instant;

use trivia_protocol::framing::write_frame;
use trivia_protocol::message::{ServerEnvelope, ServerMessage};
use trivia_protocol::types::{PlayerId, SessionId};

/// One connected player: write half, identity, liveness, session membership.
pub struct PlayerConnection {
    pub player_id: PlayerId,
    pub player_name: String,
    pub addr: SocketAddr,
    pub session: Option<SessionId>,
    writer: BufWriter<TcpStream>,
    last_seen: Instant,
}

impl PlayerConnection {
    pub fn new(
        player_id: PlayerId,
        player_name: String,
        addr: SocketAddr,
        stream: TcpStream,
    ) -> Self {
        Self {
            player_id,
            player_name,
            addr,
            session: None,
            writer: BufWriter::new(stream),
            last_seen: Instant::now(),
        }
    }

    /// Serialize a message into a timestamped envelope and write one frame.
    /// A failed write is logged and otherwise ignored; the reader thread
    /// detects the dead socket.
    pub fn send(&mut self, message: &ServerMessage) {
        let envelope = ServerEnvelope::new(message.clone());
        let json = match serde_json::to_vec(&envelope) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("failed to serialize message for {}: {e}", self.player_id);
                return;
            }
        };
        if let Err(e) = write_frame(&mut self.writer, &json) {
            tracing::debug!("write to {} failed: {e}", self.player_id);
        }
    }

    /// Refresh the last-seen timestamp. Called for every inbound message.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Seconds since the last inbound message from this player.
    pub fn idle_for(&self) -> std::time::Duration {
        self.last_seen.elapsed()
    }

    /// Close the socket, suppressing close errors. Idempotent; also
    /// unblocks the reader thread parked on this stream.
    pub fn disconnect(&self) {
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}
