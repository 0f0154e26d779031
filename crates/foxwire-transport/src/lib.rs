//! Byte pipes underneath the foxwire SFS2X client.
//!
//! The SFS2X client only needs a duplex byte stream: bytes go out with
//! [`Connection::send`], and come back in arbitrarily sized pieces from
//! [`Connection::recv`]. Framing is the protocol layer's job, so a
//! transport never looks inside the bytes it carries.
//!
//! - [`StreamConnection`] wraps any `AsyncRead + AsyncWrite` stream
//!   ([`TcpConnection`] for real servers, `tokio::io::duplex` in tests).
//! - [`WebSocketConnection`] carries the same byte stream inside binary
//!   WebSocket messages.
//!
//! A proxy (SOCKS5 or similar) only changes how the stream is
//! established: wrap the proxied stream in a [`StreamConnection`] and the
//! rest of the stack is unaffected.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketConnection`], built on `tokio-tungstenite`.

mod error;
mod stream;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use stream::{StreamConnection, TcpConnection};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Process-unique tag attached to every connection, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw value, e.g. one read back from a log line.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocates the next process-wide unique id.
    pub fn next() -> Self {
        Self(ID_SEQUENCE.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(out, "conn-{}", self.0)
    }
}

/// A duplex byte pipe to an SFS2X server.
///
/// Methods take `&self` so one task can send while another reads. The
/// returned futures are `Send` because the client drives reads from a
/// spawned task.
pub trait Connection: Send + Sync + 'static {
    /// Sends all of `data` to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives at most `max` bytes.
    ///
    /// Short reads are normal. An empty result means nothing arrived on
    /// this attempt; a stream at end-of-file keeps returning empty
    /// results, and it is up to the caller to decide when that means the
    /// peer is gone.
    fn recv(
        &self,
        max: usize,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Shuts the pipe down. Later `recv` calls see end-of-stream.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Tag used in log fields.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_survives_and_displays_with_prefix() {
        let tag = ConnectionId::new(42);
        assert_eq!(tag.into_inner(), 42);
        assert_eq!(tag.to_string(), "conn-42");
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.into_inner() > a.into_inner());
    }
}
