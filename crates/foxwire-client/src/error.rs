//! Error types for the client layer.

use std::time::Duration;

use foxwire_protocol::ProtocolError;
use foxwire_transport::TransportError;

/// Errors that can occur while driving an SFS2X session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The connection is gone: closed locally, dropped by the peer, or
    /// closed after too many consecutive empty reads. Every outstanding
    /// wait fails with this, and so does anything attempted afterwards.
    #[error("connection closed")]
    ConnectionClosed,

    /// No matching response arrived in time. Only this wait is affected;
    /// the session stays usable.
    #[error("timed out after {after:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: String,
        after: Duration,
    },

    /// The server's first reply was not a handshake response.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The server refused the login. `code` is the server's error code,
    /// `params` the values it substitutes into its message template.
    #[error("login rejected with error code {code}")]
    LoginRejected { code: i64, params: Vec<String> },

    /// Encoding or decoding failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
