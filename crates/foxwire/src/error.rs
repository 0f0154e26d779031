//! Unified error type for foxwire.

use foxwire_client::ClientError;
use foxwire_protocol::ProtocolError;
use foxwire_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// With the `foxwire` crate you deal with this one type instead of
/// importing errors from each layer; `?` converts them.
#[derive(Debug, thiserror::Error)]
pub enum FoxwireError {
    /// Connecting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding, decoding or framing failed, or a value had the wrong kind.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level failure: timeout, closed connection, rejected login.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl FoxwireError {
    /// True when the session is gone and must be re-established.
    pub fn is_connection_closed(&self) -> bool {
        matches!(
            self,
            FoxwireError::Client(ClientError::ConnectionClosed)
                | FoxwireError::Client(ClientError::Transport(_))
                | FoxwireError::Transport(_)
        )
    }
}
