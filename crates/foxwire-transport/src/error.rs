/// Failures below the framing layer: opening, writing to, or reading from
/// the byte pipe.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server could not be reached.
    #[error("could not reach {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// `close` already ran on this pipe.
    #[error("pipe closed ({0})")]
    ConnectionClosed(String),

    #[error("write to server failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("read from server failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
