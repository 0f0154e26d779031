//! SFS2X over WebSocket.
//!
//! The server also accepts the binary protocol over WebSocket. Each
//! binary message carries a slice of the same byte stream a TCP socket
//! would, so [`WebSocketConnection`] buffers the current message and
//! hands it out through [`Connection::recv`] in caller-sized pieces.

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsError = tokio_tungstenite::tungstenite::Error;

fn io_error(kind: std::io::ErrorKind, err: WsError) -> std::io::Error {
    std::io::Error::new(kind, err)
}

/// Read side of the socket plus whatever is left of the last message.
struct Inbound {
    stream: SplitStream<WsStream>,
    pending: Vec<u8>,
    offset: usize,
}

/// A client-side WebSocket connection to an SFS2X server.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    inbound: Mutex<Inbound>,
    closed: AtomicBool,
}

impl WebSocketConnection {
    /// Connects to a WebSocket endpoint such as
    /// `ws://host:8080/websocket`.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| TransportError::ConnectFailed {
                    addr: url.to_string(),
                    source: io_error(std::io::ErrorKind::ConnectionRefused, e),
                })?;

        let id = ConnectionId::next();
        tracing::info!(%id, url, "websocket connection established");

        let (sink, stream) = ws.split();
        Ok(Self {
            id,
            sink: Mutex::new(sink),
            inbound: Mutex::new(Inbound {
                stream,
                pending: Vec::new(),
                offset: 0,
            }),
            closed: AtomicBool::new(false),
        })
    }
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed(format!("{} already closed", self.id)));
        }
        let frame = Message::Binary(data.to_vec().into());
        self.sink
            .lock()
            .await
            .send(frame)
            .await
            .map_err(|e| TransportError::SendFailed(io_error(std::io::ErrorKind::BrokenPipe, e)))
    }

    async fn recv(&self, max: usize) -> Result<Vec<u8>, TransportError> {
        let mut inbound = self.inbound.lock().await;

        while inbound.offset >= inbound.pending.len() {
            match inbound.stream.next().await {
                Some(Ok(Message::Binary(payload))) => {
                    inbound.pending = payload.to_vec();
                    inbound.offset = 0;
                }
                Some(Ok(Message::Text(payload))) => {
                    inbound.pending = payload.as_bytes().to_vec();
                    inbound.offset = 0;
                }
                // Same as a socket at EOF.
                Some(Ok(Message::Close(_))) | None => return Ok(Vec::new()),
                // Control traffic carries no stream bytes.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    let source = io_error(std::io::ErrorKind::ConnectionReset, e);
                    return Err(TransportError::ReceiveFailed(source));
                }
            }
        }

        let end = inbound.pending.len().min(inbound.offset + max);
        let chunk = inbound.pending[inbound.offset..end].to_vec();
        inbound.offset = end;
        Ok(chunk)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(id = %self.id, "closing websocket connection");
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(io_error(std::io::ErrorKind::BrokenPipe, e)))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
