//! Byte-stream connections over any `AsyncRead + AsyncWrite`.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, TransportError};

/// A [`Connection`] over a plain byte stream.
///
/// The stream is split so that a send never waits behind a pending read:
/// the reader task can sit in `recv` indefinitely while requests go out.
pub struct StreamConnection<S> {
    id: ConnectionId,
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    closed: AtomicBool,
}

/// A [`StreamConnection`] over TCP, the standard SFS2X transport.
pub type TcpConnection = StreamConnection<TcpStream>;

impl<S> StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wraps an already established stream.
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let id = ConnectionId::next();
        tracing::debug!(%id, "stream connection created");
        Self {
            id,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }
}

impl StreamConnection<TcpStream> {
    /// Opens a TCP connection to `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            TransportError::ConnectFailed {
                addr: format!("{host}:{port}"),
                source: e,
            }
        })?;
        // Requests are small and latency-bound.
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::ConnectFailed {
                addr: format!("{host}:{port}"),
                source: e,
            })?;
        tracing::info!(host, port, "tcp connection established");
        Ok(Self::new(stream))
    }
}

impl<S> Connection for StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed(format!("{} already closed", self.id)));
        }
        let mut writer = self.writer.lock().await;
        writer
            .write_all(data)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self, max: usize) -> Result<Vec<u8>, TransportError> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; max];
        let n = self
            .reader
            .lock()
            .await
            .read(&mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        buf.truncate(n);
        Ok(buf)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(id = %self.id, "closing stream connection");
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplex_send_and_short_reads() {
        let (client, mut server) = tokio::io::duplex(64);
        let conn = StreamConnection::new(client);

        conn.send(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        server.write_all(b"abcdef").await.unwrap();
        let first = conn.recv(4).await.unwrap();
        assert_eq!(first, b"abcd");
        let rest = conn.recv(4).await.unwrap();
        assert_eq!(rest, b"ef");
    }

    #[tokio::test]
    async fn test_recv_returns_empty_at_end_of_stream() {
        let (client, server) = tokio::io::duplex(64);
        let conn = StreamConnection::new(client);
        drop(server);

        assert!(conn.recv(16).await.unwrap().is_empty());
        assert!(conn.recv(16).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_after_close_is_refused() {
        let (client, mut server) = tokio::io::duplex(64);
        let conn = StreamConnection::new(client);

        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert!(matches!(
            conn.send(b"late").await,
            Err(TransportError::ConnectionClosed(_))
        ));

        let mut buf = Vec::new();
        server.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_recv_with_zero_max_does_not_read() {
        let (client, mut server) = tokio::io::duplex(64);
        let conn = StreamConnection::new(client);
        server.write_all(b"x").await.unwrap();

        assert!(conn.recv(0).await.unwrap().is_empty());
        assert_eq!(conn.recv(1).await.unwrap(), b"x");
    }
}
