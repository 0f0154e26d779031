//! Frame reading and the liveness heuristic.
//!
//! SFS2X has no heartbeat the client can rely on, so a dead peer shows
//! up as reads that return nothing. [`Liveness`] counts those; once the
//! count reaches its threshold the connection is treated as closed.

use std::sync::Arc;

use bytes::Bytes;
use foxwire_protocol::{FrameDecoder, ProtocolError};
use foxwire_transport::Connection;

use crate::{ClientConfig, ClientError};

/// What one step of reading produced.
#[derive(Debug)]
pub enum ReadEvent {
    /// A complete, non-empty frame body.
    Frame(Bytes),

    /// Nothing useful: a zero-byte read or a zero-length frame.
    Empty,

    /// A frame started with a bad marker byte. The byte is consumed.
    Malformed(ProtocolError),
}

/// Owns the read side of a connection and reassembles frames from it.
pub struct FrameReader<C> {
    conn: Arc<C>,
    decoder: FrameDecoder,
    read_chunk_size: usize,
}

impl<C: Connection> FrameReader<C> {
    pub fn new(conn: Arc<C>, config: &ClientConfig) -> Self {
        Self {
            conn,
            decoder: FrameDecoder::with_max_frame_len(config.max_frame_len),
            read_chunk_size: config.read_chunk_size.max(1),
        }
    }

    /// Reads until a frame completes or a read comes back empty.
    ///
    /// Frames already buffered are returned without touching the
    /// connection. Transport failures and oversized frames are errors:
    /// the stream cannot be resynchronised after either.
    pub async fn next_event(&mut self) -> Result<ReadEvent, ClientError> {
        loop {
            match self.decoder.next_frame() {
                Ok(Some(body)) if body.is_empty() => return Ok(ReadEvent::Empty),
                Ok(Some(body)) => return Ok(ReadEvent::Frame(body)),
                Ok(None) => {}
                Err(e @ ProtocolError::MalformedFrame(_)) => return Ok(ReadEvent::Malformed(e)),
                Err(e) => return Err(e.into()),
            }

            let want = self.decoder.remaining_hint().min(self.read_chunk_size);
            let data = self.conn.recv(want).await?;
            if data.is_empty() {
                return Ok(ReadEvent::Empty);
            }
            tracing::trace!(
                conn_id = %self.conn.id(),
                bytes = data.len(),
                buffered = self.decoder.buffered(),
                "read"
            );
            self.decoder.extend(&data);
        }
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }
}

/// Counts consecutive empty reads.
#[derive(Debug, Clone)]
pub struct Liveness {
    threshold: u32,
    consecutive_empty: u32,
}

impl Liveness {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_empty: 0,
        }
    }

    /// Records an empty read. Returns `true` once the threshold is hit.
    pub fn record_empty(&mut self) -> bool {
        self.consecutive_empty += 1;
        self.consecutive_empty >= self.threshold
    }

    /// Records a real frame, resetting the count.
    pub fn record_activity(&mut self) {
        self.consecutive_empty = 0;
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }
}
