//! Packet framing.
//!
//! Every message on the wire is a frame:
//!
//! ```text
//! 0x80 len:u16 body     (body shorter than 65535 bytes)
//! 0x88 len:u32 body     (everything else)
//! ```
//!
//! The body is an encoded root object. [`FrameDecoder`] reassembles
//! frames from arbitrarily fragmented input.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{DecodeOptions, ProtocolError, SfsObject, decode_object_with, encode_object};

/// Marker for a frame with a two-byte length.
pub const SHORT_FRAME_MARKER: u8 = 0x80;

/// Marker for a frame with a four-byte length.
pub const LONG_FRAME_MARKER: u8 = 0x88;

/// Bodies at or above this size use the long form.
pub const SHORT_FRAME_LIMIT: usize = 65535;

/// Default cap on an inbound frame body.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Wraps an encoded body in a frame header.
pub fn encode_frame(body: &[u8]) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::with_capacity(body.len() + 5);
    if body.len() < SHORT_FRAME_LIMIT {
        buf.put_u8(SHORT_FRAME_MARKER);
        buf.put_u16(body.len() as u16);
    } else {
        let len = u32::try_from(body.len()).map_err(|_| ProtocolError::LengthOverflow {
            what: "frame body",
            len: body.len(),
            max: u32::MAX as usize,
        })?;
        buf.put_u8(LONG_FRAME_MARKER);
        buf.put_u32(len);
    }
    buf.put_slice(body);
    Ok(buf.freeze())
}

/// Encodes an object and frames it, ready to send.
pub fn compile_packet(obj: &SfsObject) -> Result<Bytes, ProtocolError> {
    let body = encode_object(obj)?;
    encode_frame(&body)
}

/// Decodes a frame body (not the header) into its root object.
pub fn decompile_packet(
    body: &[u8],
    options: DecodeOptions,
) -> Result<SfsObject, ProtocolError> {
    decode_object_with(body, options)
}

// ---------------------------------------------------------------------------
// FrameDecoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitingForMarker,
    /// Marker seen; `width` is 2 or 4.
    WaitingForLength { width: usize },
    WaitingForBody { len: usize },
}

/// Push-based frame reassembly.
///
/// Feed bytes with [`extend`](Self::extend) in whatever pieces the
/// transport delivers, then drain [`next_frame`](Self::next_frame) until
/// it returns `Ok(None)`.
///
/// ```rust
/// use foxwire_protocol::{FrameDecoder, encode_frame};
///
/// let frame = encode_frame(b"hello").unwrap();
/// let mut decoder = FrameDecoder::new();
///
/// decoder.extend(&frame[..2]);
/// assert!(decoder.next_frame().unwrap().is_none());
///
/// decoder.extend(&frame[2..]);
/// assert_eq!(&decoder.next_frame().unwrap().unwrap()[..], b"hello");
/// ```
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    state: State,
    max_frame_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForMarker,
            max_frame_len,
        }
    }

    /// Appends received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extracts the next complete frame body, if one is buffered.
    ///
    /// A bad marker byte is consumed and reported as `MalformedFrame`;
    /// calling again continues with the next byte. `FrameTooLarge`
    /// leaves the decoder unusable for this stream, since the body's
    /// extent cannot be skipped safely.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        loop {
            match self.state {
                State::WaitingForMarker => {
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    let width = match self.buffer.get_u8() {
                        SHORT_FRAME_MARKER => 2,
                        LONG_FRAME_MARKER => 4,
                        other => return Err(ProtocolError::MalformedFrame(other)),
                    };
                    self.state = State::WaitingForLength { width };
                }
                State::WaitingForLength { width } => {
                    if self.buffer.len() < width {
                        return Ok(None);
                    }
                    let len = if width == 2 {
                        usize::from(self.buffer.get_u16())
                    } else {
                        self.buffer.get_u32() as usize
                    };
                    if len > self.max_frame_len {
                        return Err(ProtocolError::FrameTooLarge {
                            len,
                            max: self.max_frame_len,
                        });
                    }
                    self.state = State::WaitingForBody { len };
                }
                State::WaitingForBody { len } => {
                    if self.buffer.len() < len {
                        return Ok(None);
                    }
                    self.state = State::WaitingForMarker;
                    return Ok(Some(self.buffer.split_to(len).freeze()));
                }
            }
        }
    }

    /// How many more bytes would complete the current stage.
    ///
    /// Readers use this to size the next read so they do not block on
    /// bytes the stream may never send.
    pub fn remaining_hint(&self) -> usize {
        let need = match self.state {
            State::WaitingForMarker => 1,
            State::WaitingForLength { width } => width,
            State::WaitingForBody { len } => len,
        };
        need.saturating_sub(self.buffer.len()).max(1)
    }

    /// Bytes buffered but not yet returned.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// True when no partial frame is pending.
    pub fn is_idle(&self) -> bool {
        self.state == State::WaitingForMarker && self.buffer.is_empty()
    }
}
