//! Decoding: bytes to `Value` trees.
//!
//! The decoder is a recursive descent over a [`WireSource`]. Two sources
//! are provided and produce identical trees for identical bytes:
//!
//! - [`SliceSource`] — a cursor over an in-memory buffer (a frame body).
//! - [`ReadSource`] — any `std::io::Read`, tolerant of short reads.
//!
//! Each container consumes exactly the elements its header declares and
//! leaves the cursor on the first byte after itself. Nesting is capped by
//! [`DecodeOptions::max_depth`], so a hostile server cannot drive the
//! recursion arbitrarily deep.

use std::io::Read;

use crate::{ProtocolError, SfsArray, SfsObject, TypeTag, Value};

/// Default cap on nested containers, root included.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Streaming reads are done in pieces of at most this size, so a bogus
/// length header cannot trigger one huge allocation.
const READ_CHUNK: usize = 8 * 1024;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What to do with a type tag outside the known table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub enum UnknownTagPolicy {
    /// Fail with [`ProtocolError::UnknownTypeTag`].
    #[default]
    Reject,

    /// Degraded mode: stop consuming input and close the current
    /// container and all enclosing ones with what was decoded so far.
    ///
    /// The byte length of an unknown value cannot be known, so nothing
    /// after it can be located reliably, including siblings in outer
    /// containers.
    Truncate,
}

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub max_depth: usize,
    pub unknown_tags: UnknownTagPolicy,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            unknown_tags: UnknownTagPolicy::Reject,
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// A source of wire bytes.
pub trait WireSource {
    /// Fills `buf` completely, or fails with `TruncatedInput`.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ProtocolError>;

    /// Reads exactly `len` bytes into a new vector.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, ProtocolError>;

    fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError>
    where
        Self: Sized,
    {
        let mut b = [0u8; N];
        self.read_exact(&mut b)?;
        Ok(b)
    }
}

/// A cursor over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < len {
            return Err(ProtocolError::TruncatedInput {
                needed: len - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

impl WireSource for SliceSource<'_> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ProtocolError> {
        let slice = self.take(buf.len())?;
        buf.copy_from_slice(slice);
        Ok(())
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, ProtocolError> {
        // Checked against what is actually there before allocating.
        Ok(self.take(len)?.to_vec())
    }
}

/// A streaming source over any reader.
///
/// Short reads are retried until the requested length is satisfied; end
/// of stream first is `TruncatedInput`.
#[derive(Debug)]
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> WireSource for ReadSource<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ProtocolError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(ProtocolError::TruncatedInput {
                        needed: buf.len() - filled,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(ProtocolError::Io(e)),
            }
        }
        Ok(())
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(len.min(READ_CHUNK));
        let mut chunk = [0u8; READ_CHUNK];
        while out.len() < len {
            let want = (len - out.len()).min(READ_CHUNK);
            let after = len - out.len() - want;
            self.read_exact(&mut chunk[..want]).map_err(|e| match e {
                ProtocolError::TruncatedInput { needed } => {
                    ProtocolError::TruncatedInput {
                        needed: needed + after,
                    }
                }
                other => other,
            })?;
            out.extend_from_slice(&chunk[..want]);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Decodes a root object (tag 18 first) that spans the whole buffer.
pub fn decode_object(bytes: &[u8]) -> Result<SfsObject, ProtocolError> {
    decode_object_with(bytes, DecodeOptions::default())
}

/// [`decode_object`] with explicit options.
pub fn decode_object_with(
    bytes: &[u8],
    options: DecodeOptions,
) -> Result<SfsObject, ProtocolError> {
    let mut source = SliceSource::new(bytes);
    let mut decoder = Decoder::new(&mut source, options);
    let obj = decoder.root_object()?;
    let halted = decoder.halted;
    if !halted && source.remaining() > 0 {
        return Err(ProtocolError::TrailingBytes(source.remaining()));
    }
    Ok(obj)
}

/// Decodes one root object from a reader, leaving the reader positioned
/// right after it.
pub fn decode_object_from<R: Read>(
    reader: R,
    options: DecodeOptions,
) -> Result<SfsObject, ProtocolError> {
    let mut source = ReadSource::new(reader);
    Decoder::new(&mut source, options).root_object()
}

/// Decodes a single `tag || payload` value that spans the whole buffer.
pub fn decode_value(bytes: &[u8]) -> Result<Value, ProtocolError> {
    let mut source = SliceSource::new(bytes);
    let value = decode_value_from(&mut source, DecodeOptions::default())?;
    if source.remaining() > 0 {
        return Err(ProtocolError::TrailingBytes(source.remaining()));
    }
    Ok(value)
}

/// Decodes a single `tag || payload` value from any source, consuming
/// exactly its bytes.
pub fn decode_value_from<S: WireSource>(
    source: &mut S,
    options: DecodeOptions,
) -> Result<Value, ProtocolError> {
    let mut decoder = Decoder::new(source, options);
    match decoder.tag()? {
        Some(tag) => decoder.value(tag),
        None => Ok(Value::Null),
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

struct Decoder<'s, S> {
    source: &'s mut S,
    options: DecodeOptions,
    depth: usize,
    /// Set once an unknown tag was skipped in `Truncate` mode.
    halted: bool,
}

impl<'s, S: WireSource> Decoder<'s, S> {
    fn new(source: &'s mut S, options: DecodeOptions) -> Self {
        Self {
            source,
            options,
            depth: 0,
            halted: false,
        }
    }

    fn root_object(&mut self) -> Result<SfsObject, ProtocolError> {
        let tag = self.source.read_u8()?;
        if tag != u8::from(TypeTag::SfsObject) {
            return Err(ProtocolError::InvalidMessage(format!(
                "root must be an sfs_object, found tag {tag}"
            )));
        }
        self.object_body()
    }

    /// Reads a tag byte. `None` means an unknown tag was met in
    /// `Truncate` mode and decoding has halted.
    fn tag(&mut self) -> Result<Option<TypeTag>, ProtocolError> {
        let byte = self.source.read_u8()?;
        match TypeTag::try_from(byte) {
            Ok(tag) => Ok(Some(tag)),
            Err(e) => match self.options.unknown_tags {
                UnknownTagPolicy::Reject => Err(e),
                UnknownTagPolicy::Truncate => {
                    tracing::warn!(
                        tag = byte,
                        depth = self.depth,
                        "unknown type tag, truncating enclosing containers"
                    );
                    self.halted = true;
                    Ok(None)
                }
            },
        }
    }

    fn value(&mut self, tag: TypeTag) -> Result<Value, ProtocolError> {
        let value = match tag {
            TypeTag::Null => Value::Null,
            TypeTag::Bool => Value::Bool(self.source.read_u8()? != 0),
            TypeTag::Byte => Value::Byte(i8::from_be_bytes(self.source.read_array()?)),
            TypeTag::Short => Value::Short(i16::from_be_bytes(self.source.read_array()?)),
            TypeTag::Int => Value::Int(i32::from_be_bytes(self.source.read_array()?)),
            TypeTag::Long => Value::Long(i64::from_be_bytes(self.source.read_array()?)),
            TypeTag::Float => Value::Float(f32::from_be_bytes(self.source.read_array()?)),
            TypeTag::Double => Value::Double(f64::from_be_bytes(self.source.read_array()?)),
            TypeTag::UtfString => Value::UtfString(self.string("utf_string")?),
            TypeTag::BoolArray => {
                let count = self.count()?;
                let raw = self.source.read_vec(count)?;
                Value::BoolArray(raw.into_iter().map(|b| b != 0).collect())
            }
            TypeTag::ByteArray => {
                let len = u32::from_be_bytes(self.source.read_array()?) as usize;
                Value::ByteArray(self.source.read_vec(len)?)
            }
            TypeTag::ShortArray => Value::ShortArray(self.numbers(i16::from_be_bytes)?),
            TypeTag::IntArray => Value::IntArray(self.numbers(i32::from_be_bytes)?),
            TypeTag::LongArray => Value::LongArray(self.numbers(i64::from_be_bytes)?),
            TypeTag::FloatArray => Value::FloatArray(self.numbers(f32::from_be_bytes)?),
            TypeTag::DoubleArray => Value::DoubleArray(self.numbers(f64::from_be_bytes)?),
            TypeTag::UtfStringArray => {
                let count = self.count()?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.string("utf_string_array element")?);
                }
                Value::UtfStringArray(items)
            }
            TypeTag::SfsArray => Value::Array(self.array_body()?),
            TypeTag::SfsObject => Value::Object(self.object_body()?),
        };
        Ok(value)
    }

    fn object_body(&mut self) -> Result<SfsObject, ProtocolError> {
        self.enter()?;
        let count = self.count()?;
        let mut obj = SfsObject::with_capacity(count);
        for _ in 0..count {
            let key = self.string("key")?;
            let Some(tag) = self.tag()? else { break };
            let value = self.value(tag)?;
            obj.put(key, value);
            if self.halted {
                break;
            }
        }
        self.depth -= 1;
        Ok(obj)
    }

    fn array_body(&mut self) -> Result<SfsArray, ProtocolError> {
        self.enter()?;
        let count = self.count()?;
        let mut arr = SfsArray::with_capacity(count);
        for _ in 0..count {
            let Some(tag) = self.tag()? else { break };
            arr.add(self.value(tag)?);
            if self.halted {
                break;
            }
        }
        self.depth -= 1;
        Ok(arr)
    }

    fn enter(&mut self) -> Result<(), ProtocolError> {
        if self.depth >= self.options.max_depth {
            return Err(ProtocolError::DepthLimitExceeded(self.options.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    fn count(&mut self) -> Result<usize, ProtocolError> {
        Ok(usize::from(u16::from_be_bytes(self.source.read_array()?)))
    }

    fn string(&mut self, what: &'static str) -> Result<String, ProtocolError> {
        let len = self.count()?;
        let raw = self.source.read_vec(len)?;
        String::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8(what))
    }

    /// A u16 count followed by that many fixed-width big-endian numbers.
    fn numbers<T, const N: usize>(
        &mut self,
        from_be: fn([u8; N]) -> T,
    ) -> Result<Vec<T>, ProtocolError> {
        let count = self.count()?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(from_be(self.source.read_array()?));
        }
        Ok(items)
    }
}
