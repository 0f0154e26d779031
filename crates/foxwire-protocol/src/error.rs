//! Error types for the protocol layer.
//!
//! Everything that can go wrong while building, encoding, decoding or
//! framing SFS2X values ends up here. Decode problems are always
//! reported; the codec never substitutes a default value for bytes it
//! could not understand.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame started with a byte that is neither `0x80` nor `0x88`.
    #[error("malformed frame: unexpected marker byte {0:#04x}")]
    MalformedFrame(u8),

    /// The input ended before a declared length was satisfied.
    #[error("truncated input: needed {needed} more bytes")]
    TruncatedInput { needed: usize },

    /// A type tag outside the known table (0..=18).
    #[error("unknown type tag {0}")]
    UnknownTypeTag(u8),

    /// A field or element was read as the wrong variant.
    #[error("type mismatch for {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// An object has no field with this key.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// An array index past the end.
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A length does not fit the header field that must carry it.
    #[error("{what} length {len} exceeds wire limit {max}")]
    LengthOverflow {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// A key or string payload is not valid UTF-8.
    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(&'static str),

    /// Containers nested deeper than the decoder allows.
    #[error("nesting depth exceeds limit of {0}")]
    DepthLimitExceeded(usize),

    /// Bytes left over after the root object was decoded.
    #[error("{0} trailing bytes after root object")]
    TrailingBytes(usize),

    /// A frame declared a body larger than the configured maximum.
    #[error("frame body of {len} bytes exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// Structurally valid bytes that violate protocol rules, e.g. a
    /// frame body whose root is not an object.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A streaming source failed for a reason other than end of input.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// A native value that has no wire representation.
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    /// JSON text could not be parsed.
    #[cfg(feature = "json")]
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
