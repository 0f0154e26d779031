//! Wire protocol for foxwire.
//!
//! This crate is everything an SFS2X client needs below the socket:
//!
//! - **Values** ([`Value`], [`SfsObject`], [`SfsArray`], [`TypeTag`]) —
//!   the 19 tagged kinds the server understands.
//! - **Codec** ([`encode_object`], [`decode_object`], ...) — values to
//!   bytes and back, big-endian throughout.
//! - **Framing** ([`encode_frame`], [`FrameDecoder`]) — the `0x80`/`0x88`
//!   length-prefixed packets that carry encoded objects.
//! - **Envelope and requests** ([`Envelope`], [`Request`]) — the
//!   `{c, a, p}` message shape and the handshake, login and extension
//!   messages built on it.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Request → Envelope → SfsObject → body bytes → frame → Connection
//! ```
//!
//! # Feature Flags
//!
//! - `json` (default) — `Serialize` for values, JSON import with type
//!   inference

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod array;
mod decode;
mod encode;
pub mod envelope;
mod error;
mod frame;
#[cfg(feature = "json")]
mod json;
mod object;
mod request;
mod value;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use array::SfsArray;
pub use decode::{
    DEFAULT_MAX_DEPTH, DecodeOptions, ReadSource, SliceSource, UnknownTagPolicy, WireSource,
    decode_object, decode_object_from, decode_object_with, decode_value, decode_value_from,
};
pub use encode::{encode_array, encode_object, encode_value, write_value};
pub use envelope::Envelope;
pub use error::ProtocolError;
pub use frame::{
    DEFAULT_MAX_FRAME_LEN, FrameDecoder, LONG_FRAME_MARKER, SHORT_FRAME_LIMIT, SHORT_FRAME_MARKER,
    compile_packet, decompile_packet, encode_frame,
};
pub use object::SfsObject;
pub use request::{
    DEFAULT_API_VERSION, DEFAULT_CLIENT_TYPE, ExtensionResponse, NO_ROOM, Request,
};
pub use value::{TypeTag, Value};
