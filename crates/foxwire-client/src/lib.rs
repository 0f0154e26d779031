//! SFS2X session client for foxwire.
//!
//! This crate drives a session over any [`Connection`]:
//!
//! 1. **Handshake** — `{api, cl, bin}` out, the server's token back
//!    ([`SfsClient::handshake_over`], [`SfsClient::connect`])
//! 2. **Login** — zone, user name, password ([`SfsClient::login`])
//! 3. **Extension traffic** — named commands with object payloads,
//!    replies correlated by command name ([`SfsClient::request`],
//!    [`SfsClient::wait_for_any`], ...)
//!
//! # How it fits in the stack
//!
//! ```text
//! Caller                ← SfsClient: request / wait / login
//!     ↕
//! Dispatcher task       ← owns the waiters, routes each frame to one
//!     ↕
//! Reader task           ← only reader of the socket; liveness heuristic
//!     ↕
//! Protocol + Transport  ← frames, codec, Connection
//! ```
//!
//! [`Connection`]: foxwire_transport::Connection

mod client;
mod config;
mod dispatcher;
mod error;
mod reader;
mod session;

pub use client::SfsClient;
pub use config::{
    ClientConfig, DEFAULT_LIVENESS_THRESHOLD, DEFAULT_MAX_CHUNKS, DEFAULT_READ_CHUNK_SIZE,
};
pub use dispatcher::{
    DispatcherHandle, InboundMessage, Interest, PendingResponse, ResponseStream, WaitId,
};
pub use error::ClientError;
pub use reader::{FrameReader, Liveness, ReadEvent};
pub use session::{HandshakeInfo, SessionState};
