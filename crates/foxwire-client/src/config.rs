//! Client configuration.

use std::time::Duration;

use foxwire_protocol::{
    DEFAULT_API_VERSION, DEFAULT_CLIENT_TYPE, DEFAULT_MAX_DEPTH, DEFAULT_MAX_FRAME_LEN,
    DecodeOptions, UnknownTagPolicy,
};
use serde::{Deserialize, Serialize};

/// Consecutive empty reads after which the peer is considered gone.
pub const DEFAULT_LIVENESS_THRESHOLD: u32 = 10;

/// Upper bound on a single `recv`.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 16 * 1024;

/// Largest `numChunks` a chunked reply may announce.
pub const DEFAULT_MAX_CHUNKS: usize = 1024;

/// Configuration for an [`SfsClient`](crate::SfsClient).
///
/// Every field has a default, so a config file only needs the fields it
/// changes:
///
/// ```rust
/// use std::time::Duration;
/// use foxwire_client::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_request_timeout(Duration::from_secs(5))
///     .with_liveness_threshold(20);
/// assert_eq!(config.api_version, "1.0.3");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Sent as `api` in the handshake.
    pub api_version: String,

    /// Sent as `cl` in the handshake.
    pub client_type: String,

    /// Timeout for `login`, `request` and `request_chunked`. `None`
    /// waits indefinitely.
    pub request_timeout: Option<Duration>,

    /// Consecutive empty reads before the connection is closed.
    pub liveness_threshold: u32,

    /// Largest single read from the connection.
    pub read_chunk_size: usize,

    /// Largest accepted inbound frame body.
    pub max_frame_len: usize,

    /// Nesting cap for inbound objects.
    pub max_depth: usize,

    /// What the decoder does with unknown type tags.
    pub unknown_tags: UnknownTagPolicy,

    /// Capacity of the reader → dispatcher and command channels.
    pub event_buffer: usize,

    /// Cap on the part count announced by a chunked reply.
    pub max_chunks: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            client_type: DEFAULT_CLIENT_TYPE.to_string(),
            request_timeout: None,
            liveness_threshold: DEFAULT_LIVENESS_THRESHOLD,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
            unknown_tags: UnknownTagPolicy::Reject,
            event_buffer: 64,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }
}

impl ClientConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_liveness_threshold(mut self, threshold: u32) -> Self {
        self.liveness_threshold = threshold;
        self
    }

    pub fn with_client_type(mut self, client_type: impl Into<String>) -> Self {
        self.client_type = client_type.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_unknown_tags(mut self, policy: UnknownTagPolicy) -> Self {
        self.unknown_tags = policy;
        self
    }

    pub fn with_max_frame_len(mut self, max: usize) -> Self {
        self.max_frame_len = max;
        self
    }

    pub fn with_max_chunks(mut self, max: usize) -> Self {
        self.max_chunks = max;
        self
    }

    pub(crate) fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_depth: self.max_depth,
            unknown_tags: self.unknown_tags,
        }
    }
}
