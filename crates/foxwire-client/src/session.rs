//! Session lifecycle and handshake results.

use std::fmt;

use foxwire_protocol::{SfsObject, Value};
use serde::{Deserialize, Serialize};

/// Where a session is in its lifecycle.
///
/// ```text
/// Connected → Handshaken → Authenticated
///      └───────────┴─────────────┴──→ Closed
/// ```
///
/// `Connected` is only observable while the handshake is in flight;
/// an [`SfsClient`](crate::SfsClient) is returned already `Handshaken`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Connected,
    Handshaken,
    Authenticated,
    Closed,
}

impl SessionState {
    pub fn is_open(self) -> bool {
        self != SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connected => "connected",
            SessionState::Handshaken => "handshaken",
            SessionState::Authenticated => "authenticated",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What the server said in its handshake reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeInfo {
    /// Session token (`tk`).
    pub session_token: Option<String>,

    /// Size above which the server compresses messages (`ct`).
    pub compression_threshold: Option<i64>,

    /// Largest message the server accepts (`ms`).
    pub max_message_size: Option<i64>,
}

impl HandshakeInfo {
    pub(crate) fn from_payload(payload: &SfsObject) -> Self {
        Self {
            session_token: payload.get("tk").and_then(Value::as_str).map(str::to_string),
            compression_threshold: payload.get("ct").and_then(Value::as_integer),
            max_message_size: payload.get("ms").and_then(Value::as_integer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_info_reads_optional_fields() {
        let mut p = SfsObject::new();
        p.put_utf_string("tk", "abc123").put_int("ct", 1024);
        let info = HandshakeInfo::from_payload(&p);
        assert_eq!(info.session_token.as_deref(), Some("abc123"));
        assert_eq!(info.compression_threshold, Some(1024));
        assert_eq!(info.max_message_size, None);
    }

    #[test]
    fn test_only_closed_is_not_open() {
        assert!(SessionState::Handshaken.is_open());
        assert!(!SessionState::Closed.is_open());
        assert_eq!(SessionState::Authenticated.to_string(), "authenticated");
    }
}
