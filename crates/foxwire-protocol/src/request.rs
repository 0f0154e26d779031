//! Outbound requests and inbound extension responses.

use bytes::Bytes;

use crate::envelope::{
    ACTION_EXTENSION, ACTION_HANDSHAKE, ACTION_LOGIN, EXTENSION_CONTROLLER, SYSTEM_CONTROLLER,
};
use crate::{Envelope, ProtocolError, SfsObject, Value};

pub const DEFAULT_API_VERSION: &str = "1.0.3";
pub const DEFAULT_CLIENT_TYPE: &str = "UnityPlayer::";

/// Room id sent when an extension request targets no room.
pub const NO_ROOM: i32 = -1;

/// A request the client can send.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// First message on a new connection.
    Handshake {
        api_version: String,
        client_type: String,
        binary: bool,
    },

    /// Zone login.
    Login {
        zone: String,
        username: String,
        password: String,
        params: SfsObject,
    },

    /// A zone extension call.
    Extension {
        command: String,
        room_id: Option<i32>,
        params: SfsObject,
    },
}

impl Request {
    /// A handshake with the default api version and client type.
    pub fn handshake() -> Self {
        Request::Handshake {
            api_version: DEFAULT_API_VERSION.to_string(),
            client_type: DEFAULT_CLIENT_TYPE.to_string(),
            binary: true,
        }
    }

    pub fn login(
        zone: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        params: SfsObject,
    ) -> Self {
        Request::Login {
            zone: zone.into(),
            username: username.into(),
            password: password.into(),
            params,
        }
    }

    pub fn extension(command: impl Into<String>, params: SfsObject) -> Self {
        Request::Extension {
            command: command.into(),
            room_id: None,
            params,
        }
    }

    pub fn into_envelope(self) -> Envelope {
        match self {
            Request::Handshake {
                api_version,
                client_type,
                binary,
            } => {
                let mut p = SfsObject::with_capacity(3);
                p.put_utf_string("api", api_version)
                    .put_utf_string("cl", client_type)
                    .put_bool("bin", binary);
                Envelope::new(SYSTEM_CONTROLLER, ACTION_HANDSHAKE, p)
            }
            Request::Login {
                zone,
                username,
                password,
                params,
            } => {
                let mut p = SfsObject::with_capacity(4);
                p.put_utf_string("zn", zone)
                    .put_utf_string("un", username)
                    .put_utf_string("pw", password)
                    .put_sfs_object("p", params);
                Envelope::new(SYSTEM_CONTROLLER, ACTION_LOGIN, p)
            }
            Request::Extension {
                command,
                room_id,
                params,
            } => {
                let mut p = SfsObject::with_capacity(3);
                p.put_utf_string("c", command)
                    .put_int("r", room_id.unwrap_or(NO_ROOM))
                    .put_sfs_object("p", params);
                Envelope::new(EXTENSION_CONTROLLER, ACTION_EXTENSION, p)
            }
        }
    }

    /// Encodes and frames the request.
    pub fn compile(self) -> Result<Bytes, ProtocolError> {
        self.into_envelope().compile()
    }
}

/// The useful part of an extension reply: `p.c` and `p.p`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionResponse {
    pub command: String,
    pub params: SfsObject,
    /// The frame body this response was decoded from.
    pub raw: Bytes,
}

impl ExtensionResponse {
    /// Extracts the command and params. A reply without `p.p` has empty
    /// params.
    pub fn from_envelope(envelope: Envelope, raw: Bytes) -> Result<Self, ProtocolError> {
        let mut payload = envelope.payload;
        let command = payload.get_utf_string("c")?.to_string();
        let params = match payload.remove("p") {
            Some(Value::Object(p)) => p,
            Some(other) => {
                return Err(ProtocolError::TypeMismatch {
                    key: "p.p".to_string(),
                    expected: "sfs_object",
                    found: other.type_name(),
                });
            }
            None => SfsObject::new(),
        };
        Ok(Self {
            command,
            params,
            raw,
        })
    }
}
