//! The message envelope every frame body carries.
//!
//! ```text
//! { c: byte   controller id
//!   a: short  action id
//!   p: object action payload }
//! ```

use bytes::Bytes;

use crate::{ProtocolError, SfsObject, Value, compile_packet};

/// Controller for system actions (handshake, login, ...).
pub const SYSTEM_CONTROLLER: u8 = 0;

/// Controller for zone extension traffic.
pub const EXTENSION_CONTROLLER: u8 = 1;

pub const ACTION_HANDSHAKE: i16 = 0;
pub const ACTION_LOGIN: i16 = 1;
pub const ACTION_EXTENSION: i16 = 12;

/// A decoded or to-be-encoded `{c, a, p}` message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub controller: u8,
    pub action: i16,
    pub payload: SfsObject,
}

impl Envelope {
    pub fn new(controller: u8, action: i16, payload: SfsObject) -> Self {
        Self {
            controller,
            action,
            payload,
        }
    }

    pub fn is_system(&self) -> bool {
        self.controller == SYSTEM_CONTROLLER
    }

    /// The extension command name, `p.c`, if the payload carries one.
    pub fn command(&self) -> Option<&str> {
        self.payload.get("c").and_then(Value::as_str)
    }

    pub fn into_object(self) -> SfsObject {
        let mut obj = SfsObject::with_capacity(3);
        obj.put_byte("c", self.controller as i8)
            .put_short("a", self.action)
            .put_sfs_object("p", self.payload);
        obj
    }

    /// Reads an envelope from a decoded frame body.
    ///
    /// Servers are not consistent about integer widths, so `c` and `a`
    /// are accepted as any integer kind that fits.
    pub fn from_object(mut obj: SfsObject) -> Result<Self, ProtocolError> {
        let controller = narrow::<u8>(&obj, "c")?;
        let action = narrow::<i16>(&obj, "a")?;
        let payload = match obj.remove("p") {
            Some(Value::Object(p)) => p,
            Some(other) => {
                return Err(ProtocolError::TypeMismatch {
                    key: "p".to_string(),
                    expected: "sfs_object",
                    found: other.type_name(),
                });
            }
            None => return Err(ProtocolError::KeyNotFound("p".to_string())),
        };
        Ok(Self {
            controller,
            action,
            payload,
        })
    }

    /// Encodes and frames the envelope.
    pub fn compile(self) -> Result<Bytes, ProtocolError> {
        compile_packet(&self.into_object())
    }
}

fn narrow<T: TryFrom<i64>>(obj: &SfsObject, key: &str) -> Result<T, ProtocolError> {
    let wide = obj.get_integer(key)?;
    // Controller ids are sent as signed bytes; 0x80.. comes back negative.
    let wide = if key == "c" && wide < 0 { wide & 0xff } else { wide };
    T::try_from(wide).map_err(|_| {
        ProtocolError::InvalidMessage(format!("envelope field {key} out of range: {wide}"))
    })
}
