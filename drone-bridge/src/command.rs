//! Inbound commands from the ground controller.
//!
//! Every datagram goes through one decode step: bytes → UTF-8 text → JSON →
//! [`InboundCommand`].  Any failure along the way yields
//! [`InboundCommand::Unknown`]; decoding never fails.
//!
//! `cmd` may be a string or an integer:
//!
//! | string       | integer | extra fields          |
//! |--------------|---------|-----------------------|
//! | `connect`    | 1       |                       |
//! | `disconnect` | 2       |                       |
//! | `quit`       | 3       |                       |
//! | `param`      | 4       | `name`, `value`       |

use serde_json::Value;

/// A decoded ground command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    Connect,
    Disconnect,
    Quit,
    SetParam { name: String, value: String },
    Unknown,
}

impl InboundCommand {
    /// Normalise one datagram into a command.
    pub fn decode(datagram: &[u8]) -> Self {
        let text = match std::str::from_utf8(datagram) {
            Ok(text) => text,
            Err(e) => {
                log::debug!("[command] datagram is not UTF-8: {e}");
                return Self::Unknown;
            }
        };
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_json(&value),
            Err(e) => {
                log::debug!("[command] datagram is not JSON: {e}");
                Self::Unknown
            }
        }
    }

    /// Interpret a parsed JSON object.
    pub fn from_json(value: &Value) -> Self {
        let tag = match value.get("cmd") {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(1) => "connect",
                Some(2) => "disconnect",
                Some(3) => "quit",
                Some(4) => "param",
                _ => return Self::Unknown,
            },
            _ => return Self::Unknown,
        };

        match tag {
            "connect" => Self::Connect,
            "disconnect" => Self::Disconnect,
            "quit" => Self::Quit,
            "param" => {
                let name = value.get("name").and_then(Value::as_str);
                let setting = value.get("value").and_then(param_value);
                match (name, setting) {
                    (Some(name), Some(setting)) if !name.is_empty() => Self::SetParam {
                        name: name.to_string(),
                        value: setting,
                    },
                    _ => Self::Unknown,
                }
            }
            _ => Self::Unknown,
        }
    }
}

/// Parameters are written as text; accept strings, numbers and booleans.
fn param_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(u8::from(*b).to_string()),
        _ => None,
    }
}
