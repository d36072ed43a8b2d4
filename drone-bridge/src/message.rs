//! Outbound JSON envelope sent to the ground controller.
//!
//! ```text
//! { "cmd": "connect", "data": [2], "status": 1 }
//! ```
//!
//! `data` is always a list of numbers.  Integral values are written without
//! a fractional part so state codes read as `2`, not `2.0`.

use serde::{Serialize, Serializer};

use crate::state::{ConnectReason, SessionState};

/// Tag of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cmd {
    /// Session status: `data = [state]`, `status = reason`.
    Connect,
    /// Pose: x, y, z, roll, pitch, yaw.
    Estimate,
    /// m1..m4, thrust, can-fly.
    Motor,
    /// Battery voltage and charge state.
    Pm,
    Barometer,
    Magnetometer,
    Acc,
    /// Acknowledges a `quit` command.
    Quit,
    /// Echo for a command that could not be understood.
    Unknown,
    /// Failed parameter write, tagged with the parameter name.
    Param(String),
}

impl Cmd {
    pub fn as_str(&self) -> &str {
        match self {
            Cmd::Connect => "connect",
            Cmd::Estimate => "estimate",
            Cmd::Motor => "motor",
            Cmd::Pm => "pm",
            Cmd::Barometer => "barometer",
            Cmd::Magnetometer => "magnetometer",
            Cmd::Acc => "acc",
            Cmd::Quit => "quit",
            Cmd::Unknown => "unknown",
            Cmd::Param(name) => name,
        }
    }
}

impl Serialize for Cmd {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One message for the outbound worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub cmd: Cmd,
    #[serde(serialize_with = "serialize_numbers")]
    pub data: Vec<f64>,
    pub status: i32,
}

impl OutboundMessage {
    pub fn new(cmd: Cmd, data: Vec<f64>, status: i32) -> Self {
        Self { cmd, data, status }
    }

    /// Session status report.
    pub fn status(state: SessionState, reason: ConnectReason) -> Self {
        Self::new(Cmd::Connect, vec![f64::from(state.code())], reason.code())
    }

    /// Heartbeat sent when nothing fresh arrived: zero pose, `status = 1`.
    pub fn degraded_estimate() -> Self {
        Self::new(Cmd::Estimate, vec![0.0; 6], 1)
    }

    pub fn quit_ack() -> Self {
        Self::new(Cmd::Quit, vec![0.0], 0)
    }

    pub fn unknown() -> Self {
        Self::new(Cmd::Unknown, vec![0.0], 1)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// `true` for session status reports.
    pub fn is_status(&self) -> bool {
        self.cmd == Cmd::Connect
    }
}

/// Largest magnitude at which every integer is exactly representable in f64.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn serialize_numbers<S: Serializer>(data: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeSeq;

    let mut seq = serializer.serialize_seq(Some(data.len()))?;
    for &value in data {
        if value.fract() == 0.0 && value.abs() < MAX_EXACT_INT {
            seq.serialize_element(&(value as i64))?;
        } else {
            seq.serialize_element(&value)?;
        }
    }
    seq.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn as_value(msg: &OutboundMessage) -> Value {
        serde_json::from_slice(&msg.to_json().unwrap()).unwrap()
    }

    #[test]
    fn status_serialises_integral_codes() {
        let msg = OutboundMessage::status(SessionState::Connected, ConnectReason::Success);
        assert_eq!(
            msg.to_json().unwrap(),
            br#"{"cmd":"connect","data":[2],"status":1}"#.to_vec()
        );
    }

    #[test]
    fn fractional_values_keep_precision() {
        let msg = OutboundMessage::new(Cmd::Pm, vec![3.7, 1.0], 0);
        assert_eq!(as_value(&msg), json!({"cmd": "pm", "data": [3.7, 1], "status": 0}));
    }

    #[test]
    fn param_failure_uses_parameter_name() {
        let msg = OutboundMessage::new(Cmd::Param("flightmode.althold".into()), vec![1.0], 1);
        assert_eq!(as_value(&msg)["cmd"], "flightmode.althold");
    }

    #[test]
    fn fixed_messages() {
        assert_eq!(
            as_value(&OutboundMessage::quit_ack()),
            json!({"cmd": "quit", "data": [0], "status": 0})
        );
        assert_eq!(
            as_value(&OutboundMessage::unknown()),
            json!({"cmd": "unknown", "data": [0], "status": 1})
        );
        assert_eq!(
            as_value(&OutboundMessage::degraded_estimate()),
            json!({"cmd": "estimate", "data": [0, 0, 0, 0, 0, 0], "status": 1})
        );
    }

    #[test]
    fn negative_integral_values() {
        let msg = OutboundMessage::new(Cmd::Acc, vec![-1.0, 0.5, -0.0], 0);
        assert_eq!(as_value(&msg)["data"], json!([-1, 0.5, 0]));
    }
}
