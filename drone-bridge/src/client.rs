//! Capability surface of the flight-control client.
//!
//! The bridge never talks to the vehicle directly.  It drives a
//! [`FlightClient`] (open / close the link, register log configs, write
//! parameters) and listens to the lifecycle signals the client raises on its
//! own threads.

use std::collections::BTreeMap;

use crtp_udp::Caller;
use thiserror::Error;

/// One sample of a log config: variable name → value.
pub type LogRecord = BTreeMap<String, f64>;

/// Invoked with `(timestamp_ms, record)` for every sample of a log config.
pub type LogDataCallback = Box<dyn Fn(u64, &LogRecord) + Send + Sync>;

/// Invoked with `(config_name, message)` when a running log config fails.
pub type LogErrorCallback = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Failures reported by a [`FlightClient`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("link error: {0}")]
    Link(String),
    #[error("log config {0} already registered")]
    Duplicate(String),
    #[error("log variable {0} not found in firmware")]
    UnknownVariable(String),
    #[error("cannot set parameter {name}: {reason}")]
    Param { name: String, reason: String },
}

/// A named group of log variables sampled at a fixed period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub name: String,
    pub period_ms: u32,
    /// `(variable, firmware type)` pairs, e.g. `("pm.vbat", "float")`.
    pub variables: Vec<(String, String)>,
}

impl LogConfig {
    pub fn new(name: &str, period_ms: u32) -> Self {
        Self {
            name: name.to_string(),
            period_ms,
            variables: Vec::new(),
        }
    }

    pub fn add_variable(&mut self, name: &str, ty: &str) {
        self.variables.push((name.to_string(), ty.to_string()));
    }
}

/// Lifecycle signals raised by the client.
///
/// Each event kind has its own ordered subscriber list.  The `String`
/// payload is the link URI; connection-lost and connection-failed also carry
/// a message.
#[derive(Debug, Default)]
pub struct ClientSignals {
    pub connection_requested: Caller<String>,
    /// Link is up; the parameter table is not yet downloaded.
    pub connected: Caller<String>,
    /// Link is up and setup is complete; log configs may be registered.
    pub fully_connected: Caller<String>,
    pub disconnected: Caller<String>,
    pub connection_lost: Caller<(String, String)>,
    pub connection_failed: Caller<(String, String)>,
    /// x, y, z, roll, pitch, yaw from the client's pose logger.
    pub pose_estimate: Caller<[f64; 6]>,
}

/// What the bridge needs from a flight-control client.
///
/// Implementations must return promptly from every method.  Lifecycle
/// signals may fire synchronously from inside `open_link` / `close_link` or
/// later from the client's own threads.
pub trait FlightClient: Send + Sync {
    fn open_link(&self, uri: &str) -> Result<(), ClientError>;

    fn close_link(&self);

    fn add_log_config(
        &self,
        config: LogConfig,
        on_data: LogDataCallback,
        on_error: LogErrorCallback,
    ) -> Result<(), ClientError>;

    fn set_param(&self, name: &str, value: &str) -> Result<(), ClientError>;

    fn signals(&self) -> &ClientSignals;
}
