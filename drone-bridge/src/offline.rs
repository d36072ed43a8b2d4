//! A flight client with no vehicle behind it.
//!
//! Every link open is refused, so the session reports `ConnectError` on each
//! `connect`.  The relay's JSON channel (status echoes, `unknown`, `quit`)
//! can be exercised end to end without hardware.

use crate::client::{
    ClientError, ClientSignals, FlightClient, LogConfig, LogDataCallback, LogErrorCallback,
};

#[derive(Debug, Default)]
pub struct OfflineClient {
    signals: ClientSignals,
}

impl OfflineClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlightClient for OfflineClient {
    fn open_link(&self, uri: &str) -> Result<(), ClientError> {
        log::info!("[offline] refusing link to {uri}");
        Err(ClientError::Link(format!("{uri}: no vehicle link in offline mode")))
    }

    fn close_link(&self) {
        self.signals.disconnected.call(&String::new());
    }

    fn add_log_config(
        &self,
        config: LogConfig,
        _on_data: LogDataCallback,
        _on_error: LogErrorCallback,
    ) -> Result<(), ClientError> {
        let first = config
            .variables
            .first()
            .map(|(name, _)| name.clone())
            .unwrap_or(config.name);
        Err(ClientError::UnknownVariable(first))
    }

    fn set_param(&self, name: &str, _value: &str) -> Result<(), ClientError> {
        Err(ClientError::Param {
            name: name.to_string(),
            reason: "no parameter table in offline mode".to_string(),
        })
    }

    fn signals(&self) -> &ClientSignals {
        &self.signals
    }
}
