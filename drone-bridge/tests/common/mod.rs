//! Shared test double for the flight-client trait.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use drone_bridge::client::{LogDataCallback, LogErrorCallback};
use drone_bridge::{
    BridgeConfig, ClientError, ClientSignals, FlightClient, LogConfig, LogRecord, OutboundMessage,
    OutboundQueue, Session,
};

pub const URI: &str = "udp://127.0.0.1";

/// Records every call and lets the test raise lifecycle signals by hand.
#[derive(Default)]
pub struct MockClient {
    signals: ClientSignals,
    opened: Mutex<Vec<String>>,
    closes: Mutex<usize>,
    log_configs: Mutex<Vec<String>>,
    params: Mutex<Vec<(String, String)>>,
    log_callbacks: Mutex<Vec<(String, LogDataCallback)>>,
    failing_groups: Mutex<Vec<String>>,
    fail_open: AtomicBool,
    fail_params: AtomicBool,
    quiet_close: AtomicBool,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn fail_params(&self, fail: bool) {
        self.fail_params.store(fail, Ordering::SeqCst);
    }

    /// Stop `close_link` from raising `disconnected`.
    pub fn quiet_close(&self, quiet: bool) {
        self.quiet_close.store(quiet, Ordering::SeqCst);
    }

    /// Make `add_log_config` fail for the group called `name`.
    pub fn fail_group(&self, name: &str) {
        self.failing_groups.lock().unwrap().push(name.to_string());
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        *self.closes.lock().unwrap()
    }

    /// Names of every log config the session tried to register, in order.
    pub fn log_configs(&self) -> Vec<String> {
        self.log_configs.lock().unwrap().clone()
    }

    pub fn params(&self) -> Vec<(String, String)> {
        self.params.lock().unwrap().clone()
    }

    /// Deliver a sample to every data callback registered under `group`.
    pub fn emit(&self, group: &str, record: &LogRecord) -> usize {
        let callbacks = self.log_callbacks.lock().unwrap();
        let mut delivered = 0;
        for (name, callback) in callbacks.iter() {
            if name == group {
                callback(0, record);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn raise_connection_requested(&self) {
        self.signals.connection_requested.call(&URI.to_string());
    }

    pub fn raise_connected(&self) {
        self.signals.connected.call(&URI.to_string());
    }

    pub fn raise_fully_connected(&self) {
        self.signals.fully_connected.call(&URI.to_string());
    }

    pub fn raise_connection_lost(&self, msg: &str) {
        self.signals
            .connection_lost
            .call(&(URI.to_string(), msg.to_string()));
    }

    pub fn raise_connection_failed(&self, msg: &str) {
        self.signals
            .connection_failed
            .call(&(URI.to_string(), msg.to_string()));
    }

    pub fn raise_disconnected(&self) {
        self.signals.disconnected.call(&URI.to_string());
    }

    pub fn raise_pose(&self, pose: [f64; 6]) {
        self.signals.pose_estimate.call(&pose);
    }

    /// The signal sequence a real client raises while a link comes up.
    pub fn raise_link_up(&self) {
        self.raise_connection_requested();
        self.raise_connected();
        self.raise_fully_connected();
    }
}

impl FlightClient for MockClient {
    fn open_link(&self, uri: &str) -> Result<(), ClientError> {
        self.opened.lock().unwrap().push(uri.to_string());
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(ClientError::Link("no route to vehicle".into()));
        }
        Ok(())
    }

    fn close_link(&self) {
        *self.closes.lock().unwrap() += 1;
        self.log_callbacks.lock().unwrap().clear();
        if !self.quiet_close.load(Ordering::SeqCst) {
            self.raise_disconnected();
        }
    }

    fn add_log_config(
        &self,
        config: LogConfig,
        on_data: LogDataCallback,
        _on_error: LogErrorCallback,
    ) -> Result<(), ClientError> {
        self.log_configs.lock().unwrap().push(config.name.clone());
        if self.failing_groups.lock().unwrap().contains(&config.name) {
            return Err(ClientError::UnknownVariable(config.name));
        }
        self.log_callbacks
            .lock()
            .unwrap()
            .push((config.name, on_data));
        Ok(())
    }

    fn set_param(&self, name: &str, value: &str) -> Result<(), ClientError> {
        self.params
            .lock()
            .unwrap()
            .push((name.to_string(), value.to_string()));
        if self.fail_params.load(Ordering::SeqCst) {
            return Err(ClientError::Param {
                name: name.to_string(),
                reason: "read-only".into(),
            });
        }
        Ok(())
    }

    fn signals(&self) -> &ClientSignals {
        &self.signals
    }
}

pub fn config() -> BridgeConfig {
    BridgeConfig {
        link_uri: URI.to_string(),
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        ..BridgeConfig::default()
    }
}

pub fn session_with(mock: &Arc<MockClient>, config: &BridgeConfig) -> Arc<Session> {
    let client: Arc<dyn FlightClient> = Arc::clone(mock) as Arc<dyn FlightClient>;
    Session::new(client, OutboundQueue::with_capacity(config.queue_capacity), config)
}

/// Status messages as `(state, reason)` pairs; other messages are skipped.
pub fn statuses(messages: &[OutboundMessage]) -> Vec<(f64, i32)> {
    messages
        .iter()
        .filter(|m| m.is_status())
        .map(|m| (m.data[0], m.status))
        .collect()
}

pub fn record(pairs: &[(&str, f64)]) -> LogRecord {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}
