//! Telemetry relay: log groups → outbound messages.
//!
//! Once the session is connected the relay registers named log groups with
//! the flight client.  Each sample is mapped to an [`OutboundMessage`] and
//! queued, but only while the session reports `Connected`.  A registration
//! failure affects only its own group.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::client::{FlightClient, LogConfig, LogRecord};
use crate::message::{Cmd, OutboundMessage};
use crate::queue::OutboundQueue;
use crate::session::Session;
use crate::state::SessionState;

/// Log groups the relay knows how to forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TelemetryGroup {
    Battery,
    Motors,
    Barometer,
    Magnetometer,
    AccSensor,
}

/// Registered as soon as the link is up.
pub const BASELINE_GROUPS: &[TelemetryGroup] = &[TelemetryGroup::Battery];

/// Registered once the client is fully connected.
pub const FULL_GROUPS: &[TelemetryGroup] = &[
    TelemetryGroup::Motors,
    TelemetryGroup::Barometer,
    TelemetryGroup::Magnetometer,
    TelemetryGroup::AccSensor,
];

pub const LOG_VBAT: &str = "pm.vbat";
pub const LOG_BATTERY_STATE: &str = "pm.state";
pub const LOG_THRUST: &str = "stabilizer.thrust";
pub const LOG_MOTOR_1: &str = "motor.m1";
pub const LOG_MOTOR_2: &str = "motor.m2";
pub const LOG_MOTOR_3: &str = "motor.m3";
pub const LOG_MOTOR_4: &str = "motor.m4";
pub const LOG_CAN_FLY: &str = "sys.canfly";

impl TelemetryGroup {
    pub fn name(self) -> &'static str {
        match self {
            TelemetryGroup::Battery => "Battery",
            TelemetryGroup::Motors => "Motors",
            TelemetryGroup::Barometer => "Barometer",
            TelemetryGroup::Magnetometer => "Magnetometer",
            TelemetryGroup::AccSensor => "AccSensor",
        }
    }

    pub fn period_ms(self) -> u32 {
        match self {
            TelemetryGroup::Battery => 1000,
            _ => 100,
        }
    }

    /// `(variable, firmware type)` in the order they are forwarded.
    pub fn variables(self) -> &'static [(&'static str, &'static str)] {
        match self {
            TelemetryGroup::Battery => &[(LOG_VBAT, "float"), (LOG_BATTERY_STATE, "int8_t")],
            TelemetryGroup::Motors => &[
                (LOG_MOTOR_1, "uint32_t"),
                (LOG_MOTOR_2, "uint32_t"),
                (LOG_MOTOR_3, "uint32_t"),
                (LOG_MOTOR_4, "uint32_t"),
                (LOG_THRUST, "uint16_t"),
                (LOG_CAN_FLY, "uint8_t"),
            ],
            TelemetryGroup::Barometer => &[
                ("baro.asl", "float"),
                ("baro.pressure", "float"),
                ("baro.temp", "float"),
            ],
            TelemetryGroup::Magnetometer => {
                &[("mag.x", "float"), ("mag.y", "float"), ("mag.z", "float")]
            }
            TelemetryGroup::AccSensor => {
                &[("acc.x", "float"), ("acc.y", "float"), ("acc.z", "float")]
            }
        }
    }

    pub fn cmd(self) -> Cmd {
        match self {
            TelemetryGroup::Battery => Cmd::Pm,
            TelemetryGroup::Motors => Cmd::Motor,
            TelemetryGroup::Barometer => Cmd::Barometer,
            TelemetryGroup::Magnetometer => Cmd::Magnetometer,
            TelemetryGroup::AccSensor => Cmd::Acc,
        }
    }

    pub fn log_config(self) -> LogConfig {
        let mut config = LogConfig::new(self.name(), self.period_ms());
        for (var, ty) in self.variables() {
            config.add_variable(var, ty);
        }
        config
    }

    /// Map one sample to its outbound message.
    ///
    /// Returns the name of the first missing variable on failure.
    pub fn to_message(self, record: &LogRecord) -> Result<OutboundMessage, &'static str> {
        let data = self
            .variables()
            .iter()
            .map(|(var, _)| record.get(*var).copied().ok_or(*var))
            .collect::<Result<Vec<f64>, _>>()?;
        Ok(OutboundMessage::new(self.cmd(), data, 0))
    }
}

/// Charge state reported in `pm.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryState {
    Battery,
    Charging,
    Charged,
    LowPower,
}

impl BatteryState {
    pub fn from_code(code: f64) -> Option<Self> {
        match code as i64 {
            0 => Some(Self::Battery),
            1 => Some(Self::Charging),
            2 => Some(Self::Charged),
            3 => Some(Self::LowPower),
            _ => None,
        }
    }
}

/// Pose sample → `estimate` message.
pub fn pose_message(pose: &[f64; 6]) -> OutboundMessage {
    OutboundMessage::new(Cmd::Estimate, pose.to_vec(), 0)
}

/// Registers log groups and forwards their samples.
pub struct TelemetryRelay {
    client: Arc<dyn FlightClient>,
    queue: OutboundQueue,
    session: Weak<Session>,
    subscribed: Mutex<BTreeSet<TelemetryGroup>>,
}

impl TelemetryRelay {
    pub fn new(client: Arc<dyn FlightClient>, queue: OutboundQueue, session: Weak<Session>) -> Self {
        Self {
            client,
            queue,
            session,
            subscribed: Mutex::new(BTreeSet::new()),
        }
    }

    /// Register every group in `groups` not already registered.
    ///
    /// Returns how many groups were newly registered.
    pub fn subscribe(&self, groups: &[TelemetryGroup]) -> usize {
        let mut registered = 0;
        for &group in groups {
            if !self.lock().insert(group) {
                continue;
            }

            let session = self.session.clone();
            let queue = self.queue.clone();
            let on_data = Box::new(move |_timestamp: u64, record: &LogRecord| {
                forward_sample(&session, &queue, group, record);
            });
            let on_error = Box::new(|config: &str, msg: &str| {
                log::error!("[telemetry] error when starting log config [{config}]: {msg}");
            });

            match self.client.add_log_config(group.log_config(), on_data, on_error) {
                Ok(()) => {
                    log::debug!("[telemetry] registered {}", group.name());
                    registered += 1;
                }
                Err(e) => {
                    log::warn!("[telemetry] could not register {}: {e}", group.name());
                    self.lock().remove(&group);
                }
            }
        }
        registered
    }

    /// Forget registrations; called when the link goes down.
    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn subscribed(&self) -> Vec<TelemetryGroup> {
        self.lock().iter().copied().collect()
    }

    /// Forward a pose sample while connected.
    pub fn on_pose(&self, pose: &[f64; 6]) {
        if is_connected(&self.session) {
            self.queue.push(pose_message(pose));
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<TelemetryGroup>> {
        self.subscribed.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn is_connected(session: &Weak<Session>) -> bool {
    session
        .upgrade()
        .is_some_and(|s| s.state() == SessionState::Connected)
}

fn forward_sample(
    session: &Weak<Session>,
    queue: &OutboundQueue,
    group: TelemetryGroup,
    record: &LogRecord,
) {
    if !is_connected(session) {
        return;
    }
    if group == TelemetryGroup::Battery {
        if let (Some(vbat), Some(state)) = (record.get(LOG_VBAT), record.get(LOG_BATTERY_STATE)) {
            log::debug!(
                "[telemetry] battery {vbat:.3}V {:?}",
                BatteryState::from_code(*state)
            );
        }
    }
    match group.to_message(record) {
        Ok(msg) => queue.push(msg),
        Err(missing) => {
            log::warn!("[telemetry] {} sample without {missing}; dropped", group.name())
        }
    }
}
