//! Connection state machine for the vehicle session.
//!
//! A [`Session`] owns the one authoritative [`SessionState`] and reconciles
//! two event sources into it:
//! - user commands (`connect`, `disconnect`, parameter writes) arriving on
//!   the relay's inbound worker, and
//! - lifecycle signals raised by the [`FlightClient`] on its own threads.
//!
//! Every transition is applied under one mutex.  Side effects (opening or
//! closing the link, registering telemetry) run after the lock is released,
//! so a client that raises signals synchronously from inside `open_link`
//! cannot deadlock.  Because the first `connect` moves the state to
//! `Connecting` before releasing the lock, two racing callers never both open
//! the link.
//!
//! Each state change is mirrored as one status message on the outbound
//! queue.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::client::{ClientError, FlightClient};
use crate::config::BridgeConfig;
use crate::message::{Cmd, OutboundMessage};
use crate::queue::OutboundQueue;
use crate::state::{ConnectReason, SessionState};
use crate::telemetry::{TelemetryRelay, BASELINE_GROUPS, FULL_GROUPS};

struct Inner {
    state: SessionState,
    reason: ConnectReason,
}

impl Inner {
    fn status(&self) -> OutboundMessage {
        OutboundMessage::status(self.state, self.reason)
    }

    /// Apply a transition; returns the status to emit when anything changed.
    fn transition(
        &mut self,
        state: SessionState,
        reason: Option<ConnectReason>,
    ) -> Option<OutboundMessage> {
        let before = (self.state, self.reason);
        self.state = state;
        if let Some(reason) = reason {
            self.reason = reason;
        }
        if before != (self.state, self.reason) {
            log::info!(
                "[session] {} ({}) → {} ({})",
                before.0,
                before.1,
                self.state,
                self.reason
            );
            Some(self.status())
        } else {
            None
        }
    }
}

/// The session between the bridge and one vehicle.
pub struct Session {
    client: Arc<dyn FlightClient>,
    queue: OutboundQueue,
    telemetry: TelemetryRelay,
    link_uri: String,
    inner: Mutex<Inner>,
}

impl Session {
    /// Build a session and subscribe it to the client's lifecycle signals.
    pub fn new(
        client: Arc<dyn FlightClient>,
        queue: OutboundQueue,
        config: &BridgeConfig,
    ) -> Arc<Self> {
        let initial = if config.start_scanning {
            SessionState::Scanning
        } else {
            SessionState::Disconnected
        };
        let session = Arc::new_cyclic(|me: &Weak<Session>| Session {
            telemetry: TelemetryRelay::new(Arc::clone(&client), queue.clone(), me.clone()),
            client: Arc::clone(&client),
            queue,
            link_uri: config.link_uri.clone(),
            inner: Mutex::new(Inner {
                state: initial,
                reason: ConnectReason::NoConnect,
            }),
        });
        session.attach();
        session
    }

    /// Route the client's signals into this session.
    ///
    /// Subscribers hold a weak reference; a dropped session ignores signals.
    fn attach(self: &Arc<Self>) {
        let signals = self.client.signals();

        let me = Arc::downgrade(self);
        signals.connection_requested.add_callback(move |uri| {
            if let Some(s) = me.upgrade() {
                s.on_connection_requested(uri);
            }
        });
        let me = Arc::downgrade(self);
        signals.connected.add_callback(move |uri| {
            if let Some(s) = me.upgrade() {
                s.on_connected(uri);
            }
        });
        let me = Arc::downgrade(self);
        signals.fully_connected.add_callback(move |uri| {
            if let Some(s) = me.upgrade() {
                s.on_fully_connected(uri);
            }
        });
        let me = Arc::downgrade(self);
        signals.disconnected.add_callback(move |uri| {
            if let Some(s) = me.upgrade() {
                s.on_disconnected(uri);
            }
        });
        let me = Arc::downgrade(self);
        signals.connection_lost.add_callback(move |(uri, msg)| {
            if let Some(s) = me.upgrade() {
                s.on_connection_lost(uri, msg);
            }
        });
        let me = Arc::downgrade(self);
        signals.connection_failed.add_callback(move |(uri, msg)| {
            if let Some(s) = me.upgrade() {
                s.on_connection_failed(uri, msg);
            }
        });
        let me = Arc::downgrade(self);
        signals.pose_estimate.add_callback(move |pose| {
            if let Some(s) = me.upgrade() {
                s.telemetry.on_pose(pose);
            }
        });
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn reason(&self) -> ConnectReason {
        self.lock().reason
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn telemetry(&self) -> &TelemetryRelay {
        &self.telemetry
    }

    pub fn link_uri(&self) -> &str {
        &self.link_uri
    }

    // -----------------------------------------------------------------------
    // User commands
    // -----------------------------------------------------------------------

    /// Open the link, or echo the current status if one is already open.
    ///
    /// A failing `open_link` leaves the session `Disconnected` with reason
    /// `ConnectError`; the failure is reported as a status message and also
    /// returned.
    pub fn connect(&self) -> Result<(), ClientError> {
        let (open, status) = {
            let mut inner = self.lock();
            if inner.state.can_open() {
                inner.transition(SessionState::Connecting, None);
                (true, inner.status())
            } else {
                (false, inner.status())
            }
        };
        self.queue.push(status);

        if !open {
            log::debug!("[session] connect while {}; echoing status", self.state());
            return Ok(());
        }

        log::info!("[session] opening {}", self.link_uri);
        if let Err(e) = self.client.open_link(&self.link_uri) {
            log::warn!("[session] open {} failed: {e}", self.link_uri);
            let status = {
                let mut inner = self.lock();
                inner.transition(SessionState::Disconnected, Some(ConnectReason::ConnectError));
                inner.status()
            };
            self.queue.push(status);
            return Err(e);
        }
        Ok(())
    }

    /// Close the link from the user side.
    pub fn disconnect(&self) {
        let status = {
            let mut inner = self.lock();
            inner.transition(
                SessionState::Disconnected,
                Some(ConnectReason::ManualDisconnect),
            );
            inner.status()
        };
        self.queue.push(status);
        self.telemetry.reset();
        self.client.close_link();
        log::info!("[session] disconnect {}", self.link_uri);
    }

    /// Forward a parameter write; a failure is echoed under the parameter's
    /// name with `status = 1`.
    ///
    /// The echo carries the requested value, or `0` when it is not numeric.
    pub fn set_param(&self, name: &str, value: &str) -> Result<(), ClientError> {
        self.client.set_param(name, value).map_err(|e| {
            log::error!("[session] set_param error: {e}");
            let echoed = value.trim().parse::<f64>().unwrap_or(0.0);
            self.queue.push(OutboundMessage::new(
                Cmd::Param(name.to_string()),
                vec![echoed],
                1,
            ));
            e
        })
    }

    /// The outbound worker drained nothing within its idle timeout.
    ///
    /// While a link is open or opening this is treated as a wedged peer: the
    /// reason becomes `SocketBlocked`, the link is closed and the session
    /// moves to `Disconnected`.  If the client already reported the
    /// disconnect from inside `close_link`, no second status is emitted.
    pub fn on_outbound_stalled(&self) {
        let close = {
            let mut inner = self.lock();
            if inner.state.is_active() {
                let state = inner.state;
                inner.transition(state, Some(ConnectReason::SocketBlocked));
                true
            } else {
                false
            }
        };
        if close {
            log::warn!("[session] outbound relay stalled; forcing disconnect");
            self.telemetry.reset();
            self.client.close_link();
            self.apply(SessionState::Disconnected, None);
        }
    }

    // -----------------------------------------------------------------------
    // Client signals
    // -----------------------------------------------------------------------

    pub fn on_connection_requested(&self, uri: &str) {
        log::debug!("[session] connection requested {uri}");
        self.apply(SessionState::Connecting, Some(ConnectReason::NoConnect));
    }

    pub fn on_connected(&self, uri: &str) {
        log::debug!("[session] connected {uri}");
        self.apply(SessionState::Connected, None);
        self.telemetry.subscribe(BASELINE_GROUPS);
    }

    pub fn on_fully_connected(&self, uri: &str) {
        log::debug!("[session] fully connected {uri}");
        self.apply(SessionState::Connected, Some(ConnectReason::Success));
        self.telemetry.subscribe(FULL_GROUPS);
    }

    pub fn on_connection_lost(&self, uri: &str, msg: &str) {
        log::warn!("[session] connection lost {uri}: {msg}");
        self.apply(SessionState::Disconnected, Some(ConnectReason::ConnectError));
        self.telemetry.reset();
    }

    pub fn on_connection_failed(&self, uri: &str, msg: &str) {
        log::warn!("[session] connection failed {uri}: {msg}");
        self.apply(SessionState::Disconnected, Some(ConnectReason::ConnectError));
        self.telemetry.reset();
    }

    pub fn on_disconnected(&self, uri: &str) {
        log::debug!("[session] disconnected {uri}");
        self.apply(SessionState::Disconnected, None);
        self.telemetry.reset();
    }

    fn apply(&self, state: SessionState, reason: Option<ConnectReason>) {
        let status = self.lock().transition(state, reason);
        if let Some(status) = status {
            self.queue.push(status);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Session")
            .field("link_uri", &self.link_uri)
            .field("state", &inner.state)
            .field("reason", &inner.reason)
            .finish()
    }
}
