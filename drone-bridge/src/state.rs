//! Session finite-state machine (FSM) types.
//!
//! This module defines every state a [`crate::session::Session`] can occupy
//! and the reason code reported alongside it.  Transitions are *not*
//! implemented here — they live in [`crate::session`].
//!
//! ```text
//!                 connect / connectionRequested
//!  DISCONNECTED ────────────────────────────────▶ CONNECTING
//!     ▲   ▲                                           │
//!     │   │ connectionLost / disconnected /           │ connected /
//!     │   │ user disconnect                           │ fullyConnected
//!     │   └─────────────────────────────────────── CONNECTED
//!     │
//!  SCANNING (startup only; connect behaves as from DISCONNECTED)
//! ```
//!
//! The numeric values are part of the relay's JSON protocol.

/// Lifecycle state of the vehicle session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SessionState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Scanning = 3,
}

impl SessionState {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// `true` when a user `connect` should open the link.
    pub fn can_open(self) -> bool {
        matches!(self, Self::Disconnected | Self::Scanning)
    }

    /// `true` while a link is open or being opened.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Why the session is in its current state; reported as `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ConnectReason {
    #[default]
    NoConnect = 0,
    Success = 1,
    /// The outbound relay stalled and the link was closed.
    SocketBlocked = 2,
    ConnectError = 3,
    ManualDisconnect = 4,
}

impl ConnectReason {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ConnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
