//! Keep-alive and receive timing for the UDP link.
//!
//! The vehicle side (and any NAT in between) forgets the association when it
//! sees silence, so the link keeps the wire busy:
//! - [`LinkTimings::keepalive_interval`] — the keep-alive task sends the next
//!   queued frame, or a keep-alive frame if nothing was queued within this
//!   interval.
//! - [`LinkTimings::recv_timeout`] — default upper bound for one
//!   [`crate::link::UdpLink::receive`] call.
//! - [`LinkTimings::close_join_timeout`] — how long
//!   [`crate::link::UdpLink::close`] waits for the keep-alive task to finish.

use std::time::Duration;

/// Destination port of the vehicle's UDP server.
pub const VEHICLE_PORT: u16 = 2390;

/// Local port the link binds so the vehicle can answer a fixed address.
pub const LOCAL_PORT: u16 = 2399;

/// Adjustable timing parameters for one link.
#[derive(Debug, Clone)]
pub struct LinkTimings {
    /// Longest silence the peer may observe while connected.
    pub keepalive_interval: Duration,
    /// Used by `receive` when the caller passes a zero timeout.
    pub recv_timeout: Duration,
    /// Bounded wait for the keep-alive task on close.
    pub close_join_timeout: Duration,
    /// Frames that may wait for the keep-alive task before `send` drops them.
    pub send_queue_depth: usize,
}

impl Default for LinkTimings {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_millis(100),
            recv_timeout: Duration::from_secs(10),
            close_join_timeout: Duration::from_secs(1),
            send_queue_depth: 256,
        }
    }
}

/// Addressing and timing for a [`crate::link::UdpLink`].
///
/// Ports default to the protocol's fixed values; tests override them to bind
/// ephemeral loopback ports.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Local port to bind (`0` lets the OS choose).
    pub local_port: u16,
    /// Port on the vehicle the association is connected to.
    pub remote_port: u16,
    pub timings: LinkTimings,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            local_port: LOCAL_PORT,
            remote_port: VEHICLE_PORT,
            timings: LinkTimings::default(),
        }
    }
}

impl LinkConfig {
    /// Resolve the effective receive timeout for a caller-supplied value.
    pub fn recv_timeout(&self, requested: Duration) -> Duration {
        if requested.is_zero() {
            self.timings.recv_timeout
        } else {
            requested
        }
    }
}
