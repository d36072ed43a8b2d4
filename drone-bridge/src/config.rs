//! Bridge configuration.
//!
//! Addresses of the relay socket and the ground controller, the outbound
//! idle timeout, and the worker join bound.  Nothing is persisted; the
//! binary fills this in from its command line.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Where the bridge listens, where it reports, and how patient it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Vehicle link handed to the flight client on `connect`.
    pub link_uri: String,
    /// Relay socket; inbound commands arrive here.
    pub listen_addr: SocketAddr,
    /// Ground controller receiving outbound messages.
    pub peer_addr: SocketAddr,
    /// Outbound silence after which the session is considered stalled.
    pub idle_timeout: Duration,
    /// Upper bound for the relay workers to finish after shutdown.
    pub join_timeout: Duration,
    pub queue_capacity: usize,
    /// Start in `Scanning` instead of `Disconnected`.
    pub start_scanning: bool,
}

pub const DEFAULT_LISTEN_PORT: u16 = 9494;
pub const DEFAULT_PEER_PORT: u16 = 9191;

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            link_uri: crtp_udp::link::DEFAULT_URI.to_string(),
            listen_addr: (Ipv4Addr::LOCALHOST, DEFAULT_LISTEN_PORT).into(),
            peer_addr: (Ipv4Addr::LOCALHOST, DEFAULT_PEER_PORT).into(),
            idle_timeout: Duration::from_secs(10),
            join_timeout: Duration::from_secs(2),
            queue_capacity: 1024,
            start_scanning: false,
        }
    }
}
