//! `drone-bridge` — vehicle session state machine and JSON/UDP ground relay.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐  signals   ┌───────────┐  status   ┌───────────────┐
//!  │ FlightClient │───────────▶│  Session  │──────────▶│ OutboundQueue │
//!  └──────▲───────┘            └─────┬─────┘           └───────▲───┬───┘
//!         │ open / close / log       │ subscribe               │   │ pop
//!         │                    ┌─────▼──────────┐   samples    │   │
//!         └────────────────────│ TelemetryRelay │──────────────┘   │
//!                              └────────────────┘                  │
//!  ┌──────────────────────────── Relay ───────────────────────────▼───┐
//!  │  inbound worker: JSON → InboundCommand → Session                 │
//!  │  outbound worker: OutboundMessage → JSON → ground controller     │
//!  └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`state`]     — session state and reason codes
//! - [`message`]   — outbound JSON envelope
//! - [`command`]   — inbound command decoding
//! - [`client`]    — flight-client capability trait and lifecycle signals
//! - [`queue`]     — bounded drop-oldest outbound FIFO
//! - [`session`]   — connection state machine
//! - [`telemetry`] — log groups mapped to outbound messages
//! - [`relay`]     — the two UDP workers and their shutdown signal
//! - [`config`]    — bridge addresses and timeouts
//! - [`offline`]   — a client that refuses every link, for running without a vehicle

pub mod client;
pub mod command;
pub mod config;
pub mod message;
pub mod offline;
pub mod queue;
pub mod relay;
pub mod session;
pub mod state;
pub mod telemetry;

pub use client::{ClientError, ClientSignals, FlightClient, LogConfig, LogRecord};
pub use command::InboundCommand;
pub use config::BridgeConfig;
pub use message::{Cmd, OutboundMessage};
pub use offline::OfflineClient;
pub use queue::OutboundQueue;
pub use relay::{Relay, RelayError, RelayHandle};
pub use session::Session;
pub use state::{ConnectReason, SessionState};
pub use telemetry::{TelemetryGroup, TelemetryRelay};
