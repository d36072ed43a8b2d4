//! `crtp-udp` — CRTP frames over a connected UDP socket.
//!
//! # Architecture
//!
//! ```text
//!  ┌────────────────┐  send()   ┌─────────────────┐
//!  │  flight client │──────────▶│     UdpLink     │
//!  └───────▲────────┘           │  (keep-alive +  │
//!          │      receive()     │   error/quality │
//!          └────────────────────│   callbacks)    │
//!                               └────────┬────────┘
//!                                        │ frames
//!                               ┌────────▼────────┐
//!                               │     Socket      │  (tokio UdpSocket,
//!                               └─────────────────┘   bound + connected)
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]    — wire format (header + payload + sum checksum)
//! - [`callbacks`] — ordered subscriber lists that survive panicking subscribers
//! - [`timer`]     — keep-alive / receive timing and port configuration
//! - [`socket`]    — async connected UDP socket
//! - [`link`]      — the link driver: connect, receive, send, close

pub mod callbacks;
pub mod link;
pub mod packet;
pub mod socket;
pub mod timer;

pub use callbacks::Caller;
pub use link::{LinkError, UdpLink};
pub use packet::{CrtpPacket, PacketError, KEEPALIVE_FRAME};
pub use timer::{LinkConfig, LinkTimings};
