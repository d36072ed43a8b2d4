//! Wire-format definitions for CRTP frames carried over UDP.
//!
//! Every datagram exchanged with the vehicle is one frame.  This module is
//! responsible for:
//! - Defining the on-wire layout (header byte, payload, trailing checksum).
//! - Serialising a [`CrtpPacket`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`CrtpPacket`], returning
//!   errors for malformed or corrupted input.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! ```text
//!  0               1                               N+1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Header     |        Payload (0..N) ...     |   Checksum    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The checksum is the sum of the header and every payload byte, modulo 256.
//! The header packs the CRTP port in the upper nibble and the channel in the
//! lowest two bits.

/// Largest frame the receive path will read in one datagram.
pub const MAX_FRAME_LEN: usize = 1024;

/// Largest payload that still fits in [`MAX_FRAME_LEN`] once the header and
/// checksum bytes are added.
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - 2;

/// Fixed keep-alive frame, sent raw (no checksum appended by the codec).
///
/// Port 0xF is the CRTP link-control port; the last `0x01` happens to be the
/// correct checksum of `FF 01 01`, so the frame also decodes cleanly.
pub const KEEPALIVE_FRAME: [u8; 4] = [0xFF, 0x01, 0x01, 0x01];

/// An application packet: header byte + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrtpPacket {
    pub header: u8,
    pub payload: Vec<u8>,
}

impl CrtpPacket {
    pub fn new(header: u8, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    /// Build a packet addressed to `port` / `channel`.
    ///
    /// Bits 2-3 of the header are set, matching what CRTP firmware expects
    /// from a host.
    pub fn with_port(port: u8, channel: u8, payload: Vec<u8>) -> Self {
        let header = ((port & 0x0F) << 4) | 0b0000_1100 | (channel & 0x03);
        Self { header, payload }
    }

    /// CRTP port encoded in the upper nibble of the header.
    pub fn port(&self) -> u8 {
        (self.header >> 4) & 0x0F
    }

    /// CRTP channel encoded in the lowest two bits of the header.
    pub fn channel(&self) -> u8 {
        self.header & 0x03
    }

    /// Serialise this packet into a newly allocated frame.
    pub fn encode(&self) -> Vec<u8> {
        encode(self.header, &self.payload)
    }

    /// Parse a [`CrtpPacket`] from a raw frame.
    ///
    /// Returns [`Err`] if:
    /// - `frame` is shorter than two bytes, or
    /// - the trailing checksum does not match the recomputed value.
    pub fn decode(frame: &[u8]) -> Result<Self, PacketError> {
        decode(frame)
    }
}

/// Build `header + payload + checksum`.
///
/// Payload length is the caller's responsibility; frames longer than
/// [`MAX_FRAME_LEN`] will be truncated by the peer's receive buffer.
pub fn encode(header: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.push(header);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame));
    frame
}

/// Validate and split a frame into header and payload.
pub fn decode(frame: &[u8]) -> Result<CrtpPacket, PacketError> {
    if frame.len() < 2 {
        return Err(PacketError::Malformed(frame.len()));
    }

    let (body, trailer) = frame.split_at(frame.len() - 1);
    let expected = checksum(body);
    let received = trailer[0];
    if expected != received {
        return Err(PacketError::ChecksumFailed { expected, received });
    }

    Ok(CrtpPacket {
        header: body[0],
        payload: body[1..].to_vec(),
    })
}

/// Errors that can arise when parsing a raw frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Frame too short to hold a header and a checksum (length attached).
    Malformed(usize),
    /// Trailing checksum byte did not match the recomputed sum.
    ChecksumFailed { expected: u8, received: u8 },
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketError::Malformed(len) => {
                write!(f, "frame of {len} byte(s) is too short for header and checksum")
            }
            PacketError::ChecksumFailed { expected, received } => {
                write!(f, "checksum error {expected:#04x} != {received:#04x}")
            }
        }
    }
}

impl std::error::Error for PacketError {}

/// Sum of all bytes, modulo 256.
fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}
