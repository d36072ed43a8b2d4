//! CRTP link driver over UDP.
//!
//! A [`UdpLink`] owns the complete state for one association with a vehicle:
//! - Parsing `udp://host` URIs and resolving the fixed vehicle port.
//! - Owning the bound + connected [`Socket`].
//! - Running the keep-alive task that serialises every outbound frame and
//!   fills silence with [`KEEPALIVE_FRAME`].
//! - Decoding inbound frames, dropping (and counting) corrupt ones.
//!
//! ```text
//!  send(pkt) ──try_send──▶ [ bounded queue ] ──▶ keep-alive task ──▶ Socket
//!                                                  (100ms tick)        │
//!  receive() ◀──────────── decode ◀──────────────────────────────────── ┘
//! ```
//!
//! Nothing here is fatal at runtime: socket errors mark the link
//! disconnected and are reported through the error callback, decode errors
//! are dropped.  Only a malformed URI is returned to the caller.

use std::collections::VecDeque;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::callbacks::Caller;
use crate::packet::{self, CrtpPacket, KEEPALIVE_FRAME};
use crate::socket::Socket;
use crate::timer::LinkConfig;

/// URI scheme accepted by this driver.
pub const SCHEME: &str = "udp://";

/// The one address [`UdpLink::scan_interface`] knows about.
pub const DEFAULT_URI: &str = "udp://192.168.43.42";

/// Frames over which link quality is measured.
const QUALITY_WINDOW: usize = 100;

/// Errors returned by [`UdpLink::connect`].
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("not an UDP URI: {0}")]
    WrongUri(String),
    #[error("could not resolve vehicle address {0}")]
    Resolve(String),
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resources that exist only while the link is connected.
struct Active {
    socket: Arc<Socket>,
    send_tx: mpsc::Sender<Vec<u8>>,
    shutdown_tx: watch::Sender<bool>,
    keepalive: JoinHandle<()>,
}

/// A CRTP link to one vehicle over a connected UDP socket.
///
/// All methods take `&self`; the link can be shared behind an `Arc` between
/// a receive loop and any number of senders.
pub struct UdpLink {
    config: LinkConfig,
    connected: Arc<AtomicBool>,
    active: Mutex<Option<Active>>,
    link_quality: Caller<f32>,
    link_error: Caller<String>,
    quality: Mutex<VecDeque<bool>>,
    dropped_frames: AtomicU64,
}

impl Default for UdpLink {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}

impl UdpLink {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            connected: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(None),
            link_quality: Caller::new(),
            link_error: Caller::new(),
            quality: Mutex::new(VecDeque::with_capacity(QUALITY_WINDOW)),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Driver name, as used in URI scans.
    pub fn name(&self) -> &'static str {
        "udp"
    }

    /// Open the association described by `uri` and start the keep-alive task.
    ///
    /// `on_quality` receives the percentage of valid frames over the last
    /// hundred datagrams whenever it changes.  `on_error` receives a message
    /// when the socket fails.  A wrong scheme returns
    /// [`LinkError::WrongUri`] before anything is touched.  An already
    /// connected link is closed first.
    pub async fn connect<Q, E>(&self, uri: &str, on_quality: Q, on_error: E) -> Result<(), LinkError>
    where
        Q: Fn(f32) + Send + Sync + 'static,
        E: Fn(&str) + Send + Sync + 'static,
    {
        let host = parse_uri(uri)?;
        self.close().await;

        let peer = tokio::net::lookup_host((host, self.config.remote_port))
            .await?
            .next()
            .ok_or_else(|| LinkError::Resolve(host.to_string()))?;
        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, self.config.local_port).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, self.config.local_port).into(),
        };
        let socket = Arc::new(Socket::connect(local, peer).await?);

        self.link_quality.remove_all();
        self.link_quality.add_callback(move |q| on_quality(*q));
        self.link_error.remove_all();
        self.link_error.add_callback(move |msg: &String| on_error(msg));
        self.lock_quality().clear();

        let (send_tx, send_rx) = mpsc::channel(self.config.timings.send_queue_depth.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.connected.store(true, Ordering::SeqCst);
        let keepalive = tokio::spawn(keepalive_loop(
            Arc::clone(&socket),
            send_rx,
            shutdown_rx,
            self.config.timings.keepalive_interval,
            Arc::clone(&self.connected),
        ));

        log::info!(
            "[link] connected {} → {}",
            socket.local_addr,
            socket.peer_addr
        );
        *self.lock_active() = Some(Active {
            socket,
            send_tx,
            shutdown_tx,
            keepalive,
        });
        Ok(())
    }

    /// Wait up to `wait` for the next valid packet.
    ///
    /// A zero `wait` uses the configured receive timeout.  Returns `None` on
    /// timeout, on an empty datagram, on a frame that fails to decode, on a
    /// socket error (after reporting it), or when the link is closed while
    /// waiting.
    pub async fn receive(&self, wait: Duration) -> Option<CrtpPacket> {
        let (socket, mut shutdown) = {
            let guard = self.lock_active();
            let active = guard.as_ref()?;
            (Arc::clone(&active.socket), active.shutdown_tx.subscribe())
        };
        if *shutdown.borrow() {
            return None;
        }

        let wait = self.config.recv_timeout(wait);
        let result = tokio::select! {
            _ = shutdown.changed() => return None,
            r = timeout(wait, socket.recv_frame()) => r,
        };

        let frame = match result {
            Err(_elapsed) => return None,
            Ok(Err(e)) => {
                self.connected.store(false, Ordering::SeqCst);
                log::debug!("[link] socket error: {e}");
                self.link_error.call(&format!(
                    "Error communicating with the vehicle. Socket error: {e}"
                ));
                return None;
            }
            Ok(Ok(frame)) => frame,
        };

        if frame.is_empty() {
            return None;
        }

        match packet::decode(&frame) {
            Ok(pkt) => {
                self.record_quality(true);
                Some(pkt)
            }
            Err(e) => {
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                self.record_quality(false);
                log::debug!("[link] dropped frame: {e}");
                None
            }
        }
    }

    /// Queue `packet` for the keep-alive task.
    ///
    /// Never waits: if the queue is full the frame is dropped.
    pub fn send(&self, packet: &CrtpPacket) {
        let guard = self.lock_active();
        let Some(active) = guard.as_ref() else {
            log::debug!("[link] send while not connected; dropping");
            return;
        };
        match active.send_tx.try_send(packet.encode()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("[link] send queue full; dropping frame")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("[link] keep-alive task stopped; dropping frame")
            }
        }
    }

    /// Stop the keep-alive task and release the socket.
    ///
    /// Safe to call repeatedly and concurrently with [`receive`](Self::receive).
    pub async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let taken = self.lock_active().take();
        let Some(mut active) = taken else {
            return;
        };

        active.shutdown_tx.send_replace(true);
        drop(active.send_tx);
        match timeout(self.config.timings.close_join_timeout, &mut active.keepalive).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("[link] keep-alive task failed: {e}"),
            Err(_) => {
                log::warn!("[link] keep-alive task did not stop in time; aborting");
                active.keepalive.abort();
            }
        }
        log::info!("[link] closed {}", active.socket.peer_addr);
    }

    /// Statically known vehicle addresses.
    ///
    /// This is not discovery: the vehicle's access point always hands out
    /// the same address, so that address is the only answer.
    pub fn scan_interface(&self, _address: Option<&str>) -> Vec<(String, String)> {
        vec![(DEFAULT_URI.to_string(), String::new())]
    }

    /// `true` between a successful connect and close / socket failure.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Frames dropped on receive because they failed to decode.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Local address of the current association, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_active().as_ref().map(|a| a.socket.local_addr)
    }

    fn record_quality(&self, valid: bool) {
        let (before, after) = {
            let mut window = self.lock_quality();
            let before = quality_of(&window);
            if window.len() == QUALITY_WINDOW {
                window.pop_front();
            }
            window.push_back(valid);
            (before, quality_of(&window).unwrap_or(0.0))
        };
        if before != Some(after) {
            self.link_quality.call(&after);
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<Active>> {
        self.active.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_quality(&self) -> MutexGuard<'_, VecDeque<bool>> {
        self.quality.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl std::fmt::Debug for UdpLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpLink")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .field("dropped_frames", &self.dropped_frames())
            .finish()
    }
}

/// Extract the host part of a `udp://host` URI.
pub fn parse_uri(uri: &str) -> Result<&str, LinkError> {
    let host = uri
        .strip_prefix(SCHEME)
        .ok_or_else(|| LinkError::WrongUri(uri.to_string()))?
        .trim_end_matches('/');
    if host.is_empty() {
        return Err(LinkError::WrongUri(uri.to_string()));
    }
    Ok(host)
}

/// Percentage of valid frames in `window`, `None` when empty.
fn quality_of(window: &VecDeque<bool>) -> Option<f32> {
    if window.is_empty() {
        return None;
    }
    let valid = window.iter().filter(|v| **v).count();
    Some(valid as f32 * 100.0 / window.len() as f32)
}

/// Sole writer of the socket while the link is connected.
///
/// Waits up to `interval` for a queued frame; sends [`KEEPALIVE_FRAME`] when
/// none arrives so the peer never sees a longer gap.
async fn keepalive_loop(
    socket: Arc<Socket>,
    mut frames: mpsc::Receiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
    interval: Duration,
    connected: Arc<AtomicBool>,
) {
    loop {
        if *shutdown.borrow() || !connected.load(Ordering::SeqCst) {
            break;
        }

        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            next = timeout(interval, frames.recv()) => match next {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(_elapsed) => KEEPALIVE_FRAME.to_vec(),
            },
        };

        if let Err(e) = socket.send_frame(&frame).await {
            log::warn!("[keepalive] socket error: {e}");
        }
    }
    log::debug!("[keepalive] stopped");
}
