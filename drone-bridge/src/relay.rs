//! JSON/UDP relay between the session and the ground controller.
//!
//! ```text
//!                 ┌──────────────── Relay socket ────────────────┐
//!  ground ──JSON──▶ inbound worker ──▶ Session (connect, quit…)  │
//!   ctrl  ◀─JSON── outbound worker ◀── OutboundQueue ◀── Session │
//!                 └──────────────────────────────────────────────┘
//! ```
//!
//! Both workers share one socket and one `watch` shutdown signal.  `quit`
//! raises the signal from the inbound side; the outbound worker then flushes
//! whatever is still queued (the quit acknowledgement included) and exits.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::command::InboundCommand;
use crate::config::BridgeConfig;
use crate::message::OutboundMessage;
use crate::session::Session;
use crate::state::SessionState;

/// Largest inbound datagram read in one go.
pub const MAX_DATAGRAM: usize = 1024;

/// Pause after a failed receive before trying again.
const RECV_RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("cannot bind relay socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("relay I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A bound relay socket, ready to spawn its workers.
pub struct Relay {
    socket: Arc<UdpSocket>,
    session: Arc<Session>,
    config: BridgeConfig,
    local_addr: SocketAddr,
}

impl Relay {
    pub async fn bind(config: BridgeConfig, session: Arc<Session>) -> Result<Self, RelayError> {
        let socket = UdpSocket::bind(config.listen_addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: config.listen_addr,
                source,
            })?;
        let local_addr = socket.local_addr()?;
        log::info!(
            "[relay] listening on {local_addr}, reporting to {}",
            config.peer_addr
        );
        Ok(Self {
            socket: Arc::new(socket),
            session,
            config,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the outbound and inbound workers.
    pub fn spawn(self) -> RelayHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown = Arc::new(shutdown_tx);

        let outbound = tokio::spawn(outbound_loop(
            Arc::clone(&self.socket),
            Arc::clone(&self.session),
            self.config.peer_addr,
            self.config.idle_timeout,
            shutdown_rx,
        ));
        let inbound = tokio::spawn(inbound_loop(
            Arc::clone(&self.socket),
            Arc::clone(&self.session),
            Arc::clone(&shutdown),
        ));

        RelayHandle {
            shutdown,
            outbound,
            inbound,
            session: self.session,
            local_addr: self.local_addr,
            join_timeout: self.config.join_timeout,
        }
    }
}

/// Running relay workers.
pub struct RelayHandle {
    shutdown: Arc<watch::Sender<bool>>,
    outbound: JoinHandle<()>,
    inbound: JoinHandle<()>,
    session: Arc<Session>,
    local_addr: SocketAddr,
    join_timeout: Duration,
}

impl RelayHandle {
    /// Ask both workers to stop.  Does not wait.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// `true` once a shutdown was requested, by [`shutdown`](Self::shutdown)
    /// or by an inbound `quit`.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves when a shutdown has been requested.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.shutdown.subscribe();
        // The sender lives in `self`, so this only returns on a real signal.
        let _ = rx.wait_for(|stop| *stop).await;
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait up to `limit` for both workers to finish.
    ///
    /// Does not request a shutdown.  Workers still running at the deadline
    /// are aborted and `false` is returned.  Afterwards the session is
    /// disconnected if it is not already.
    pub async fn join(mut self, limit: Duration) -> bool {
        let both = async {
            if let Err(e) = (&mut self.outbound).await {
                log::warn!("[relay] outbound worker failed: {e}");
            }
            if let Err(e) = (&mut self.inbound).await {
                log::warn!("[relay] inbound worker failed: {e}");
            }
        };
        let finished = tokio::time::timeout(limit, both).await.is_ok();
        if !finished {
            log::warn!("[relay] workers did not stop within {limit:?}; aborting");
            self.outbound.abort();
            self.inbound.abort();
        }

        if self.session.state() != SessionState::Disconnected {
            self.session.disconnect();
        }
        finished
    }

    /// Signal shutdown and join within the configured `join_timeout`.
    pub async fn stop(self) -> bool {
        self.shutdown();
        let limit = self.join_timeout;
        self.join(limit).await
    }
}

async fn outbound_loop(
    socket: Arc<UdpSocket>,
    session: Arc<Session>,
    peer: SocketAddr,
    idle: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let queue = session.queue().clone();
    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = tokio::select! {
            _ = shutdown.changed() => break,
            msg = queue.pop_timeout(idle) => msg,
        };

        match next {
            Some(msg) => send_message(&socket, peer, &msg).await,
            None => {
                log::debug!("[relay:out] nothing to send for {idle:?}");
                if session.state() == SessionState::Connected {
                    send_message(&socket, peer, &OutboundMessage::degraded_estimate()).await;
                }
                session.on_outbound_stalled();
            }
        }
    }

    let pending = queue.drain();
    if !pending.is_empty() {
        log::debug!("[relay:out] flushing {} message(s)", pending.len());
    }
    for msg in &pending {
        send_message(&socket, peer, msg).await;
    }
    log::debug!("[relay:out] stopped");
}

async fn send_message(socket: &UdpSocket, peer: SocketAddr, msg: &OutboundMessage) {
    let bytes = match msg.to_json() {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("[relay:out] cannot serialise {}: {e}", msg.cmd.as_str());
            return;
        }
    };
    if let Err(e) = socket.send_to(&bytes, peer).await {
        log::warn!("[relay:out] send to {peer} failed: {e}");
    }
}

async fn inbound_loop(
    socket: Arc<UdpSocket>,
    session: Arc<Session>,
    shutdown_tx: Arc<watch::Sender<bool>>,
) {
    let mut shutdown = shutdown_tx.subscribe();
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        if *shutdown.borrow() {
            break;
        }

        let received = tokio::select! {
            _ = shutdown.changed() => break,
            r = socket.recv_from(&mut buf) => r,
        };

        let (len, from) = match received {
            Ok(r) => r,
            Err(e) => {
                log::warn!("[relay:in] socket error: {e}");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(RECV_RETRY_DELAY) => {}
                }
                continue;
            }
        };

        if len == 0 {
            continue;
        }

        let command = InboundCommand::decode(&buf[..len]);
        log::debug!("[relay:in] {from}: {command:?}");

        match command {
            InboundCommand::Quit => {
                log::info!("[relay:in] quit requested by {from}");
                session.disconnect();
                session.queue().push(OutboundMessage::quit_ack());
                shutdown_tx.send_replace(true);
                break;
            }
            InboundCommand::Disconnect => session.disconnect(),
            InboundCommand::Connect => {
                if let Err(e) = session.connect() {
                    log::warn!("[relay:in] connect failed: {e}");
                }
            }
            InboundCommand::SetParam { name, value } => {
                // Failures are echoed to the peer by the session.
                let _ = session.set_param(&name, &value);
            }
            InboundCommand::Unknown => {
                log::warn!("[relay:in] unknown command from {from}");
                session.queue().push(OutboundMessage::unknown());
            }
        }
    }
    log::debug!("[relay:in] stopped");
}
