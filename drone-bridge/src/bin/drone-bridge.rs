//! `drone-bridge` — run the JSON/UDP relay.
//!
//! Without a vehicle client linked in, the relay runs against
//! [`OfflineClient`]: every `connect` is answered with a `ConnectError`
//! status, which is enough to check a ground controller's wiring.
//! Set `RUST_LOG` to control verbosity.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use drone_bridge::{BridgeConfig, OfflineClient, OutboundQueue, Relay, Session};

/// Relay session status and commands between a ground controller and a vehicle.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Vehicle URI passed to the flight client.
    #[arg(short, long, default_value = crtp_udp::link::DEFAULT_URI)]
    uri: String,
    /// Address to receive commands on.
    #[arg(short, long, default_value = "127.0.0.1:9494")]
    listen: SocketAddr,
    /// Ground controller address.
    #[arg(short, long, default_value = "127.0.0.1:9191")]
    peer: SocketAddr,
    /// Seconds without outbound traffic before the link is considered stalled.
    #[arg(long, default_value_t = 10)]
    idle_timeout: u64,
    /// Outbound queue capacity.
    #[arg(long, default_value_t = 1024)]
    queue_capacity: usize,
    /// Report `Scanning` until the first connect.
    #[arg(long)]
    scanning: bool,
}

impl Cli {
    fn into_config(self) -> BridgeConfig {
        BridgeConfig {
            link_uri: self.uri,
            listen_addr: self.listen,
            peer_addr: self.peer,
            idle_timeout: Duration::from_secs(self.idle_timeout.max(1)),
            queue_capacity: self.queue_capacity,
            start_scanning: self.scanning,
            ..BridgeConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Cli::parse().into_config();
    let queue = OutboundQueue::with_capacity(config.queue_capacity);
    let session = Session::new(Arc::new(OfflineClient::new()), queue, &config);
    let relay = Relay::bind(config, Arc::clone(&session)).await?;
    let handle = relay.spawn();
    log::info!("bridge running on {}; send {{\"cmd\":\"quit\"}} to stop", handle.local_addr());

    tokio::select! {
        _ = handle.wait_for_shutdown() => log::info!("quit received"),
        r = tokio::signal::ctrl_c() => {
            r?;
            log::info!("interrupted");
        }
    }

    if !handle.stop().await {
        log::warn!("relay workers were aborted");
    }
    log::info!(
        "stopped; {} message(s) dropped under backpressure",
        session.queue().dropped()
    );
    Ok(())
}
