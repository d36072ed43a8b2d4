//! `crtp-probe` — open a CRTP-over-UDP link and log what comes back.
//!
//! Useful for checking that a vehicle answers before starting the bridge.
//! Set `RUST_LOG` to control verbosity.

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crtp_udp::{LinkConfig, UdpLink};

/// Connect to a vehicle over UDP and print received CRTP packets.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Vehicle URI.
    #[arg(short, long, default_value = crtp_udp::link::DEFAULT_URI)]
    uri: String,
    /// Local port to bind.
    #[arg(long, default_value_t = crtp_udp::timer::LOCAL_PORT)]
    local_port: u16,
    /// Vehicle port.
    #[arg(long, default_value_t = crtp_udp::timer::VEHICLE_PORT)]
    remote_port: u16,
    /// How long to listen, in seconds.
    #[arg(short, long, default_value_t = 5)]
    seconds: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let link = UdpLink::new(LinkConfig {
        local_port: cli.local_port,
        remote_port: cli.remote_port,
        ..LinkConfig::default()
    });

    link.connect(
        &cli.uri,
        |q| log::info!("link quality {q:.0}%"),
        |msg| log::error!("{msg}"),
    )
    .await?;

    let deadline = Instant::now() + Duration::from_secs(cli.seconds);
    let mut received = 0u64;
    while Instant::now() < deadline && link.is_connected() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        if let Some(pkt) = link.receive(remaining).await {
            received += 1;
            log::info!(
                "port={} channel={} len={}",
                pkt.port(),
                pkt.channel(),
                pkt.payload.len()
            );
        }
    }

    log::info!(
        "received {received} packet(s), dropped {} corrupt frame(s)",
        link.dropped_frames()
    );
    link.close().await;
    Ok(())
}
