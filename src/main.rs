//! Demo binary running one bridged Meshtastic interface.
//!
//! Frames reassembled from the mesh are logged; the process exits on Ctrl-C.

mod cli;

use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use rns_meshtastic::{HostTransport, InterfaceConfig, InterfaceOptions, MeshInterface};
use tracing::info;

struct LoggingHost;

impl HostTransport for LoggingHost {
    fn inbound(&self, frame: Bytes, interface: &str) {
        info!(interface, len = frame.len(), "frame received");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let options = InterfaceOptions {
        name: Some(cli.name),
        android_tcp_host: Some(cli.android_host),
        android_tcp_port: Some(cli.android_port),
        data_speed: cli.data_speed,
        hop_limit: cli.hop_limit,
        ..InterfaceOptions::default()
    };
    let config = InterfaceConfig::try_from(options)?;
    let iface = MeshInterface::open(config, Arc::new(LoggingHost), None).await?;
    info!(%iface, "interface running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    iface.shutdown().await;
    Ok(())
}
