//! Command line interface for the `rns-meshtastic` demo binary.
//!
//! The binary bridges to a companion app over TCP and logs every frame it
//! reassembles.

use clap::Parser;

/// Command line arguments for the `rns-meshtastic` binary.
#[derive(Debug, Parser)]
#[command(
    name = "rns-meshtastic",
    version,
    about = "Bridge Reticulum frames through a Meshtastic companion app"
)]
pub struct Cli {
    /// Interface name reported with delivered frames.
    #[arg(short, long, default_value = "Meshtastic")]
    pub name: String,
    /// Host running the companion app's TCP bridge.
    #[arg(long)]
    pub android_host: String,
    /// TCP port of the companion app's bridge.
    #[arg(long, default_value_t = 4403)]
    pub android_port: u16,
    /// Modem preset index selecting pacing and bitrate.
    #[arg(long)]
    pub data_speed: Option<u8>,
    /// Hop limit applied to outbound packets.
    #[arg(long)]
    pub hop_limit: Option<u8>,
}
