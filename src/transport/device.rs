//! Abstraction over a directly attached Meshtastic device.
//!
//! The serial, BLE, and TCP device protocols live outside this crate. A
//! [`DeviceConnector`] opens one of them and hands back a [`DeviceHandle`]:
//! a [`RadioLink`] for sending and a channel of [`DeviceEvent`]s for
//! connectivity changes and received packets.

use std::{io, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::NativeTarget;

/// Application port number reserved for Reticulum tunnel traffic.
pub const RETICULUM_TUNNEL_PORT: u32 = 76;

/// Broadcast node number on the mesh.
pub const BROADCAST_NODE: u32 = u32::MAX;

/// Where an outbound packet is addressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Destination {
    #[default]
    Broadcast,
    Node(u32),
}

impl Destination {
    /// Node number as carried in the device protocol.
    #[must_use]
    pub const fn node_num(self) -> u32 {
        match self {
            Self::Broadcast => BROADCAST_NODE,
            Self::Node(num) => num,
        }
    }
}

/// Addressing and delivery options applied to every outbound fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutboundPacket {
    pub destination: Destination,
    pub port: u32,
    pub hop_limit: u8,
    pub channel: u8,
    pub want_ack: bool,
}

impl OutboundPacket {
    /// Broadcast on the primary channel without acknowledgement.
    #[must_use]
    pub const fn tunnel(hop_limit: u8) -> Self {
        Self {
            destination: Destination::Broadcast,
            port: RETICULUM_TUNNEL_PORT,
            hop_limit,
            channel: 0,
            want_ack: false,
        }
    }
}

/// Notification emitted by a device link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The device finished its handshake and can carry traffic.
    Established,
    /// The device went away.
    Lost,
    /// A packet arrived from the mesh.
    Received { from: u32, port: u32, payload: Bytes },
}

/// Sending half of a device link.
#[async_trait]
pub trait RadioLink: Send + Sync {
    /// Transmit raw fragment bytes as one mesh packet.
    async fn send_raw(&self, payload: Bytes, packet: &OutboundPacket) -> io::Result<()>;

    /// Release the device. The default does nothing.
    async fn close(&self) -> io::Result<()> { Ok(()) }
}

/// An open device: its sender plus its event stream.
pub struct DeviceHandle {
    pub link: Arc<dyn RadioLink>,
    pub events: mpsc::Receiver<DeviceEvent>,
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle").finish_non_exhaustive()
    }
}

/// Opens device links for native mode.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Open the device described by `target`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the device cannot be opened.
    async fn connect(&self, target: &NativeTarget) -> io::Result<DeviceHandle>;
}
