#![doc(html_root_url = "https://docs.rs/rns-meshtastic/latest")]
//! Reticulum interface over Meshtastic LoRa radios.
//!
//! Host frames are split into signed-ordinal fragments small enough for a
//! single mesh packet, paced onto the radio, and reassembled per peer on the
//! far side. The radio is reached either natively through a device library
//! or through a line-oriented TCP bridge hosted by a companion app.

pub mod config;
pub mod error;
pub mod fragment;
pub mod interface;
pub mod metrics;
pub mod queue;
pub mod transport;

pub use config::{ConfigError, ConnectionMode, InterfaceConfig, InterfaceOptions, NativeTarget};
pub use error::InterfaceError;
pub use fragment::{
    Fragment,
    FragmentError,
    FragmentHeader,
    FragmentationError,
    PeerId,
    PeerSessionTable,
    Position,
    ReassemblyError,
    ReassemblySession,
    SessionIndex,
    encode,
};
pub use interface::{HostTransport, MeshInterface};
pub use queue::OutgoingQueue;
pub use transport::{LinkState, TransportSession};
