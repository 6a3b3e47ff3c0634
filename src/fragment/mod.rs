//! Fragmentation and reassembly for constrained radio payloads.
//!
//! A frame larger than one radio packet is split into fragments, each
//! prefixed with a two-byte header: the sender's cyclic session index and a
//! signed position whose sign marks the last fragment. Receivers buffer
//! fragments per peer and emit the frame once the ordinals are gap-free.

pub mod error;
pub mod fragmenter;
pub mod header;
pub mod index;
pub mod packet;
pub mod reassembler;
pub mod table;

pub use error::{FragmentError, FragmentationError, ReassemblyError};
pub use fragmenter::{MAX_FRAGMENTS, encode};
pub use header::{FragmentHeader, HEADER_LEN, decode_header};
pub use index::{Position, SessionIndex};
pub use packet::Fragment;
pub use reassembler::ReassemblySession;
pub use table::{PeerId, PeerSessionTable};

#[cfg(test)]
mod tests;
