//! A header plus its payload chunk, as carried in one radio packet.

use bytes::{BufMut, Bytes, BytesMut};

use super::{FragmentError, FragmentHeader, HEADER_LEN, Position, SessionIndex};

/// Immutable fragment of a larger frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    header: FragmentHeader,
    payload: Bytes,
}

impl Fragment {
    /// Construct a fragment from its parts.
    #[must_use]
    pub fn new(header: FragmentHeader, payload: Bytes) -> Self { Self { header, payload } }

    /// Return the fragment header.
    #[must_use]
    pub const fn header(&self) -> &FragmentHeader { &self.header }

    /// Shorthand for the header's session index.
    #[must_use]
    pub const fn session_index(&self) -> SessionIndex { self.header.session_index() }

    /// Shorthand for the header's position.
    #[must_use]
    pub const fn position(&self) -> Position { self.header.position() }

    /// Borrow the payload chunk.
    #[must_use]
    pub fn payload(&self) -> &[u8] { &self.payload }

    /// Consume the fragment, returning the payload chunk.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }

    /// Number of bytes this fragment occupies on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize { HEADER_LEN + self.payload.len() }

    /// Serialise into `header || payload`.
    #[must_use]
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_slice(&self.header.to_bytes());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse `header || payload` without copying the payload.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError`] when the header is undersized or invalid.
    pub fn from_wire(mut wire: Bytes) -> Result<Self, FragmentError> {
        let header = FragmentHeader::decode(&wire)?;
        let payload = wire.split_off(HEADER_LEN);
        Ok(Self::new(header, payload))
    }
}
