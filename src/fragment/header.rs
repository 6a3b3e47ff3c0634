use super::{FragmentError, Position, SessionIndex};

/// Encoded size of a [`FragmentHeader`] in bytes.
pub const HEADER_LEN: usize = 2;

/// Metadata prefixed to every radio fragment.
///
/// The wire layout is one unsigned byte of session index followed by one
/// signed byte of position. Both fields are single bytes so byte order does
/// not apply.
///
/// # Examples
///
/// ```
/// use rns_meshtastic::fragment::{FragmentHeader, Position, SessionIndex};
/// let header = FragmentHeader::new(SessionIndex::new(5), Position::new(2, true).expect("valid"));
/// let bytes = header.to_bytes();
/// assert_eq!(bytes, [5, 0xfe]);
/// assert_eq!(FragmentHeader::decode(&bytes), Ok(header));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FragmentHeader {
    session_index: SessionIndex,
    position: Position,
}

impl FragmentHeader {
    /// Create a new fragment header.
    #[must_use]
    pub const fn new(session_index: SessionIndex, position: Position) -> Self {
        Self {
            session_index,
            position,
        }
    }

    /// Return the session tag.
    #[must_use]
    pub const fn session_index(&self) -> SessionIndex { self.session_index }

    /// Return the signed position.
    #[must_use]
    pub const fn position(&self) -> Position { self.position }

    /// Encode the header into its two wire bytes.
    #[must_use]
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        [self.session_index.get(), self.position.get().to_ne_bytes()[0]]
    }

    /// Parse the header from the start of `bytes`; trailing bytes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::Malformed`] when fewer than [`HEADER_LEN`]
    /// bytes are available and [`FragmentError::ZeroPosition`] when the
    /// position byte is zero.
    pub fn decode(bytes: &[u8]) -> Result<Self, FragmentError> {
        let [index, position, ..] = *bytes else {
            return Err(FragmentError::Malformed { len: bytes.len() });
        };
        let position = Position::from_raw(i8::from_ne_bytes([position]))
            .ok_or(FragmentError::ZeroPosition)?;
        Ok(Self::new(SessionIndex::new(index), position))
    }
}

/// Decode a header into its `(session index, position)` pair.
///
/// # Errors
///
/// See [`FragmentHeader::decode`].
pub fn decode_header(bytes: &[u8]) -> Result<(SessionIndex, Position), FragmentError> {
    let header = FragmentHeader::decode(bytes)?;
    Ok((header.session_index(), header.position()))
}
