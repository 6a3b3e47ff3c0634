//! Session tags and sign-encoded fragment positions.
//!
//! [`SessionIndex`] is a one-byte tag reused cyclically by a sender to tell
//! successive messages apart. [`Position`] folds the fragment ordinal and the
//! "last fragment" marker into a single signed byte: non-terminal fragments
//! carry their 1-based ordinal, the terminal fragment carries its negation.

use derive_more::{Display, From, Into};

/// One-byte tag shared by every fragment of a single message.
///
/// # Examples
///
/// ```
/// use rns_meshtastic::fragment::SessionIndex;
/// let index = SessionIndex::new(255);
/// assert_eq!(index.next(), SessionIndex::new(0));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, From, Into)]
#[display("{_0}")]
pub struct SessionIndex(u8);

impl SessionIndex {
    /// Wrap a raw session tag.
    #[must_use]
    pub const fn new(value: u8) -> Self { Self(value) }

    /// Return the raw tag.
    #[must_use]
    pub const fn get(self) -> u8 { self.0 }

    /// Return the following index, wrapping from 255 back to 0.
    #[must_use]
    pub const fn next(self) -> Self { Self(self.0.wrapping_add(1)) }
}

/// Signed fragment position.
///
/// The magnitude is the fragment's 1-based ordinal. A negative value marks
/// the terminal fragment of its session, so a message can span at most
/// [`i8::MAX`] fragments.
///
/// # Examples
///
/// ```
/// use rns_meshtastic::fragment::Position;
/// let last = Position::new(3, true).expect("ordinal in range");
/// assert_eq!(last.get(), -3);
/// assert_eq!(last.ordinal(), 3);
/// assert!(last.is_terminal());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[display("{_0}")]
pub struct Position(i8);

impl Position {
    /// Build a position from a 1-based ordinal.
    ///
    /// Returns `None` when `ordinal` is zero or exceeds [`i8::MAX`].
    #[must_use]
    pub fn new(ordinal: u8, is_terminal: bool) -> Option<Self> {
        if ordinal == 0 {
            return None;
        }
        let magnitude = i8::try_from(ordinal).ok()?;
        Some(Self(if is_terminal { -magnitude } else { magnitude }))
    }

    /// Interpret a raw header byte. Zero does not name an ordinal.
    #[must_use]
    pub const fn from_raw(raw: i8) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    /// Return the signed wire value.
    #[must_use]
    pub const fn get(self) -> i8 { self.0 }

    /// Return the 1-based ordinal.
    #[must_use]
    pub const fn ordinal(self) -> u8 { self.0.unsigned_abs() }

    /// Report whether this position marks the last fragment of its session.
    #[must_use]
    pub const fn is_terminal(self) -> bool { self.0 < 0 }
}
