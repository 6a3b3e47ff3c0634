//! Link lifecycle states.

use std::fmt;

/// Lifecycle of the single connection owned by a transport session.
///
/// `Disconnected -> Connecting -> Online -> Disconnected` repeats per
/// attempt; `Closing` is entered on shutdown and only leads to a final
/// `Disconnected`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Online,
    Closing,
}

impl LinkState {
    /// Whether fragments may be written.
    #[must_use]
    pub const fn is_online(self) -> bool { matches!(self, Self::Online) }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Closing, Self::Disconnected) => true,
            (Self::Closing, _) => false,
            (_, Self::Closing) => true,
            (Self::Disconnected, Self::Connecting | Self::Online)
            | (Self::Connecting, Self::Online | Self::Disconnected)
            | (Self::Online, Self::Disconnected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Online => "online",
            Self::Closing => "closing",
        })
    }
}
