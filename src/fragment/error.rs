//! Error types emitted by the fragmentation layer.
//!
//! None of these reach the host transport: inbound errors are logged and the
//! fragment dropped, outbound errors drop the frame.

use thiserror::Error;

use super::SessionIndex;

/// Errors raised while parsing an inbound fragment.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FragmentError {
    /// The input is shorter than the two-byte header.
    #[error("malformed fragment: {len} bytes is shorter than the header")]
    Malformed { len: usize },
    /// The position byte was zero, which names no ordinal.
    #[error("malformed fragment: position 0 is not a valid ordinal")]
    ZeroPosition,
}

/// Errors raised while splitting an outbound frame.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FragmentationError {
    /// The per-fragment payload budget was zero.
    #[error("invalid fragment payload size: must be at least 1 byte")]
    InvalidMaxPayload,
    /// The frame needs more fragments than a signed position byte can address.
    #[error("frame needs {required} fragments, limit is {limit}")]
    TooManyFragments { required: usize, limit: usize },
}

/// Errors raised by a [`ReassemblySession`](crate::fragment::ReassemblySession).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// The fragment belongs to a different session.
    #[error("fragment session mismatch: expected {expected}, found {found}")]
    SessionMismatch {
        expected: SessionIndex,
        found: SessionIndex,
    },
    /// The session already produced its message.
    #[error("reassembly session {0} already complete")]
    AlreadyComplete(SessionIndex),
}
