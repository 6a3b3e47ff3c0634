//! Inbound accumulator that stitches one session's fragments back together.
//!
//! [`ReassemblySession`] buffers fragments keyed by ordinal, so arrival order
//! does not matter. Once the terminal fragment has been seen every further
//! fragment triggers an assembly attempt; assembly succeeds only when the
//! buffered ordinals form the gap-free run `1..=max`.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use log::debug;

use super::{Fragment, ReassemblyError, SessionIndex};
use crate::metrics::{self, DropReason};

/// Partial message received from a single peer.
#[derive(Debug)]
pub struct ReassemblySession {
    session_index: SessionIndex,
    fragments: BTreeMap<u8, Bytes>,
    terminal: Option<u8>,
    complete: bool,
}

impl ReassemblySession {
    /// Start an empty session for `session_index`.
    #[must_use]
    pub fn new(session_index: SessionIndex) -> Self {
        Self {
            session_index,
            fragments: BTreeMap::new(),
            terminal: None,
            complete: false,
        }
    }

    /// Session tag this accumulator accepts.
    #[must_use]
    pub const fn session_index(&self) -> SessionIndex { self.session_index }

    /// Whether the session has already produced its message.
    #[must_use]
    pub const fn is_complete(&self) -> bool { self.complete }

    /// Number of distinct ordinals currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize { self.fragments.len() }

    /// Feed a fragment into the session.
    ///
    /// Returns `Ok(Some(frame))` with the concatenated payloads once the
    /// message is complete, and `Ok(None)` while fragments are missing. A
    /// repeated ordinal overwrites the earlier copy.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::SessionMismatch`] for a fragment tagged with
    /// another session and [`ReassemblyError::AlreadyComplete`] once the
    /// message has been produced.
    pub fn ingest(&mut self, fragment: Fragment) -> Result<Option<Bytes>, ReassemblyError> {
        if fragment.session_index() != self.session_index {
            return Err(ReassemblyError::SessionMismatch {
                expected: self.session_index,
                found: fragment.session_index(),
            });
        }
        if self.complete {
            return Err(ReassemblyError::AlreadyComplete(self.session_index));
        }

        let position = fragment.position();
        self.fragments
            .insert(position.ordinal(), fragment.into_payload());
        if position.is_terminal() {
            self.terminal = Some(position.ordinal());
        }
        if self.terminal.is_none() {
            return Ok(None);
        }

        let assembled = self.assemble();
        if assembled.is_none() && position.is_terminal() {
            debug!(
                "incomplete assembly: session={}, buffered={}, terminal={}",
                self.session_index,
                self.fragments.len(),
                position.ordinal(),
            );
            metrics::inc_dropped(DropReason::Incomplete);
        }
        Ok(assembled)
    }

    fn assemble(&mut self) -> Option<Bytes> {
        let max = *self.fragments.keys().next_back()?;
        if !self.fragments.keys().copied().eq(1..=max) {
            return None;
        }

        let len = self.fragments.values().map(Bytes::len).sum();
        let mut frame = BytesMut::with_capacity(len);
        for chunk in std::mem::take(&mut self.fragments).into_values() {
            frame.extend_from_slice(&chunk);
        }
        self.complete = true;
        Some(frame.freeze())
    }
}
