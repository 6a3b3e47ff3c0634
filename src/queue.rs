//! FIFO of outbound frames awaiting paced transmission.
//!
//! Each frame is split up front into a [`SplitJob`]. The sender loop drains
//! one fragment at a time from the head job only, so fragments of different
//! frames never interleave on the radio. Pacing is the caller's concern: the
//! queue itself is drained synchronously.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::debug;

use crate::fragment::{Fragment, FragmentationError, SessionIndex, encode};

/// Reasons a frame could not be queued.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue already holds `limit` frames.
    #[error("outgoing queue full: limit is {limit} frames")]
    Full { limit: usize },
    /// The frame could not be split.
    #[error(transparent)]
    Fragmentation(#[from] FragmentationError),
}

#[derive(Debug)]
struct SplitJob {
    session_index: SessionIndex,
    fragments: Vec<Fragment>,
    cursor: usize,
}

impl SplitJob {
    fn advance(&mut self) -> Option<Fragment> {
        let fragment = self.fragments.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(fragment)
    }

    fn is_exhausted(&self) -> bool { self.cursor >= self.fragments.len() }

    fn remaining(&self) -> usize { self.fragments.len().saturating_sub(self.cursor) }
}

/// Ordered queue of split frames with a cyclic session counter.
#[derive(Debug, Default)]
pub struct OutgoingQueue {
    jobs: VecDeque<SplitJob>,
    next_index: SessionIndex,
    limit: Option<usize>,
}

impl OutgoingQueue {
    /// Create an empty queue whose first frame uses session index 0.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create an empty queue starting from `start_at`.
    #[must_use]
    pub fn with_starting_index(start_at: SessionIndex) -> Self {
        Self {
            jobs: VecDeque::new(),
            next_index: start_at,
            limit: None,
        }
    }

    /// Refuse new frames while `limit` frames are already pending.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Split `frame` and append it behind any pending frames.
    ///
    /// Returns the session index assigned to the frame. The counter only
    /// advances when the frame is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`EnqueueError::Full`] when the pending-frame limit is reached
    /// and [`EnqueueError::Fragmentation`] when `max_payload` is zero or the
    /// frame needs too many fragments.
    pub fn enqueue(&mut self, frame: &[u8], max_payload: usize) -> Result<SessionIndex, EnqueueError> {
        if let Some(limit) = self.limit
            && self.jobs.len() >= limit
        {
            return Err(EnqueueError::Full { limit });
        }
        let session_index = self.next_index;
        let fragments = encode(session_index, frame, max_payload)?;
        debug!(
            session = %session_index,
            fragments = fragments.len(),
            bytes = frame.len(),
            "frame queued"
        );
        self.jobs.push_back(SplitJob {
            session_index,
            fragments,
            cursor: 0,
        });
        self.next_index = session_index.next();
        Ok(session_index)
    }

    /// Take the next fragment of the head frame.
    ///
    /// Exhausted jobs are removed before the next one is considered, so
    /// fragments always come from the current head.
    pub fn next_fragment(&mut self) -> Option<Fragment> {
        loop {
            let head = self.jobs.front_mut()?;
            let fragment = head.advance();
            if head.is_exhausted() {
                self.jobs.pop_front();
            }
            if fragment.is_some() {
                return fragment;
            }
        }
    }

    /// Session index of the frame currently being drained.
    #[must_use]
    pub fn current_session(&self) -> Option<SessionIndex> {
        self.jobs.front().map(|job| job.session_index)
    }

    /// Number of frames still pending, including a partially sent head.
    #[must_use]
    pub fn len(&self) -> usize { self.jobs.len() }

    /// Whether nothing is waiting to be sent.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.jobs.is_empty() }

    /// Number of fragments still to be sent across all frames.
    #[must_use]
    pub fn pending_fragments(&self) -> usize { self.jobs.iter().map(SplitJob::remaining).sum() }

    /// Abandon every pending frame, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.jobs.len();
        self.jobs.clear();
        dropped
    }
}
