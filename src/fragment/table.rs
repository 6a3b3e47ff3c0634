//! Per-peer routing of inbound fragments to their reassembly session.
//!
//! `PeerSessionTable` holds at most one live [`ReassemblySession`] per peer.
//! A fragment carrying a different session index than the stored session
//! replaces it outright: the sender moved on, so the partial data is lost.
//! Entries are removed as soon as their message assembles.

use std::{
    fmt,
    hash::Hash,
    time::{Duration, Instant},
};

use bytes::Bytes;
use dashmap::{DashMap, mapref::entry::Entry};
use log::{debug, warn};

use super::{Fragment, ReassemblySession};

/// Identity used to key reassembly state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PeerId {
    /// A radio node reached through a native device link.
    Node(u32),
    /// The single logical peer behind a bridged socket.
    Bridge,
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(num) => write!(f, "!{num:08x}"),
            Self::Bridge => f.write_str("bridge"),
        }
    }
}

#[derive(Debug)]
struct PeerEntry {
    session: ReassemblySession,
    last_seen: Instant,
}

/// Concurrent map from peer identity to its in-progress message.
///
/// Peers never share state, so routing for one peer only contends on that
/// peer's shard.
#[derive(Debug)]
pub struct PeerSessionTable<P = PeerId>
where
    P: Eq + Hash,
{
    sessions: DashMap<P, PeerEntry>,
    idle_timeout: Option<Duration>,
}

impl<P> Default for PeerSessionTable<P>
where
    P: Eq + Hash + Clone + fmt::Display,
{
    fn default() -> Self { Self::new(None) }
}

impl<P> PeerSessionTable<P>
where
    P: Eq + Hash + Clone + fmt::Display,
{
    /// Create a table. With `idle_timeout` set, sessions untouched for that
    /// long are purged before each routing call.
    #[must_use]
    pub fn new(idle_timeout: Option<Duration>) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    /// Route `fragment` from `peer` using the current time.
    ///
    /// Returns the assembled frame when this fragment completes a message.
    pub fn route(&self, peer: P, fragment: Fragment) -> Option<Bytes> {
        self.route_at(peer, fragment, Instant::now())
    }

    /// Route `fragment` from `peer` using an explicit clock reading.
    pub fn route_at(&self, peer: P, fragment: Fragment, now: Instant) -> Option<Bytes> {
        if self.idle_timeout.is_some() {
            self.purge_idle_at(now);
        }

        let index = fragment.session_index();
        match self.sessions.entry(peer) {
            Entry::Occupied(mut occupied) => {
                let stale = occupied.get().session.session_index();
                if stale != index {
                    debug!(
                        "replacing reassembly session: peer={}, stale={stale}, new={index}",
                        occupied.key()
                    );
                    occupied.insert(PeerEntry {
                        session: ReassemblySession::new(index),
                        last_seen: now,
                    });
                }

                let entry = occupied.get_mut();
                entry.last_seen = now;
                match entry.session.ingest(fragment) {
                    Ok(None) => None,
                    Ok(Some(frame)) => {
                        occupied.remove();
                        Some(frame)
                    }
                    Err(err) => {
                        warn!("dropping reassembly session: peer={}, error={err}", occupied.key());
                        occupied.remove();
                        None
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let mut session = ReassemblySession::new(index);
                match session.ingest(fragment) {
                    Ok(None) => {
                        vacant.insert(PeerEntry {
                            session,
                            last_seen: now,
                        });
                        None
                    }
                    Ok(Some(frame)) => Some(frame),
                    Err(err) => {
                        warn!("rejected first fragment: peer={}, error={err}", vacant.key());
                        None
                    }
                }
            }
        }
    }

    /// Drop sessions idle beyond the configured timeout.
    ///
    /// Returns the evicted peers; empty when no timeout is configured.
    pub fn purge_idle_at(&self, now: Instant) -> Vec<P> {
        let Some(timeout) = self.idle_timeout else {
            return Vec::new();
        };
        let mut evicted = Vec::new();
        self.sessions.retain(|peer, entry| {
            let expired = now.saturating_duration_since(entry.last_seen) >= timeout;
            if expired {
                evicted.push(peer.clone());
            }
            !expired
        });
        if !evicted.is_empty() {
            debug!("evicted idle reassembly sessions: count={}", evicted.len());
        }
        evicted
    }

    /// Whether `peer` has a partial message buffered.
    #[must_use]
    pub fn contains(&self, peer: &P) -> bool { self.sessions.contains_key(peer) }

    /// Number of peers with a partial message.
    #[must_use]
    pub fn len(&self) -> usize { self.sessions.len() }

    /// Whether no partial messages are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.sessions.is_empty() }

    /// Forget all partial state.
    pub fn clear(&self) { self.sessions.clear(); }
}
