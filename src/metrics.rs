//! Metric helpers for `rns_meshtastic`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking fragments written to or read from the link.
pub const FRAGMENTS_TOTAL: &str = "rns_meshtastic_fragments_total";
/// Name of the counter tracking whole frames queued or delivered.
pub const FRAMES_TOTAL: &str = "rns_meshtastic_frames_total";
/// Name of the counter tracking discarded traffic.
pub const DROPPED_TOTAL: &str = "rns_meshtastic_dropped_total";
/// Name of the gauge mirroring link liveness.
pub const LINK_ONLINE: &str = "rns_meshtastic_link_online";

/// Direction of traffic.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Traffic arriving from the radio link.
    Inbound,
    /// Traffic leaving towards the radio link.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Why traffic was discarded.
#[derive(Clone, Copy, Debug)]
pub enum DropReason {
    /// Undersized or corrupt fragment header.
    Malformed,
    /// Terminal fragment arrived while ordinals were missing.
    Incomplete,
    /// A fragment or frame was offered while the link was down.
    NotOnline,
    /// A bridged line that was not a protocol fragment.
    Noise,
    /// A reassembled frame too short to be a Reticulum packet.
    Undersized,
    /// The outgoing queue already held its limit of frames.
    QueueFull,
}

impl DropReason {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            DropReason::Malformed => "malformed",
            DropReason::Incomplete => "incomplete",
            DropReason::NotOnline => "not_online",
            DropReason::Noise => "noise",
            DropReason::Undersized => "undersized",
            DropReason::QueueFull => "queue_full",
        }
    }
}

/// Record a fragment crossing the link.
#[cfg(feature = "metrics")]
pub fn inc_fragments(direction: Direction) {
    counter!(FRAGMENTS_TOTAL, "direction" => direction.as_str()).increment(1);
}

/// Record a whole frame queued or delivered.
#[cfg(feature = "metrics")]
pub fn inc_frames(direction: Direction) {
    counter!(FRAMES_TOTAL, "direction" => direction.as_str()).increment(1);
}

/// Record discarded traffic.
#[cfg(feature = "metrics")]
pub fn inc_dropped(reason: DropReason) {
    counter!(DROPPED_TOTAL, "reason" => reason.as_str()).increment(1);
}

/// Mirror link liveness into the gauge.
#[cfg(feature = "metrics")]
pub fn set_link_online(online: bool) { gauge!(LINK_ONLINE).set(if online { 1.0 } else { 0.0 }); }

#[cfg(not(feature = "metrics"))]
pub fn inc_fragments(_direction: Direction) {}

#[cfg(not(feature = "metrics"))]
pub fn inc_frames(_direction: Direction) {}

#[cfg(not(feature = "metrics"))]
pub fn inc_dropped(_reason: DropReason) {}

#[cfg(not(feature = "metrics"))]
pub fn set_link_online(_online: bool) {}
