//! Ownership of the single device or bridge connection.
//!
//! [`TransportSession`] holds the connection's writing half, its
//! [`LinkState`], and the byte counters. The reading side is driven by
//! [`bridged::connector_loop`] or [`native::event_loop`], which push received
//! fragments into an [`InboundSink`].

use std::{
    fmt,
    io,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::SinkExt;
use log::{debug, info, warn};
use tokio::{
    io::AsyncWrite,
    select,
    sync::{Mutex, watch},
};
use tokio_util::{codec::FramedWrite, sync::CancellationToken};

use crate::{
    fragment::{Fragment, PeerId},
    metrics::{self, Direction, DropReason},
};

pub mod backoff;
pub mod bridged;
pub mod codec;
pub mod device;
pub mod native;
pub mod state;

pub use backoff::{Backoff, BackoffConfig};
pub use codec::{LineCodec, LineFrame, NoiseKind};
pub use device::{
    DeviceConnector,
    DeviceEvent,
    DeviceHandle,
    Destination,
    OutboundPacket,
    RETICULUM_TUNNEL_PORT,
    RadioLink,
};
pub use state::LinkState;

/// Receiver of fragments read from the link.
///
/// Implementations must not block: they run on the link's read task.
pub trait InboundSink: Send + Sync {
    fn on_inbound_fragment(&self, peer: PeerId, fragment: Fragment);
}

type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Writing half of whichever link is currently attached.
pub enum LinkWriter {
    /// A native device link.
    Radio(Arc<dyn RadioLink>),
    /// A bridged socket. `dropped` is cancelled when a write fails so the
    /// reader can tear the connection down.
    Socket {
        sink: FramedWrite<BoxedWrite, LineCodec>,
        dropped: CancellationToken,
    },
}

impl LinkWriter {
    /// Wrap the write half of a bridged socket.
    pub fn socket<W>(writer: W, dropped: CancellationToken) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::Socket {
            sink: FramedWrite::new(Box::new(writer), LineCodec::new()),
            dropped,
        }
    }
}

impl fmt::Debug for LinkWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio(_) => f.write_str("LinkWriter::Radio"),
            Self::Socket { .. } => f.write_str("LinkWriter::Socket"),
        }
    }
}

/// State, writer, and counters for one interface's connection.
pub struct TransportSession {
    state: watch::Sender<LinkState>,
    writer: Mutex<Option<LinkWriter>>,
    closed: CancellationToken,
    packet: OutboundPacket,
    rx_bytes: AtomicU64,
    tx_bytes: AtomicU64,
}

impl fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession")
            .field("state", &self.state())
            .field("packet", &self.packet)
            .field("rx_bytes", &self.rx_bytes())
            .field("tx_bytes", &self.tx_bytes())
            .finish_non_exhaustive()
    }
}

impl TransportSession {
    /// Create a disconnected session addressing native packets with `packet`.
    #[must_use]
    pub fn new(packet: OutboundPacket) -> Self {
        let (state, _) = watch::channel(LinkState::Disconnected);
        Self {
            state,
            writer: Mutex::new(None),
            closed: CancellationToken::new(),
            packet,
            rx_bytes: AtomicU64::new(0),
            tx_bytes: AtomicU64::new(0),
        }
    }

    /// Current link state.
    #[must_use]
    pub fn state(&self) -> LinkState { *self.state.borrow() }

    /// Whether fragments may currently be written.
    #[must_use]
    pub fn is_online(&self) -> bool { self.state().is_online() }

    /// Watch link state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LinkState> { self.state.subscribe() }

    /// Move to `next` if the transition is legal.
    ///
    /// Returns `true` when the state changed. Once `Closing`, the only
    /// accepted move is to `Disconnected`, and after [`close`](Self::close)
    /// the session never leaves `Disconnected` again.
    pub fn transition(&self, next: LinkState) -> bool {
        let closed = self.is_closed();
        let mut previous = next;
        let changed = self.state.send_if_modified(|current| {
            if *current == next || !current.can_transition_to(next) {
                return false;
            }
            if closed && !matches!(next, LinkState::Closing | LinkState::Disconnected) {
                return false;
            }
            previous = std::mem::replace(current, next);
            true
        });
        if changed {
            info!("link state changed: from={previous}, to={next}");
            metrics::set_link_online(next.is_online());
        }
        changed
    }

    /// Mark the session as shutting down.
    ///
    /// Any write in progress is abandoned and the state moves to `Closing`.
    /// The session cannot come back online afterwards. Later calls do
    /// nothing.
    pub fn close(&self) {
        if self.is_closed() {
            return;
        }
        self.closed.cancel();
        self.transition(LinkState::Closing);
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed.is_cancelled() }

    /// Install the writing half of a freshly opened link.
    pub async fn attach(&self, writer: LinkWriter) { *self.writer.lock().await = Some(writer); }

    /// Remove and return the current writer.
    pub async fn detach(&self) -> Option<LinkWriter> { self.writer.lock().await.take() }

    /// Write one fragment to the link.
    ///
    /// Returns `true` when the fragment was written. While the link is not
    /// online the fragment is dropped and counters are left untouched. A
    /// failed write takes a native link down and asks a bridged reader to
    /// drop its socket.
    ///
    /// A write blocked on a stalled peer is abandoned as soon as the session
    /// is closed or the bridged reader drops the socket, releasing the
    /// writer for [`detach`](Self::detach).
    pub async fn send(&self, fragment: &Fragment) -> bool {
        if !self.is_online() {
            return Self::drop_offline();
        }
        let mut guard = select! {
            biased;
            () = self.closed.cancelled() => return Self::drop_offline(),
            guard = self.writer.lock() => guard,
        };
        let Some(writer) = guard.as_mut() else {
            return Self::drop_offline();
        };
        let wire_len = fragment.wire_len() as u64;
        let result = match writer {
            LinkWriter::Radio(link) => select! {
                biased;
                () = self.closed.cancelled() => Err(closing()),
                res = link.send_raw(fragment.to_wire(), &self.packet) => res,
            },
            LinkWriter::Socket { sink, dropped } => select! {
                biased;
                () = self.closed.cancelled() => Err(closing()),
                () = dropped.cancelled() => Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "bridge connection dropped",
                )),
                res = sink.send(fragment.clone()) => res,
            },
        };
        match result {
            Ok(()) => {
                self.tx_bytes.fetch_add(wire_len, Ordering::Relaxed);
                metrics::inc_fragments(Direction::Outbound);
                true
            }
            Err(_) if self.is_closed() => {
                debug!("TX abandoned: session closing");
                false
            }
            Err(e) => {
                warn!("TX failed: error={e}");
                let native = matches!(writer, LinkWriter::Radio(_));
                if let LinkWriter::Socket { dropped, .. } = writer {
                    dropped.cancel();
                }
                drop(guard);
                if native {
                    self.transition(LinkState::Disconnected);
                }
                false
            }
        }
    }

    fn drop_offline() -> bool {
        warn!("TX dropped (not connected)");
        metrics::inc_dropped(DropReason::NotOnline);
        false
    }

    /// Count `len` reassembled bytes delivered to the host.
    pub fn record_rx(&self, len: usize) { self.rx_bytes.fetch_add(len as u64, Ordering::Relaxed); }

    /// Total reassembled bytes delivered to the host.
    #[must_use]
    pub fn rx_bytes(&self) -> u64 { self.rx_bytes.load(Ordering::Relaxed) }

    /// Total fragment wire bytes written to the link.
    #[must_use]
    pub fn tx_bytes(&self) -> u64 { self.tx_bytes.load(Ordering::Relaxed) }

    /// Release the current writer, closing a native device.
    pub async fn close_link(&self) {
        if let Some(LinkWriter::Radio(link)) = self.detach().await
            && let Err(e) = link.close().await
        {
            warn!("failed to close device: error={e}");
        }
    }
}

fn closing() -> io::Error { io::Error::new(io::ErrorKind::Interrupted, "session closing") }
