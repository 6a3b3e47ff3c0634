//! Host-facing interface tying the queue, the peer table, and the link
//! together.
//!
//! A [`MeshInterface`] owns one [`TransportSession`] plus the background
//! tasks that serve it: the paced sender loop and, depending on the
//! connection mode, either the bridge connector loop or the native device
//! event loop. Frames from the host go in through
//! [`MeshInterface::on_outbound_frame`]; reassembled frames come back out
//! through [`HostTransport::inbound`].

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use log::{debug, info, warn};
use tokio::sync::{Notify, watch};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::{ConnectionMode, HW_MTU, InterfaceConfig, NativeTarget},
    error::InterfaceError,
    fragment::{Fragment, PeerId, PeerSessionTable},
    metrics::{self, Direction, DropReason},
    queue::{EnqueueError, OutgoingQueue},
    transport::{
        DeviceConnector,
        InboundSink,
        LinkState,
        LinkWriter,
        OutboundPacket,
        TransportSession,
        bridged::{self, BridgeTarget},
        native,
    },
};

mod sender;


/// Smallest frame delivered to the host.
pub const MIN_FRAME_LEN: usize = 16;

/// The host transport stack the interface is attached to.
pub trait HostTransport: Send + Sync {
    /// Receive a fully reassembled frame from the interface named `interface`.
    fn inbound(&self, frame: Bytes, interface: &str);
}

struct Inner {
    config: InterfaceConfig,
    host: Arc<dyn HostTransport>,
    transport: Arc<TransportSession>,
    queue: Mutex<OutgoingQueue>,
    queued: Notify,
    peers: PeerSessionTable,
}

impl Inner {
    fn queue(&self) -> MutexGuard<'_, OutgoingQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_outbound_frame(&self, frame: &[u8]) {
        if !self.config.mode.is_bridged() && !self.transport.is_online() {
            debug!(
                "frame dropped: interface={}, reason=not connected, len={}",
                self.config.name,
                frame.len()
            );
            metrics::inc_dropped(DropReason::NotOnline);
            return;
        }
        match self.queue().enqueue(frame, self.config.max_payload) {
            Ok(_) => {
                metrics::inc_frames(Direction::Outbound);
                self.queued.notify_one();
            }
            Err(EnqueueError::Full { limit }) => {
                warn!(
                    "TX dropped (queue full): interface={}, limit={limit}, len={}",
                    self.config.name,
                    frame.len()
                );
                metrics::inc_dropped(DropReason::QueueFull);
            }
            Err(e) => warn!(
                "frame not queued: interface={}, len={}, error={e}",
                self.config.name,
                frame.len()
            ),
        }
    }
}

impl InboundSink for Inner {
    fn on_inbound_fragment(&self, peer: PeerId, fragment: Fragment) {
        let Some(frame) = self.peers.route(peer, fragment) else {
            return;
        };
        if frame.len() < MIN_FRAME_LEN {
            debug!(
                "discarding undersized frame: peer={peer}, len={}",
                frame.len()
            );
            metrics::inc_dropped(DropReason::Undersized);
            return;
        }
        self.transport.record_rx(frame.len());
        metrics::inc_frames(Direction::Inbound);
        self.host.inbound(frame, &self.config.name);
    }
}

/// A running Meshtastic interface.
///
/// Dropping the interface cancels its background tasks without waiting for
/// them; use [`MeshInterface::shutdown`] for an orderly stop.
pub struct MeshInterface {
    inner: Arc<Inner>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl MeshInterface {
    /// Start an interface.
    ///
    /// Bridged interfaces return immediately and connect in the background.
    /// Native interfaces open their device through `connector` before
    /// returning; the link comes online once the device reports it is
    /// established.
    ///
    /// # Errors
    ///
    /// Returns [`InterfaceError::MissingConnector`] for a native mode without
    /// a connector, and [`InterfaceError::Link`] when the device cannot be
    /// opened.
    pub async fn open(
        config: InterfaceConfig,
        host: Arc<dyn HostTransport>,
        connector: Option<&dyn DeviceConnector>,
    ) -> Result<Self, InterfaceError> {
        let transport = Arc::new(TransportSession::new(OutboundPacket::tunnel(
            config.hop_limit,
        )));
        let queue = OutgoingQueue::new().with_limit(config.max_pending_frames);
        let inner = Arc::new(Inner {
            peers: PeerSessionTable::new(config.reassembly_timeout),
            config,
            host,
            transport,
            queue: Mutex::new(queue),
            queued: Notify::new(),
        });
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        match inner.config.mode.clone() {
            ConnectionMode::Bridged { host, port } => {
                let target = BridgeTarget {
                    host,
                    port,
                    backoff: inner.config.backoff,
                };
                tracker.spawn(bridged::connector_loop(
                    Arc::clone(&inner.transport),
                    target,
                    Arc::clone(&inner),
                    shutdown.clone(),
                ));
            }
            ConnectionMode::Native(target) => {
                let connector = connector.ok_or(InterfaceError::MissingConnector)?;
                Self::open_native(&inner, &target, connector, &tracker, &shutdown).await?;
            }
        }

        tracker.spawn(sender::sender_loop(Arc::clone(&inner), shutdown.clone()));
        info!(
            "interface started: name={}, pacing_ms={}, max_payload={}",
            inner.config.name,
            inner.config.pacing.as_millis(),
            inner.config.max_payload
        );
        Ok(Self {
            inner,
            shutdown,
            tracker,
        })
    }

    async fn open_native(
        inner: &Arc<Inner>,
        target: &NativeTarget,
        connector: &dyn DeviceConnector,
        tracker: &TaskTracker,
        shutdown: &CancellationToken,
    ) -> Result<(), InterfaceError> {
        let transport = &inner.transport;
        transport.transition(LinkState::Connecting);
        let handle = match connector.connect(target).await {
            Ok(handle) => handle,
            Err(e) => {
                transport.transition(LinkState::Disconnected);
                warn!("device open failed: target={target}, error={e}");
                return Err(InterfaceError::Link(e));
            }
        };
        info!("device opened: target={target}");
        transport.attach(LinkWriter::Radio(handle.link)).await;

        let inner = Arc::clone(inner);
        let shutdown = shutdown.clone();
        let events = handle.events;
        tracker.spawn(async move {
            native::event_loop(&inner.transport, events, inner.as_ref(), &shutdown).await;
        });
        Ok(())
    }

    /// Queue a frame from the host for transmission.
    ///
    /// Native interfaces drop frames while their link is down. Bridged
    /// interfaces queue them until the bridge reconnects. Frames offered
    /// while `max_pending_frames` are already queued are dropped.
    pub fn on_outbound_frame(&self, frame: &[u8]) { self.inner.on_outbound_frame(frame); }

    /// Feed a fragment received from `peer`, delivering the frame it completes.
    pub fn on_inbound_fragment(&self, peer: PeerId, fragment: Fragment) {
        self.inner.on_inbound_fragment(peer, fragment);
    }

    /// Interface name as configured.
    #[must_use]
    pub fn name(&self) -> &str { &self.inner.config.name }

    /// Configuration the interface was opened with.
    #[must_use]
    pub fn config(&self) -> &InterfaceConfig { &self.inner.config }

    /// Whether the link is currently online.
    #[must_use]
    pub fn is_online(&self) -> bool { self.inner.transport.is_online() }

    /// Current link state.
    #[must_use]
    pub fn state(&self) -> LinkState { self.inner.transport.state() }

    /// Watch link state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LinkState> { self.inner.transport.subscribe() }

    /// Reassembled bytes delivered to the host.
    #[must_use]
    pub fn rx_bytes(&self) -> u64 { self.inner.transport.rx_bytes() }

    /// Fragment bytes written to the link.
    #[must_use]
    pub fn tx_bytes(&self) -> u64 { self.inner.transport.tx_bytes() }

    /// Frames waiting to be sent, including one partially sent.
    #[must_use]
    pub fn pending_frames(&self) -> usize { self.inner.queue().len() }

    /// Number of peers with a partially reassembled frame.
    #[must_use]
    pub fn pending_reassemblies(&self) -> usize { self.inner.peers.len() }

    /// Nominal bitrate advertised to the host.
    #[must_use]
    pub fn bitrate(&self) -> u64 { self.inner.config.bitrate }

    /// Hardware MTU advertised to the host.
    #[must_use]
    pub fn hw_mtu(&self) -> usize { HW_MTU }

    /// The mesh link is slow enough that host ingress limiting only hurts.
    #[must_use]
    pub fn should_ingress_limit(&self) -> bool { false }

    /// Stop the background tasks and close the link.
    ///
    /// Frames still queued are abandoned.
    pub async fn shutdown(self) {
        let transport = &self.inner.transport;
        transport.close();
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;

        let abandoned = self.inner.queue().clear();
        self.inner.peers.clear();
        transport.close_link().await;
        transport.transition(LinkState::Disconnected);
        info!(
            "interface stopped: name={}, abandoned_frames={abandoned}",
            self.inner.config.name
        );
    }
}

impl Drop for MeshInterface {
    fn drop(&mut self) {
        self.inner.transport.close();
        self.shutdown.cancel();
    }
}

impl fmt::Display for MeshInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MeshtasticInterface[{}]", self.inner.config.name)
    }
}

impl fmt::Debug for MeshInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshInterface")
            .field("name", &self.inner.config.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
