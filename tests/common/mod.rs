//! Shared utilities for integration tests.
//!
//! Provides a serialised logger fixture, a host that forwards delivered
//! frames over a channel, and a scripted native device.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    future::Future,
    io,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use logtest::Logger;
use rns_meshtastic::{
    HostTransport,
    LinkState,
    MeshInterface,
    NativeTarget,
    transport::{DeviceConnector, DeviceEvent, DeviceHandle, OutboundPacket, RadioLink},
};
use rstest::fixture;
use tokio::{sync::mpsc, time::timeout};

/// Upper bound for any single awaited step in a test.
pub const STEP: Duration = Duration::from_secs(5);

/// Await `fut`, failing the test if it takes longer than [`STEP`].
pub async fn within<F: Future>(fut: F) -> F::Output {
    timeout(STEP, fut).await.expect("step timed out")
}

/// Handle to the global logger with exclusive access.
pub struct LoggerHandle {
    guard: MutexGuard<'static, Logger>,
}

impl LoggerHandle {
    pub fn new() -> Self {
        static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| Mutex::new(Logger::start()));
        let guard = logger.lock().expect("logger poisoned");

        Self { guard }
    }
}

impl std::ops::Deref for LoggerHandle {
    type Target = Logger;

    fn deref(&self) -> &Self::Target { &self.guard }
}

impl std::ops::DerefMut for LoggerHandle {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.guard }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn logger() -> LoggerHandle { LoggerHandle::new() }

/// Host forwarding every delivered frame to a channel.
pub struct ChannelHost(mpsc::UnboundedSender<(Bytes, String)>);

impl HostTransport for ChannelHost {
    fn inbound(&self, frame: Bytes, interface: &str) {
        let _ = self.0.send((frame, interface.to_owned()));
    }
}

pub fn channel_host() -> (Arc<ChannelHost>, mpsc::UnboundedReceiver<(Bytes, String)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelHost(tx)), rx)
}

/// A deterministic frame of `len` bytes, at least as long as a Reticulum
/// header.
pub fn frame(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_add(u8::try_from(i % 251).expect("fits in u8")))
        .collect()
}

/// Resolve once `iface` reports `wanted`.
pub async fn wait_for_state(iface: &MeshInterface, wanted: LinkState) {
    let mut state = iface.subscribe();
    within(state.wait_for(|s| *s == wanted))
        .await
        .expect("state channel open");
}

/// Radio that forwards every transmitted packet to the test.
pub struct FakeRadio {
    sent: mpsc::UnboundedSender<(Bytes, OutboundPacket)>,
}

#[async_trait]
impl RadioLink for FakeRadio {
    async fn send_raw(&self, payload: Bytes, packet: &OutboundPacket) -> io::Result<()> {
        self.sent
            .send((payload, *packet))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "radio unplugged"))
    }
}

/// Connector that opens the scripted device once.
pub struct FakeConnector {
    handle: Mutex<Option<DeviceHandle>>,
    pub opened: Mutex<Vec<NativeTarget>>,
}

#[async_trait]
impl DeviceConnector for FakeConnector {
    async fn connect(&self, target: &NativeTarget) -> io::Result<DeviceHandle> {
        self.opened.lock().expect("lock").push(target.clone());
        self.handle
            .lock()
            .expect("lock")
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "device busy"))
    }
}

/// Test side of a scripted device.
pub struct DeviceControl {
    pub events: mpsc::Sender<DeviceEvent>,
    pub sent: mpsc::UnboundedReceiver<(Bytes, OutboundPacket)>,
}

impl DeviceControl {
    pub async fn emit(&self, event: DeviceEvent) {
        within(self.events.send(event))
            .await
            .expect("device event loop alive");
    }

    pub async fn next_sent(&mut self) -> (Bytes, OutboundPacket) {
        within(self.sent.recv()).await.expect("radio open")
    }
}

pub fn fake_device() -> (FakeConnector, DeviceControl) {
    let (events_tx, events_rx) = mpsc::channel(32);
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let handle = DeviceHandle {
        link: Arc::new(FakeRadio { sent: sent_tx }),
        events: events_rx,
    };
    (
        FakeConnector {
            handle: Mutex::new(Some(handle)),
            opened: Mutex::new(Vec::new()),
        },
        DeviceControl {
            events: events_tx,
            sent: sent_rx,
        },
    )
}
