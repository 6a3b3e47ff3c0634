//! End-to-end tests for the TCP bridge mode against a loopback listener.

mod common;

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use common::{channel_host, frame, wait_for_state, within};
use rns_meshtastic::{
    Fragment,
    InterfaceConfig,
    LinkState,
    MeshInterface,
    PeerId,
    PeerSessionTable,
    SessionIndex,
    encode,
    transport::BackoffConfig,
};
use rstest::rstest;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{TcpListener, TcpStream, tcp::OwnedReadHalf},
    time::sleep,
};

const NAME: &str = "bridge-test";

fn config(port: u16) -> InterfaceConfig {
    let mut config = InterfaceConfig::bridged("127.0.0.1", port);
    config.name = NAME.into();
    config.pacing = Duration::from_millis(5);
    config.backoff = BackoffConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    };
    config
}

async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind listener");
    listener.local_addr().expect("local addr").port()
}

async fn accept(listener: &TcpListener) -> TcpStream {
    let (stream, _) = within(listener.accept()).await.expect("accept");
    stream
}

/// Read lines from the bridge until they reassemble into one frame.
async fn read_frame(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Bytes {
    let table = PeerSessionTable::new(None);
    loop {
        let line = within(lines.next_line())
            .await
            .expect("read line")
            .expect("bridge open");
        let wire = STANDARD.decode(line).expect("base64 line");
        let fragment = Fragment::from_wire(wire.into()).expect("valid fragment");
        if let Some(frame) = table.route(PeerId::Bridge, fragment) {
            return frame;
        }
    }
}

fn lines_for(index: u8, payload: &[u8]) -> Vec<u8> {
    encode(SessionIndex::new(index), payload, 200)
        .expect("split")
        .iter()
        .flat_map(|fragment| {
            let mut line = STANDARD.encode(fragment.to_wire()).into_bytes();
            line.push(b'\n');
            line
        })
        .collect()
}

#[rstest]
#[tokio::test]
async fn outbound_frames_are_written_as_base64_lines() {
    let (listener, port) = listener().await;
    let (host, _delivered) = channel_host();
    let iface = MeshInterface::open(config(port), host, None)
        .await
        .expect("open interface");

    let (read, _write) = accept(&listener).await.into_split();
    wait_for_state(&iface, LinkState::Online).await;

    let payload = frame(1, 500);
    iface.on_outbound_frame(&payload);
    let mut lines = BufReader::new(read).lines();
    assert_eq!(read_frame(&mut lines).await, Bytes::from(payload));

    within(async {
        while iface.tx_bytes() < 506 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert_eq!(iface.tx_bytes(), 506);
    iface.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn inbound_lines_reach_the_host_and_noise_is_ignored() {
    let (listener, port) = listener().await;
    let (host, mut delivered) = channel_host();
    let iface = MeshInterface::open(config(port), host, None)
        .await
        .expect("open interface");
    let mut socket = accept(&listener).await;
    wait_for_state(&iface, LinkState::Online).await;

    let short = frame(7, 20);
    socket
        .write_all(b"not-base64!!\nAQ==\n")
        .await
        .expect("write");
    socket
        .write_all(&lines_for(1, &short))
        .await
        .expect("write");
    let (received, name) = within(delivered.recv()).await.expect("host open");
    assert_eq!(received, Bytes::from(short.clone()));
    assert_eq!(name, NAME);
    assert_eq!(iface.rx_bytes(), short.len() as u64);
    assert_eq!(iface.pending_reassemblies(), 0);

    let long = frame(9, 450);
    socket
        .write_all(&lines_for(2, &long))
        .await
        .expect("write");
    let (received, _) = within(delivered.recv()).await.expect("host open");
    assert_eq!(received, Bytes::from(long.clone()));
    assert_eq!(iface.rx_bytes(), (short.len() + long.len()) as u64);
    assert!(delivered.try_recv().is_err());

    iface.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn frames_queued_while_offline_are_sent_after_connecting() {
    let port = closed_port();
    let (host, _delivered) = channel_host();
    let iface = MeshInterface::open(config(port), host, None)
        .await
        .expect("open interface");

    let payload = frame(3, 64);
    iface.on_outbound_frame(&payload);
    assert!(!iface.is_online());
    assert_eq!(iface.pending_frames(), 1);
    sleep(Duration::from_millis(30)).await;
    assert_eq!(iface.pending_frames(), 1);

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("rebind bridge port");
    let (read, _write) = accept(&listener).await.into_split();
    let mut lines = BufReader::new(read).lines();
    assert_eq!(read_frame(&mut lines).await, Bytes::from(payload));
    iface.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn bridge_reconnects_after_the_peer_hangs_up() {
    let (listener, port) = listener().await;
    let (host, _delivered) = channel_host();
    let iface = MeshInterface::open(config(port), host, None)
        .await
        .expect("open interface");

    let first = accept(&listener).await;
    wait_for_state(&iface, LinkState::Online).await;
    drop(first);

    let (read, _write) = accept(&listener).await.into_split();
    wait_for_state(&iface, LinkState::Online).await;
    let payload = frame(5, 100);
    iface.on_outbound_frame(&payload);
    let mut lines = BufReader::new(read).lines();
    assert_eq!(read_frame(&mut lines).await, Bytes::from(payload));
    iface.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn shutdown_interrupts_the_reconnect_loop() {
    let (host, _delivered) = channel_host();
    let iface = MeshInterface::open(config(closed_port()), host, None)
        .await
        .expect("open interface");
    iface.on_outbound_frame(&frame(1, 32));

    let state = iface.subscribe();
    within(iface.shutdown()).await;
    assert_eq!(*state.borrow(), LinkState::Disconnected);
}

#[rstest]
#[tokio::test]
async fn shutdown_completes_while_the_bridge_is_not_reading() {
    let (listener, port) = listener().await;
    let (host, _delivered) = channel_host();
    let mut config = config(port);
    config.pacing = Duration::ZERO;
    config.max_pending_frames = 4096;
    let iface = MeshInterface::open(config, host, None)
        .await
        .expect("open interface");
    let _stalled = accept(&listener).await;
    wait_for_state(&iface, LinkState::Online).await;

    for seed in (0..=u8::MAX).cycle().take(1000) {
        iface.on_outbound_frame(&frame(seed, 20_000));
    }

    within(async {
        loop {
            let before = iface.tx_bytes();
            sleep(Duration::from_millis(100)).await;
            if before > 0 && iface.tx_bytes() == before {
                break;
            }
        }
    })
    .await;
    assert!(iface.pending_frames() > 0);

    let state = iface.subscribe();
    within(iface.shutdown()).await;
    assert_eq!(*state.borrow(), LinkState::Disconnected);
}
