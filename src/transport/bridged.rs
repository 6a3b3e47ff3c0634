//! TCP bridge to a Meshtastic companion app.
//!
//! The connector keeps one socket open at a time, reconnecting with
//! exponential back-off whenever the connection attempt fails or the socket
//! drops. Only cancellation of `shutdown` ends the loop.

use std::sync::Arc;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    select,
    time::sleep,
};
use tokio_util::{codec::FramedRead, sync::CancellationToken};

use super::{
    Backoff,
    BackoffConfig,
    InboundSink,
    LineCodec,
    LineFrame,
    LinkState,
    LinkWriter,
    TransportSession,
};
use crate::{
    fragment::PeerId,
    metrics::{self, Direction, DropReason},
};

/// Address and retry policy for the bridge.
#[derive(Clone, Debug)]
pub struct BridgeTarget {
    pub host: String,
    pub port: u16,
    pub backoff: BackoffConfig,
}

/// Connect, serve, and reconnect until `shutdown` is cancelled.
///
/// Each successful connection resets the back-off. The session is left
/// `Disconnected` with no writer attached when the loop returns.
pub async fn connector_loop<S>(
    session: Arc<TransportSession>,
    target: BridgeTarget,
    sink: Arc<S>,
    shutdown: CancellationToken,
) where
    S: InboundSink + ?Sized,
{
    let mut backoff = Backoff::new(target.backoff);
    while !shutdown.is_cancelled() {
        session.transition(LinkState::Connecting);
        let attempt = select! {
            biased;
            () = shutdown.cancelled() => break,
            res = TcpStream::connect((target.host.as_str(), target.port)) => res,
        };
        match attempt {
            Ok(stream) => {
                backoff.reset();
                info!(
                    "bridge connected: host={}, port={}",
                    target.host, target.port
                );
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("failed to set TCP_NODELAY: error={e}");
                }
                run_connection(&session, stream, sink.as_ref(), &shutdown).await;
            }
            Err(e) => {
                session.transition(LinkState::Disconnected);
                warn!(
                    "bridge connect failed: host={}, port={}, error={e}",
                    target.host, target.port
                );
            }
        }
        let delay = backoff.next_delay();
        debug!("bridge reconnect scheduled: delay_ms={}", delay.as_millis());
        select! {
            biased;
            () = shutdown.cancelled() => break,
            () = sleep(delay) => {}
        }
    }
    session.detach().await;
    session.transition(LinkState::Disconnected);
}

/// Serve one bridged connection until it closes, fails, or `shutdown` fires.
///
/// The writing half is attached to `session` for the lifetime of the
/// connection and detached again before returning.
pub async fn run_connection<T, S>(
    session: &TransportSession,
    stream: T,
    sink: &S,
    shutdown: &CancellationToken,
) where
    T: AsyncRead + AsyncWrite + Send + 'static,
    S: InboundSink + ?Sized,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let dropped = CancellationToken::new();
    session
        .attach(LinkWriter::socket(write_half, dropped.clone()))
        .await;
    session.transition(LinkState::Online);

    let mut reader = FramedRead::new(read_half, LineCodec::new());
    loop {
        let next = select! {
            biased;
            () = shutdown.cancelled() => break,
            () = dropped.cancelled() => {
                info!("bridge dropped after write failure");
                break;
            }
            next = reader.next() => next,
        };
        match next {
            Some(Ok(LineFrame::Fragment(fragment))) => {
                metrics::inc_fragments(Direction::Inbound);
                sink.on_inbound_fragment(PeerId::Bridge, fragment);
            }
            Some(Ok(LineFrame::Noise(kind))) => {
                debug!("ignoring bridge line: reason={kind}");
                metrics::inc_dropped(DropReason::Noise);
            }
            Some(Err(e)) => {
                warn!("bridge read failed: error={e}");
                break;
            }
            None => {
                info!("bridge closed by peer");
                break;
            }
        }
    }

    // Release a writer blocked on this socket before taking it back.
    dropped.cancel();
    session.detach().await;
    session.transition(LinkState::Disconnected);
}
