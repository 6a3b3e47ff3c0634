//! Event pump for native device links.

use log::{debug, info};
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;

use super::{DeviceEvent, InboundSink, LinkState, RETICULUM_TUNNEL_PORT, TransportSession};
use crate::{
    fragment::{Fragment, PeerId},
    metrics::{self, Direction, DropReason},
};

/// Drive `session` from device events until the device goes away or
/// `shutdown` is cancelled.
///
/// Reconnection is the device library's concern: `Lost` only marks the link
/// down, and the loop keeps listening for a later `Established`.
pub async fn event_loop<S>(
    session: &TransportSession,
    mut events: mpsc::Receiver<DeviceEvent>,
    sink: &S,
    shutdown: &CancellationToken,
) where
    S: InboundSink + ?Sized,
{
    loop {
        let event = select! {
            biased;
            () = shutdown.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Some(DeviceEvent::Established) => {
                session.transition(LinkState::Online);
            }
            Some(DeviceEvent::Lost) => {
                session.transition(LinkState::Disconnected);
            }
            Some(DeviceEvent::Received {
                from,
                port,
                payload,
            }) => {
                if port != RETICULUM_TUNNEL_PORT {
                    debug!("ignoring packet on foreign port: from={from:08x}, port={port}");
                    continue;
                }
                match Fragment::from_wire(payload) {
                    Ok(fragment) => {
                        metrics::inc_fragments(Direction::Inbound);
                        sink.on_inbound_fragment(PeerId::Node(from), fragment);
                    }
                    Err(e) => {
                        debug!("dropping malformed fragment: from={from:08x}, error={e}");
                        metrics::inc_dropped(DropReason::Malformed);
                    }
                }
            }
            None => {
                info!("device event stream closed");
                session.transition(LinkState::Disconnected);
                break;
            }
        }
    }
}
