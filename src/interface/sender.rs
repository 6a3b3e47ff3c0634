//! Paced drain of the outgoing queue.

use std::sync::Arc;

use tokio::{select, sync::watch, time::sleep};
use tokio_util::sync::CancellationToken;

use super::Inner;
use crate::transport::LinkState;

/// Send one fragment per pacing interval while the link is online.
///
/// The loop parks while the link is down or the queue is empty and returns
/// once `shutdown` is cancelled.
pub(super) async fn sender_loop(inner: Arc<Inner>, shutdown: CancellationToken) {
    let mut state = inner.transport.subscribe();
    loop {
        let online = select! {
            biased;
            () = shutdown.cancelled() => return,
            online = wait_online(&mut state) => online,
        };
        if !online {
            return;
        }

        let next = inner.queue().next_fragment();
        let Some(fragment) = next else {
            select! {
                biased;
                () = shutdown.cancelled() => return,
                () = inner.queued.notified() => {}
            }
            continue;
        };

        select! {
            biased;
            () = shutdown.cancelled() => return,
            _ = inner.transport.send(&fragment) => {}
        }
        select! {
            biased;
            () = shutdown.cancelled() => return,
            () = sleep(inner.config.pacing) => {}
        }
    }
}

/// Resolve once the link is online, or `false` if the session went away.
async fn wait_online(state: &mut watch::Receiver<LinkState>) -> bool {
    loop {
        if state.borrow_and_update().is_online() {
            return true;
        }
        if state.changed().await.is_err() {
            return false;
        }
    }
}
