//! Upstream session lifecycle.
//!
//! One task loops through the session state machine: bootstrap the
//! snapshot, open the event stream, pump it until something ends it, tell
//! the router, cool down, try again. The generation counter ties every
//! downstream artifact (events, API completions, timers) to the session
//! that produced it, so work from a torn-down session can be discarded.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::router::RouterEvent;

use super::api::{self, Api};
use super::rtm::{self, RtmHandle};

/// Fixed reconnect cooldown.
pub const COOLDOWN: Duration = Duration::from_secs(5);

/// The session lifecycle task.
pub struct Session {
    api: Arc<dyn Api>,
    router_tx: mpsc::UnboundedSender<RouterEvent>,
    /// Teardown requests from the router (gateway `disconnect`, fatal API
    /// conditions). Requests that arrive while cooling are no-ops.
    teardown_rx: mpsc::Receiver<String>,
    debug_dump: Arc<AtomicBool>,
    generation: u64,
}

impl Session {
    pub fn new(
        api: Arc<dyn Api>,
        router_tx: mpsc::UnboundedSender<RouterEvent>,
        teardown_rx: mpsc::Receiver<String>,
        debug_dump: Arc<AtomicBool>,
    ) -> Session {
        Session {
            api,
            router_tx,
            teardown_rx,
            debug_dump,
            generation: 0,
        }
    }

    /// Run the bootstrap/live/cooldown loop forever.
    pub async fn run(mut self) {
        loop {
            // Teardown requests aimed at a session that is already gone.
            while self.teardown_rx.try_recv().is_ok() {}

            self.generation += 1;
            let generation = self.generation;

            let snapshot = match api::rtm_start(self.api.as_ref()).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "Bootstrap failed, cooling down");
                    tokio::time::sleep(COOLDOWN).await;
                    continue;
                }
            };

            let ws = match tokio_tungstenite::connect_async(snapshot.url.as_str()).await {
                Ok((ws, _)) => ws,
                Err(e) => {
                    warn!(error = %e, url = %snapshot.url, "Event stream connect failed, cooling down");
                    tokio::time::sleep(COOLDOWN).await;
                    continue;
                }
            };

            info!(
                generation,
                self_id = %snapshot.self_info.id,
                users = snapshot.users.len(),
                channels = snapshot.channels.len(),
                groups = snapshot.groups.len(),
                "RTM session live"
            );

            let (handle, out_rx) = RtmHandle::channel();
            let _ = self.router_tx.send(RouterEvent::SessionUp {
                generation,
                snapshot,
                rtm: handle,
            });

            let reason = rtm::pump(
                ws,
                generation,
                &self.router_tx,
                out_rx,
                &mut self.teardown_rx,
                &self.debug_dump,
            )
            .await;

            info!(generation, reason = %reason, "RTM session ended");
            let _ = self.router_tx.send(RouterEvent::SessionDown {
                generation,
                reason,
            });

            tokio::time::sleep(COOLDOWN).await;
        }
    }
}
