//! Per-connection task: framed line I/O plus the ping watchdog.
//!
//! The task is a dumb pipe. Parsed lines go to the router, outbound
//! messages come back on a per-client channel, and the router closes the
//! client by dropping that channel. The only protocol the task speaks
//! itself is the watchdog: PING on an idle schedule, PONG consumes here
//! and resets the miss counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use slackirc_proto::{Command, LineCodec, Message};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::router::RouterEvent;

/// First PING after 30 s of a fresh connection, then every 60 s.
const FIRST_PING: Duration = Duration::from_secs(30);
const PING_INTERVAL: Duration = Duration::from_secs(60);
/// Misses tolerated before the connection is closed.
const MAX_MISSED_PINGS: u32 = 3;

/// Drive one client connection to completion.
pub async fn run<S>(
    id: u64,
    stream: S,
    router_tx: mpsc::UnboundedSender<RouterEvent>,
    debug_dump: Arc<AtomicBool>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, LineCodec::new());
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    if router_tx.send(RouterEvent::ClientConnected { id, tx }).is_err() {
        return;
    }

    let mut ping_count: u32 = 0;
    let mut next_ping = Instant::now() + FIRST_PING;

    loop {
        tokio::select! {
            line = framed.next() => {
                match line {
                    Some(Ok(line)) => {
                        if debug_dump.load(Ordering::Relaxed) {
                            info!(target: "wire", client = id, line = %line, "IRC recv");
                        }
                        let Ok(msg) = line.parse::<Message>() else {
                            continue;
                        };
                        if let Command::PONG(_) = msg.command {
                            ping_count = 0;
                            continue;
                        }
                        if router_tx.send(RouterEvent::ClientLine { id, msg }).is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(client = id, error = %e, "Protocol error, closing");
                        break;
                    }
                    None => {
                        debug!(client = id, "EOF");
                        break;
                    }
                }
            }

            outbound = rx.recv() => {
                match outbound {
                    Some(msg) => {
                        let line = msg.to_string();
                        if debug_dump.load(Ordering::Relaxed) {
                            info!(target: "wire", client = id, line = %line, "IRC send");
                        }
                        if framed.send(line).await.is_err() {
                            break;
                        }
                    }
                    // The router dropped us; it already sent any parting words.
                    None => break,
                }
            }

            _ = tokio::time::sleep_until(next_ping) => {
                if ping_count >= MAX_MISSED_PINGS {
                    info!(client = id, "Ping timeout");
                    let goodbye = Message::from_command(
                        Command::ERROR("Closing Link: Ping timeout".to_string()),
                    );
                    let _ = framed.send(goodbye.to_string()).await;
                    break;
                }
                ping_count += 1;
                let ping = Message::from_command(Command::PING("localhost".to_string()));
                if framed.send(ping.to_string()).await.is_err() {
                    break;
                }
                next_ping = Instant::now() + PING_INTERVAL;
            }
        }
    }

    let _ = framed.flush().await;
    let _ = router_tx.send(RouterEvent::ClientClosed { id });
}
