//! The real-time event stream.
//!
//! One task owns the WebSocket. Inbound frames are parsed into
//! [`RtmEvent`]s and forwarded to the router; outbound frames (messages and
//! pings) are serialized here so the monotonically increasing frame id has
//! a single owner. The task also runs the upstream ping schedule: one ping
//! a minute, and two misses in a row end the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::router::RouterEvent;

use super::events::RtmEvent;

const PING_INTERVAL_SECS: u64 = 60;
const MAX_MISSED_PONGS: u32 = 2;

/// An outbound frame, before id assignment.
#[derive(Debug)]
pub enum OutFrame {
    /// A chat message to a channel or DM conduit.
    Message { channel: String, text: String },
}

/// Handle the router uses to push frames onto the stream.
#[derive(Debug, Clone)]
pub struct RtmHandle {
    tx: mpsc::UnboundedSender<OutFrame>,
}

impl RtmHandle {
    pub fn channel() -> (RtmHandle, mpsc::UnboundedReceiver<OutFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RtmHandle { tx }, rx)
    }

    /// Queue a message frame. Send failures mean the stream is already
    /// down; the session teardown that follows handles the fallout.
    pub fn send_message(&self, channel: &str, text: &str) {
        let _ = self.tx.send(OutFrame::Message {
            channel: channel.to_string(),
            text: text.to_string(),
        });
    }
}

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pump the stream until it ends. Returns the teardown reason.
pub async fn pump(
    mut ws: WsStream,
    generation: u64,
    router_tx: &mpsc::UnboundedSender<RouterEvent>,
    mut out_rx: mpsc::UnboundedReceiver<OutFrame>,
    teardown_rx: &mut mpsc::Receiver<String>,
    debug_dump: &Arc<AtomicBool>,
) -> String {
    let mut next_id: u64 = 1;
    let mut missed_pongs: u32 = 0;

    let mut ping_timer =
        tokio::time::interval(std::time::Duration::from_secs(PING_INTERVAL_SECS));
    // First tick fires immediately, we don't want that
    ping_timer.tick().await;

    loop {
        tokio::select! {
            frame = ws.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if debug_dump.load(Ordering::Relaxed) {
                            info!(target: "wire", frame = %text, "RTM recv");
                        }
                        match serde_json::from_str::<RtmEvent>(&text) {
                            Ok(event) => {
                                if let RtmEvent::Pong { reply_to } = &event {
                                    debug!(?reply_to, "RTM pong");
                                    missed_pongs = 0;
                                }
                                let _ = router_tx.send(RouterEvent::Rtm { generation, event });
                            }
                            // One bad frame must not kill the session.
                            Err(e) => warn!(error = %e, "Undecodable RTM frame, skipping"),
                        }
                    }
                    Some(Ok(WsMessage::Ping(payload))) => {
                        if ws.send(WsMessage::Pong(payload)).await.is_err() {
                            return "connection closed".to_string();
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        return "connection closed".to_string();
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return format!("stream error: {}", e);
                    }
                }
            }

            Some(frame) = out_rx.recv() => {
                let OutFrame::Message { channel, text } = frame;
                let payload = json!({
                    "id": next_id,
                    "type": "message",
                    "channel": channel,
                    "text": text,
                })
                .to_string();
                next_id += 1;
                if debug_dump.load(Ordering::Relaxed) {
                    info!(target: "wire", frame = %payload, "RTM send");
                }
                if ws.send(WsMessage::Text(payload)).await.is_err() {
                    return "connection closed".to_string();
                }
            }

            _ = ping_timer.tick() => {
                if missed_pongs >= MAX_MISSED_PONGS {
                    return "RTM ping timeout".to_string();
                }
                let payload = json!({"id": next_id, "type": "ping"}).to_string();
                next_id += 1;
                missed_pongs += 1;
                if ws.send(WsMessage::Text(payload)).await.is_err() {
                    return "connection closed".to_string();
                }
            }

            Some(reason) = teardown_rx.recv() => {
                let _ = ws.close(None).await;
                return reason;
            }
        }
    }
}
