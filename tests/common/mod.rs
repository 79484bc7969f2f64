//! Integration test infrastructure: an in-process gateway with a
//! recording mock upstream, and a line-oriented test client.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;

use slackirc::config::Config;
use slackirc::error::ApiError;
use slackirc::network::Listener;
use slackirc::router::{Router, RouterEvent};
use slackirc::upstream::api::Api;
use slackirc::upstream::events::Snapshot;
use slackirc::upstream::rtm::{OutFrame, RtmHandle};

/// Recording mock of the upstream Web API.
#[derive(Default)]
pub struct MockApi {
    pub calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    pub responses: Mutex<HashMap<String, Value>>,
}

impl MockApi {
    pub fn respond(&self, method: &str, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_string(), body);
    }
}

#[async_trait]
impl Api for MockApi {
    async fn call(&self, method: &str, args: &[(&str, &str)]) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push((
            method.to_string(),
            args.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .unwrap_or_else(|| json!({"ok": true})))
    }

    async fn download(&self, _url: &str) -> Result<Vec<u8>, ApiError> {
        Err(ApiError::Refused("no downloads in this harness".to_string()))
    }
}

/// An in-process gateway bound to an ephemeral loopback port.
pub struct TestGateway {
    pub addr: std::net::SocketAddr,
    pub api: Arc<MockApi>,
    pub router_tx: mpsc::UnboundedSender<RouterEvent>,
    pub teardown_rx: mpsc::Receiver<String>,
    generation: u64,
}

impl TestGateway {
    pub async fn spawn(password: Option<&str>) -> TestGateway {
        let config = Config {
            slack_token: "xoxp-test".to_string(),
            password: password.map(str::to_string),
            port: 0,
            unix_socket: None,
            debug_dump: false,
        };
        let api = Arc::new(MockApi::default());
        let debug_dump = Arc::new(AtomicBool::new(false));

        let (router_tx, router_rx) = mpsc::unbounded_channel();
        let (teardown_tx, teardown_rx) = mpsc::channel(4);

        let router = Router::new(
            &config,
            api.clone(),
            router_tx.clone(),
            teardown_tx,
            Arc::clone(&debug_dump),
        );
        tokio::spawn(router.run(router_rx));

        let listener = Listener::bind(&config).await.expect("bind");
        let addr = listener.local_addr().expect("tcp addr");
        tokio::spawn(listener.run(router_tx.clone(), debug_dump));

        TestGateway {
            addr,
            api,
            router_tx,
            teardown_rx,
            generation: 0,
        }
    }

    /// Bring a session up with the standard snapshot; returns the RTM
    /// outbox so tests can assert on outbound frames.
    pub fn go_live(&mut self) -> mpsc::UnboundedReceiver<OutFrame> {
        self.generation += 1;
        let (handle, out_rx) = RtmHandle::channel();
        self.router_tx
            .send(RouterEvent::SessionUp {
                generation: self.generation,
                snapshot: sample_snapshot(),
                rtm: handle,
            })
            .expect("router alive");
        out_rx
    }

    pub fn go_down(&self, reason: &str) {
        self.router_tx
            .send(RouterEvent::SessionDown {
                generation: self.generation,
                reason: reason.to_string(),
            })
            .expect("router alive");
    }
}

pub fn sample_snapshot() -> Snapshot {
    serde_json::from_value(json!({
        "url": "wss://example/ws",
        "self": {"id": "U1", "name": "me"},
        "users": [
            {"id": "U1", "name": "me", "real_name": "Local Identity"},
            {"id": "U_BOB", "name": "bob", "real_name": "Bob"},
        ],
        "channels": [
            {"id": "C1", "name": "general", "is_member": true,
             "topic": {"value": "the topic"}, "members": ["U1", "U_BOB"]},
        ],
        "groups": [],
        "ims": [],
    }))
    .unwrap()
}

/// A minimal IRC client over a real socket.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: std::net::SocketAddr) -> TestClient {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read, writer) = stream.into_split();
        TestClient {
            reader: BufReader::new(read),
            writer,
        }
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .expect("write");
    }

    /// Next line, or None on timeout/EOF.
    pub async fn recv(&mut self) -> Option<String> {
        let mut line = String::new();
        match tokio::time::timeout(Duration::from_secs(2), self.reader.read_line(&mut line)).await
        {
            Ok(Ok(0)) | Err(_) => None,
            Ok(Ok(_)) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Ok(Err(_)) => None,
        }
    }

    /// Read lines until one contains `needle`; panics after `max` lines.
    pub async fn expect(&mut self, needle: &str) -> String {
        for _ in 0..64 {
            let Some(line) = self.recv().await else {
                panic!("connection ended while waiting for {:?}", needle);
            };
            if line.contains(needle) {
                return line;
            }
        }
        panic!("never saw {:?}", needle);
    }

    pub async fn register(&mut self, nick: &str, pass: Option<&str>) {
        if let Some(pass) = pass {
            self.send(&format!("PASS {}", pass)).await;
        }
        self.send(&format!("NICK {}", nick)).await;
        self.send(&format!("USER {} 0 * :Test User", nick)).await;
    }
}
