//! The Listener accepts local connections and spawns a task per client.
//!
//! Binding is restricted to the loopback address or a unix stream socket;
//! the gateway carries one person's credentials and must never be exposed
//! off-host. The unix socket is chmod 0600 right after bind.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::net::{TcpListener, UnixListener};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::Config;
use crate::router::RouterEvent;

use super::connection;

/// The IRC listener, either loopback TCP or a unix socket.
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    /// Bind according to config: `unix_socket` wins over `port`.
    pub async fn bind(config: &Config) -> std::io::Result<Listener> {
        if let Some(path) = &config.unix_socket {
            // A stale socket file from a previous run would fail the bind.
            let _ = std::fs::remove_file(path);
            let listener = UnixListener::bind(path)?;
            let perms = std::os::unix::fs::PermissionsExt::from_mode(0o600);
            std::fs::set_permissions(path, perms)?;
            info!(path = %path.display(), "Listening on unix socket");
            Ok(Listener::Unix(listener))
        } else {
            let addr = format!("127.0.0.1:{}", config.port);
            let listener = TcpListener::bind(&addr).await?;
            info!(%addr, "Listening");
            Ok(Listener::Tcp(listener))
        }
    }

    /// The bound TCP address, if any. Lets tests bind port 0.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        match self {
            Listener::Tcp(listener) => listener.local_addr().ok(),
            Listener::Unix(_) => None,
        }
    }

    /// Accept connections forever, spawning a connection task for each.
    pub async fn run(
        self,
        router_tx: mpsc::UnboundedSender<RouterEvent>,
        debug_dump: Arc<AtomicBool>,
    ) {
        let mut next_id: u64 = 1;
        loop {
            let id = next_id;
            next_id += 1;

            match &self {
                Listener::Tcp(listener) => match listener.accept().await {
                    Ok((stream, addr)) => {
                        info!(client = id, %addr, "Connection accepted");
                        let router_tx = router_tx.clone();
                        let debug_dump = Arc::clone(&debug_dump);
                        tokio::spawn(async move {
                            connection::run(id, stream, router_tx, debug_dump).await;
                            info!(client = id, "Connection closed");
                        });
                    }
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
                Listener::Unix(listener) => match listener.accept().await {
                    Ok((stream, _)) => {
                        info!(client = id, "Connection accepted on unix socket");
                        let router_tx = router_tx.clone();
                        let debug_dump = Arc::clone(&debug_dump);
                        tokio::spawn(async move {
                            connection::run(id, stream, router_tx, debug_dump).await;
                            info!(client = id, "Connection closed");
                        });
                    }
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
            }
        }
    }
}
