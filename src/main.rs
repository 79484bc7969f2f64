//! slackircd - gateway entry point.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::mpsc;
use tracing::info;

use slackirc::config::Config;
use slackirc::network::Listener;
use slackirc::router::Router;
use slackirc::upstream::WebApi;
use slackirc::upstream::session::Session;

/// Resolve the configuration path from CLI arguments.
/// Supports `-c <path>`, `--config <path>`, or a bare path.
/// Falls back to `slackirc.conf` when no argument is provided.
fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);
    match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {}", flag);
            std::process::exit(1);
        }),
        Some(path) => path,
        None => "slackirc.conf".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let config_path = resolve_config_path();
    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("ERROR: Failed to load config from {}: {}", config_path, e);
        e
    })?;

    info!(
        port = config.port,
        unix_socket = ?config.unix_socket,
        "Starting slackircd"
    );

    let debug_dump = Arc::new(AtomicBool::new(config.debug_dump));
    let api = Arc::new(WebApi::new(config.slack_token.clone()));

    // Binding before anything upstream keeps "cannot bind" a fatal
    // startup error rather than a half-started gateway.
    let listener = Listener::bind(&config).await?;

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

    let session = Session::new(api, router_tx.clone(), teardown_rx, Arc::clone(&debug_dump));
    tokio::spawn(session.run());

    let accept = tokio::spawn(listener.run(router_tx, debug_dump));

    tokio::select! {
        _ = accept => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
