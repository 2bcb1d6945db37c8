//! ttylink-relay: terminal session relay for NAT-hidden devices.
//!
//! Devices dial out and hold a websocket open; browsers log in against a
//! device id and get a terminal session relayed through this process. No
//! inbound connectivity to the device is required.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use ttylink_relay::http::{app, AppState};
use ttylink_relay::registry::DeviceRegistry;
use ttylink_relay::sweeper;

#[derive(Parser)]
#[command(name = "ttylink-relay", about = "Terminal session relay for NAT-hidden devices")]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 5912)]
    port: u16,

    /// Directory served as the static web root.
    #[arg(short, long, default_value = "./www")]
    document: PathBuf,

    /// Seconds between liveness sweeps.
    #[arg(long, default_value_t = 5)]
    sweep_interval: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttylink_relay=info".into()),
        )
        .init();

    let args = Args::parse();

    // One registry instance, shared by every connection task and the
    // sweeper.
    let registry = DeviceRegistry::new();
    tokio::spawn(sweeper::run(
        registry.clone(),
        Duration::from_secs(args.sweep_interval),
    ));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind TCP listener");

    tracing::info!("ttylink-relay listening on {}", addr);

    axum::serve(listener, app(AppState::new(registry), &args.document))
        .await
        .expect("server error");
}
