//! HTTP sink plugin host.
//!
//! Run with: cargo run -p http-sink-server -- --address 127.0.0.1:50052 --debug

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Parser;
use http_sink_session::SessionRegistry;
use http_sink_transport::{HttpSinkService, websocket::create_router};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PLUGIN_NAME: &str = "http";
const PLUGIN_KIND: &str = "sink";

#[derive(Debug, Parser)]
#[command(name = "http-sink", version, about = "Delivers record batches to HTTP endpoints")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:50052")]
    address: SocketAddr,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .init();

    let shutdown = CancellationToken::new();
    let service = HttpSinkService::new(Arc::new(SessionRegistry::new()));
    let app = create_router(service, shutdown.clone());

    let listener = tokio::net::TcpListener::bind(args.address)
        .await
        .with_context(|| format!("failed to bind {}", args.address))?;

    tracing::info!(
        plugin = PLUGIN_NAME,
        kind = PLUGIN_KIND,
        address = %args.address,
        "Starting HTTP sink plugin"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("server error")?;

    tracing::info!("HTTP sink plugin stopped");
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM, then end every open write stream.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutting down");
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args_defaults() {
        Args::command().debug_assert();

        let args = Args::parse_from(["http-sink"]);
        assert_eq!(args.address, "0.0.0.0:50052".parse().unwrap());
        assert!(!args.debug);
    }

    #[test]
    fn test_args_override() {
        let args = Args::parse_from(["http-sink", "--address", "127.0.0.1:9000", "--debug"]);
        assert_eq!(args.address.port(), 9000);
        assert!(args.debug);
    }

    #[test]
    fn test_args_reject_bad_address() {
        assert!(Args::try_parse_from(["http-sink", "--address", ":50052"]).is_err());
    }
}
