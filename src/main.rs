//! Ledger Gateway
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────┐
//!   REST client ───▶│ http (axum) → dispatch → ClientManagerHandle ─────┼──▶ ledger gateway_url
//!                   │                                                  │
//!   WS consumer ◀───│ relay::server ◀── registry ◀── subscription ◀─────┼─── ledger events_url
//!                   └──────────────────────────────────────────────────┘
//! ```
//!
//! Startup order: config → logging → metrics → HTTP API → relay. The relay
//! only accepts consumers after its first upstream subscription succeeds; if
//! that first attempt fails the process exits.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use ledger_gateway::config::{load_config, validation::validate_config, ConfigError, GatewayConfig};
use ledger_gateway::ledger::{ClientManagerHandle, ClientPaths, RemoteLedgerClient, RemoteLedgerFactory};
use ledger_gateway::lifecycle::{shutdown_signal, Shutdown};
use ledger_gateway::observability::{logging, metrics};
use ledger_gateway::{net, GatewayServer, RelayServer};

#[derive(Parser, Debug)]
#[command(name = "ledger-gateway", version, about = "REST gateway and block-event relay for a ledger network")]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = GatewayConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    logging::init_logging(&config.observability, cli.log_level.as_deref())?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ledger-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        relay_enabled = config.relay.enabled,
        gateway_url = %config.ledger.gateway_url,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let paths = ClientPaths::from(&config.ledger);
    let manager = Arc::new(ClientManagerHandle::new(
        Arc::new(RemoteLedgerFactory::new(config.ledger.clone())),
        paths.clone(),
    ));

    let api_addr: SocketAddr = config.listener.bind_address.parse()?;
    let server = GatewayServer::new(config.clone(), manager);
    let http = if config.listener.tls.is_some() {
        tokio::spawn(server.run_tls(api_addr, shutdown.subscribe()))
    } else {
        let listener = net::bind(api_addr, "api").await?;
        tokio::spawn(server.run(listener, shutdown.subscribe()))
    };

    let relay_task = if config.relay.enabled {
        let client = Arc::new(RemoteLedgerClient::new(
            &config.ledger,
            paths,
            Some(config.relay.org.clone()),
        )?);
        let relay = RelayServer::new(&config.relay, client);
        let listener = net::bind(config.relay.bind_address.parse()?, "relay").await?;
        Some(tokio::spawn(relay.run(listener, shutdown.subscribe())))
    } else {
        tracing::info!("Relay disabled");
        None
    };

    let relay_exit = async move {
        match relay_task {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    };

    let relay_failure = tokio::select! {
        _ = shutdown_signal() => None,
        exit = relay_exit => Some(match exit {
            Ok(Ok(())) => "relay stopped unexpectedly".to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("relay task failed: {e}"),
        }),
    };

    shutdown.trigger();
    match http.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
    }

    if let Some(reason) = relay_failure {
        tracing::error!(reason = %reason, "Relay terminated");
        return Err(reason.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
