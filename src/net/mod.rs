//! Network helpers: listener binding and optional TLS.

pub mod tls;

pub use tls::load_tls_config;

use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Bind a TCP listener, logging the resolved local address.
pub async fn bind(addr: SocketAddr, purpose: &'static str) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, purpose, "Listener bound");
    Ok(listener)
}
