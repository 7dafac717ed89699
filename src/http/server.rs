//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router for the ledger API
//! - Wire up middleware (request id, tracing, panic capture)
//!
//! Requests carry no deadline: a slow ledger call still ends in the JSON
//! reply envelope, and an in-flight client initialization is never dropped.
//! - Serve plain TCP or TLS with graceful shutdown

use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::dispatch::RequestDispatcher;
use crate::http::{api, request};
use crate::ledger::ClientManagerHandle;
use crate::lifecycle::shutdown;
use crate::net::load_tls_config;

/// Application state injected into handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub dispatcher: RequestDispatcher,
}

/// HTTP API server.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, manager: Arc<ClientManagerHandle>) -> Self {
        let state = AppState {
            dispatcher: RequestDispatcher::new(manager),
        };
        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/invoke", post(api::invoke))
            .route("/query", post(api::query))
            .route("/init", put(api::init))
            .route("/channels", get(api::channels))
            .route("/chaincodes/installed", get(api::installed_chaincodes))
            .route("/chaincodes/instantiated", get(api::instantiated_chaincodes))
            .route("/block", get(api::block))
            .route("/trxn", get(api::transaction))
            .route("/health", get(api::health))
            .with_state(state)
            .layer(CatchPanicLayer::custom(api::panic_reply))
            .layer(PropagateRequestIdLayer::new(request::request_id_header()))
            .layer(TraceLayer::new_for_http().make_span_with(request::make_span))
            .layer(SetRequestIdLayer::new(request::request_id_header(), MakeRequestUuid))
    }

    /// Router with all layers applied.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve plain HTTP on `listener` until shutdown is signalled.
    pub async fn run(self, listener: TcpListener, shutdown_rx: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS using the configured certificate pair.
    pub async fn run_tls(self, addr: SocketAddr, shutdown_rx: broadcast::Receiver<()>) -> std::io::Result<()> {
        let Some(tls) = self.config.listener.tls.clone() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "TLS listener requested without certificate configuration",
            ));
        };
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown::wait(shutdown_rx).await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ClientPaths, LedgerClient, LedgerError, LedgerResult};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// Server whose ledger client can never be built.
    fn offline_server() -> GatewayServer {
        let factory = |_: &ClientPaths| -> LedgerResult<Arc<dyn LedgerClient>> {
            Err(LedgerError::Configuration("network config missing".into()))
        };
        let paths = ClientPaths {
            network_config: "network-config.json".into(),
            credential_store: "/tmp/credstore".into(),
            user_credentials: "user-cred-config.json".into(),
        };
        let manager = Arc::new(ClientManagerHandle::new(Arc::new(factory), paths));
        GatewayServer::new(GatewayConfig::default(), manager)
    }

    async fn call(router: Router, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unconfigured_ledger_is_a_configuration_error() {
        let router = offline_server().router();

        let (status, body) = call(router.clone(), Method::PUT, "/init", Body::empty()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Ledger client initialization failure"));

        let (status, body) = call(router, Method::GET, "/channels?org=org1&userId=u1", Body::empty()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"status": "Error", "message": "Configuration error"}));
    }

    #[tokio::test]
    async fn test_unreadable_body_is_an_input_error() {
        let router = offline_server().router();
        let (status, body) = call(router, Method::POST, "/invoke", Body::from("[1, 2")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"status": "Input Error", "message": "Invalid inputs provided"}));
    }

    #[tokio::test]
    async fn test_health_does_not_touch_ledger() {
        let server = offline_server();
        let (status, body) = call(server.router(), Method::GET, "/health", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ledgerInitialized"], json!(false));
        assert_eq!(body["initAttempts"], json!(0));
    }
}
