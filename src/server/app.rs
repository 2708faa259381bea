//! Server setup.
//!
//! # Responsibilities
//! - Build the Axum router: RPC upgrade route plus HTTP fallback
//! - Wire up middleware (timeout, request ID, tracing)
//! - Serve plain or TLS until shutdown

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ServerConfig, TlsConfig};
use crate::lifecycle::Shutdown;
use crate::net::tls::load_tls_config;
use crate::server::dispatcher::Dispatcher;
use crate::server::{http, websocket};

/// Time given to in-flight requests after shutdown on the TLS listener.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub max_body_size: usize,
    pub max_message_size: usize,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address: {0}")]
    Address(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serves one dispatcher over HTTP and WebSocket RPC.
pub struct AdapterServer {
    router: Router,
    config: ServerConfig,
}

impl AdapterServer {
    pub fn new(dispatcher: Arc<Dispatcher>, config: ServerConfig) -> Self {
        let state = AppState {
            dispatcher,
            max_body_size: config.max_body_size,
            max_message_size: config.max_message_size,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route(
                &config.rpc_path,
                get(websocket::handle_rpc).fallback(http::handle_http),
            )
            .fallback(http::handle_http)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs))),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve on an already bound listener until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, rpc_path = %self.config.rpc_path, "Adapter server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Adapter server stopped");
        Ok(())
    }

    /// Bind the configured address and serve, with TLS when configured.
    pub async fn serve(self, shutdown: &Shutdown) -> Result<(), ServerError> {
        match self.config.tls.clone() {
            Some(tls) => self.serve_tls(&tls, shutdown.subscribe()).await,
            None => {
                let listener = TcpListener::bind(&self.config.bind_address).await?;
                self.run(listener, shutdown.subscribe()).await
            }
        }
    }

    async fn serve_tls(self, tls: &TlsConfig, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr: SocketAddr = self
            .config
            .bind_address
            .parse()
            .map_err(|_| ServerError::Address(self.config.bind_address.clone()))?;
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        tracing::info!(address = %addr, rpc_path = %self.config.rpc_path, "Adapter server starting (TLS)");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("Adapter server stopped");
        Ok(())
    }
}
