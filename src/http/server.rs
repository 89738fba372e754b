//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tracing::info;

use super::handlers::{self, AppState};
use crate::error::Result;

/// HTTP server fronting the admission controller.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared application state
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        Self { addr, state }
    }

    /// Build the application router with the admission middleware applied
    /// to every route.
    pub fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/", get(handlers::index))
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                handlers::admission_middleware,
            ))
            .with_state(state)
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = Self::router(self.state);

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmissionController;
    use crate::audit::{AuditSink, CsvFileStorage};
    use std::time::Duration;

    #[tokio::test]
    async fn test_server_creation() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CsvFileStorage::open(dir.path().join("log.csv")).unwrap();
        let (audit, _writer) = AuditSink::spawn(storage);

        let controller = Arc::new(AdmissionController::new(Duration::from_secs(10), 50));
        let state = Arc::new(AppState::new(controller, audit));

        let addr: SocketAddr = "127.0.0.1:8000".parse().unwrap();
        let _server = HttpServer::new(addr, state);
    }
}
