//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all piping handler
//! - Share the path registry and static-asset collaborator with handlers
//! - Serve plain HTTP with graceful shutdown; TLS serving reuses the same
//!   router through [`HttpServer::router`]
//!
//! # Design Decisions
//! - One catch-all route: dispatch by method and path shape happens in the
//!   handler, not in the routing table
//! - No request timeout layer: a pipe legitimately stays open for as long
//!   as its peers need, only client cancellation bounds a wait

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::any, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::assets::StaticAssets;
use crate::config::ServerConfig;
use crate::http::handler::dispatch;
use crate::pipe::PathRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PathRegistry>,
    pub assets: Arc<StaticAssets>,
}

/// HTTP server for the piping service.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let state = AppState {
            registry: Arc::new(PathRegistry::new()),
            assets: Arc::new(StaticAssets::from_config(&config.assets)),
        };
        let router = Self::build_router(state);
        Self { router, config }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Clone of the service router. Clones share the same registry, so a
    /// TLS listener serves the same pipes as the plain one.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve plain HTTP on the given listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn test_router() -> Router {
        Self::new(ServerConfig::default()).router()
    }
}
