//! Static asset serving.
//!
//! # Responsibilities
//! - Serve the bundled landing page when no asset directory is configured
//! - Serve an external directory tree with standard caching/404 semantics
//!
//! # Design Decisions
//! - External directories go through `tower_http::services::ServeDir`, which
//!   owns conditional requests, ranges, and content types
//! - The bundled tree is compiled in; there is nothing to read at runtime

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tower::util::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::AssetConfig;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

enum Assets {
    Bundled,
    Dir(ServeDir),
}

/// Collaborator answering GET/HEAD requests outside the piping namespace.
pub struct StaticAssets {
    inner: Assets,
}

impl StaticAssets {
    pub fn from_config(config: &AssetConfig) -> Self {
        let inner = match &config.static_dir {
            Some(dir) => {
                tracing::info!(directory = %dir.display(), "Serving static assets from directory");
                Assets::Dir(ServeDir::new(dir))
            }
            None => Assets::Bundled,
        };
        Self { inner }
    }

    pub async fn serve(&self, request: Request) -> Response {
        match &self.inner {
            Assets::Dir(dir) => match dir.clone().oneshot(request).await {
                Ok(response) => response.map(Body::new).into_response(),
                Err(infallible) => match infallible {},
            },
            Assets::Bundled => Self::serve_bundled(request),
        }
    }

    fn serve_bundled(request: Request) -> Response {
        match request.uri().path() {
            "/" | "/index.html" => Html(INDEX_HTML).into_response(),
            _ => (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "404 Not Found\n",
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn request(path: &str) -> Request {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn bundled_index_is_served_at_the_root() {
        let assets = StaticAssets::from_config(&AssetConfig::default());
        let response = assets.serve(request("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_bundled_path_is_404() {
        let assets = StaticAssets::from_config(&AssetConfig::default());
        let response = assets.serve(request("/missing.js")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
