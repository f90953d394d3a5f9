//! Shared utilities for integration testing.

use std::net::SocketAddr;

use piping_server::{HttpServer, ServerConfig, Shutdown};
use tokio::net::TcpListener;

/// Start a piping server on an ephemeral port.
///
/// Returns the bound address and the shutdown handle keeping it alive.
pub async fn start_server() -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(ServerConfig::default());
    let receiver = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub fn pipe_url(addr: SocketAddr, id: &str) -> String {
    format!("http://{addr}/p/{id}")
}
