//! HTTP Piping Server Library
//!
//! Streams an arbitrary byte sequence from one HTTP client to another,
//! matched by a shared path under `/p/`. The sender's request body becomes
//! the receiver's response body with no server-side buffering.

pub mod assets;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipe;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
