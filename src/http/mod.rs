//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, shared state)
//!     → handler.rs (dispatch by method and path shape)
//!     → pipe subsystem (rendezvous + streamed copy)
//!       or assets subsystem (GET/HEAD outside /p/)
//!     → error.rs (protocol rejections)
//! ```

pub mod error;
pub mod handler;
pub mod server;

pub use error::ProtocolError;
pub use server::{AppState, HttpServer};
