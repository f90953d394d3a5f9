//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → axum::serve (plain HTTP)
//!     → or axum-server + tls.rs (HTTPS)
//!     → Hand off to HTTP layer
//! ```

pub mod tls;
