//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via `tracing`; every request gets a correlation id
//! - Log level comes from config, `RUST_LOG` wins when set

pub mod logging;
