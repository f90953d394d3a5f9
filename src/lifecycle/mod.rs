//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:  load config → validate → init logging → bind listeners
//! Shutdown: SIGINT → shutdown.rs broadcast → listeners drain and exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
