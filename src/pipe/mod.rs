//! Pipe coordination subsystem.
//!
//! # Data Flow
//! ```text
//! GET /p/<id>                          POST|PUT /p/<id>
//!     → registry.rs (get-or-create)        → registry.rs (get-or-create)
//!     → rendezvous.rs (park sink)          → rendezvous.rs (claim, take sink)
//!     → suspend on response channel        → transfer.rs (headers + stream)
//!     ◀ response delivered by sender       → completion fires, entry removed
//! ```
//!
//! # Design Decisions
//! - One enumerated state per pipe behind a single mutex; the two racy
//!   booleans of the naive design cannot be observed out of sync
//! - Receiver handoff and completion are both oneshot channels, so neither
//!   can fire twice
//! - The registry entry is removed by whoever finishes the transfer, after
//!   which the same path hosts a brand-new, independent pipe

pub mod registry;
pub mod rendezvous;
pub mod transfer;

pub use registry::PathRegistry;
pub use rendezvous::{Pipe, PipeBusy, SenderClaim};
