//! Path-to-pipe registry.
//!
//! # Responsibilities
//! - Map each transfer path to at most one live pipe
//! - Create pipes lazily on first use, for either role
//! - Remove entries once a transfer has completed
//!
//! # Design Decisions
//! - `DashMap` gives per-key atomicity for create/read/delete without a
//!   global lock; no I/O ever happens inside a map operation
//! - Entries are only removed by transfer completion (or explicit eviction
//!   of a dead peer), never by timeout

use std::sync::Arc;

use dashmap::DashMap;

use crate::pipe::rendezvous::Pipe;

/// Concurrency-safe mapping from path to its live [`Pipe`].
#[derive(Debug, Default)]
pub struct PathRegistry {
    pipes: DashMap<String, Arc<Pipe>>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self {
            pipes: DashMap::new(),
        }
    }

    /// Return the pipe registered under `path`, creating a fresh one if the
    /// path is absent. Creation and lookup are atomic with respect to any
    /// other operation on the same path.
    pub fn get_or_create(&self, path: &str) -> Arc<Pipe> {
        self.pipes
            .entry(path.to_owned())
            .or_insert_with(|| Arc::new(Pipe::new()))
            .clone()
    }

    /// Remove the entry for `path`, but only while it still holds `pipe`.
    /// A replacement pipe registered under the same path after `pipe` was
    /// discarded is left untouched. The pipe itself stays alive for as long
    /// as in-flight handlers hold a reference to it.
    pub fn remove(&self, path: &str, pipe: &Arc<Pipe>) {
        self.pipes
            .remove_if(path, |_, current| Arc::ptr_eq(current, pipe));
    }

    /// Number of currently registered pipes.
    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }
}
