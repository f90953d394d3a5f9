//! Per-path rendezvous between one sender and one receiver.
//!
//! # Responsibilities
//! - Enforce exclusivity: at most one waiting receiver, at most one sender
//!   per pipe instance
//! - Block whichever party arrives first until the other shows up
//! - Recover a pipe whose waiting party disconnected before being matched
//!
//! # Design Decisions
//! - One enumerated state behind a `std::sync::Mutex`; the lock is held only
//!   for the transition itself, never across an await point
//! - The receiver slot is the parked response channel; capacity one falls
//!   out of the state machine rather than a queue
//! - A closed channel found during a transition means the waiting party is
//!   gone; its place is released instead of being honored

use std::sync::{Mutex, PoisonError};

use axum::response::Response;
use thiserror::Error;
use tokio::sync::oneshot;

/// Handle through which the sender delivers the receiver's response.
///
/// Dropping the paired receiver (client disconnect) is observable via
/// [`oneshot::Sender::is_closed`], which is what drives stale-peer eviction.
pub type ResponseSink = oneshot::Sender<Response>;

/// Rejection returned when a pipe already has a party in the requested role.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipeBusy {
    /// A receiver is already parked, or a transfer is in progress.
    #[error("the number of receivers has reached limits")]
    ReceiverLimit,
    /// Another sender already claimed this pipe instance.
    #[error("another sender has been connected")]
    SenderConnected,
}

/// Outcome of a successful sender claim.
#[derive(Debug)]
pub enum SenderClaim {
    /// A receiver was already parked; its response sink is handed over.
    Matched(ResponseSink),
    /// No receiver yet; resolves once one joins this pipe.
    Pending(oneshot::Receiver<ResponseSink>),
}

enum PipeState {
    Idle,
    ReceiverWaiting {
        sink: ResponseSink,
    },
    SenderWaiting {
        handoff: oneshot::Sender<ResponseSink>,
    },
    Transferring,
}

/// Rendezvous object coordinating exactly one sender and one receiver.
///
/// Lifecycle: `Idle → (ReceiverWaiting | SenderWaiting) → Transferring`,
/// then the owning registry entry is removed and the pipe becomes
/// unreachable. Either arrival order works; the first party suspends until
/// the second one shows up.
pub struct Pipe {
    state: Mutex<PipeState>,
}

impl Pipe {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PipeState::Idle),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join as the receiver. On success the caller suspends on the returned
    /// channel until the sender delivers the response.
    ///
    /// Rejected when a live receiver is already parked or a transfer is in
    /// progress. A parked receiver whose client has disconnected is evicted
    /// and replaced rather than counted against the limit.
    pub fn join_receiver(&self) -> Result<oneshot::Receiver<Response>, PipeBusy> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, PipeState::Transferring) {
            PipeState::Idle => {
                let (sink, waiting) = oneshot::channel();
                *state = PipeState::ReceiverWaiting { sink };
                Ok(waiting)
            }
            PipeState::ReceiverWaiting { sink } if sink.is_closed() => {
                // The parked receiver went away before a sender arrived.
                let (sink, waiting) = oneshot::channel();
                *state = PipeState::ReceiverWaiting { sink };
                Ok(waiting)
            }
            previous @ PipeState::ReceiverWaiting { .. } => {
                *state = previous;
                Err(PipeBusy::ReceiverLimit)
            }
            PipeState::SenderWaiting { handoff } => {
                let (sink, waiting) = oneshot::channel();
                match handoff.send(sink) {
                    Ok(()) => {
                        // Matched: the parked sender now owns the sink.
                        *state = PipeState::Transferring;
                        Ok(waiting)
                    }
                    Err(sink) => {
                        // The claiming sender was cancelled while waiting;
                        // release its claim and park this receiver instead.
                        *state = PipeState::ReceiverWaiting { sink };
                        Ok(waiting)
                    }
                }
            }
            PipeState::Transferring => {
                *state = PipeState::Transferring;
                Err(PipeBusy::ReceiverLimit)
            }
        }
    }

    /// Claim the sender role. Succeeds at most once per live claim: a second
    /// sender is rejected immediately with no retry.
    ///
    /// If the previous claimant was cancelled before a receiver arrived, its
    /// abandoned claim is released and the new sender takes over.
    pub fn claim_sender(&self) -> Result<SenderClaim, PipeBusy> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, PipeState::Transferring) {
            PipeState::Idle => {
                let (handoff, pending) = oneshot::channel();
                *state = PipeState::SenderWaiting { handoff };
                Ok(SenderClaim::Pending(pending))
            }
            PipeState::ReceiverWaiting { sink } => {
                // State stays Transferring until the registry entry is removed.
                Ok(SenderClaim::Matched(sink))
            }
            PipeState::SenderWaiting { handoff } if handoff.is_closed() => {
                let (handoff, pending) = oneshot::channel();
                *state = PipeState::SenderWaiting { handoff };
                Ok(SenderClaim::Pending(pending))
            }
            previous @ PipeState::SenderWaiting { .. } => {
                *state = previous;
                Err(PipeBusy::SenderConnected)
            }
            PipeState::Transferring => {
                *state = PipeState::Transferring;
                Err(PipeBusy::SenderConnected)
            }
        }
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.lock() {
            PipeState::Idle => "Idle",
            PipeState::ReceiverWaiting { .. } => "ReceiverWaiting",
            PipeState::SenderWaiting { .. } => "SenderWaiting",
            PipeState::Transferring => "Transferring",
        };
        f.debug_struct("Pipe").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn response(marker: &str) -> Response {
        Response::new(Body::from(marker.to_string()))
    }

    #[tokio::test]
    async fn receiver_first_then_sender_matches() {
        let pipe = Pipe::new();
        let waiting = pipe.join_receiver().unwrap();

        let sink = match pipe.claim_sender().unwrap() {
            SenderClaim::Matched(sink) => sink,
            SenderClaim::Pending(_) => panic!("receiver was parked, claim must match"),
        };
        sink.send(response("ok")).unwrap();
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn sender_first_then_receiver_matches() {
        let pipe = Pipe::new();
        let pending = match pipe.claim_sender().unwrap() {
            SenderClaim::Pending(pending) => pending,
            SenderClaim::Matched(_) => panic!("no receiver yet, claim must be pending"),
        };

        let waiting = pipe.join_receiver().unwrap();
        let sink = pending.await.unwrap();
        sink.send(response("ok")).unwrap();
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn second_receiver_is_rejected() {
        let pipe = Pipe::new();
        let _waiting = pipe.join_receiver().unwrap();
        assert_eq!(pipe.join_receiver().unwrap_err(), PipeBusy::ReceiverLimit);
    }

    #[tokio::test]
    async fn second_sender_is_rejected() {
        let pipe = Pipe::new();
        let _pending = match pipe.claim_sender().unwrap() {
            SenderClaim::Pending(pending) => pending,
            SenderClaim::Matched(_) => unreachable!(),
        };
        assert_eq!(pipe.claim_sender().unwrap_err(), PipeBusy::SenderConnected);
    }

    #[tokio::test]
    async fn receiver_rejected_while_transferring() {
        let pipe = Pipe::new();
        let _waiting = pipe.join_receiver().unwrap();
        let _sink = pipe.claim_sender().unwrap();
        assert_eq!(pipe.join_receiver().unwrap_err(), PipeBusy::ReceiverLimit);
    }

    #[tokio::test]
    async fn sender_rejected_while_transferring() {
        let pipe = Pipe::new();
        let _waiting = pipe.join_receiver().unwrap();
        let _sink = pipe.claim_sender().unwrap();
        assert_eq!(pipe.claim_sender().unwrap_err(), PipeBusy::SenderConnected);
    }

    #[tokio::test]
    async fn disconnected_receiver_is_evicted() {
        let pipe = Pipe::new();
        let waiting = pipe.join_receiver().unwrap();
        drop(waiting);

        // The stale slot must not count against the limit.
        let _waiting = pipe.join_receiver().unwrap();
    }

    #[tokio::test]
    async fn cancelled_sender_releases_its_claim_to_a_receiver() {
        let pipe = Pipe::new();
        let pending = match pipe.claim_sender().unwrap() {
            SenderClaim::Pending(pending) => pending,
            SenderClaim::Matched(_) => unreachable!(),
        };
        drop(pending);

        // The receiver parks itself instead of feeding a dead sender.
        let waiting = pipe.join_receiver().unwrap();
        let sink = match pipe.claim_sender().unwrap() {
            SenderClaim::Matched(sink) => sink,
            SenderClaim::Pending(_) => panic!("receiver is parked after fallback"),
        };
        sink.send(response("ok")).unwrap();
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_sender_releases_its_claim_to_a_new_sender() {
        let pipe = Pipe::new();
        let pending = match pipe.claim_sender().unwrap() {
            SenderClaim::Pending(pending) => pending,
            SenderClaim::Matched(_) => unreachable!(),
        };
        drop(pending);

        assert!(matches!(
            pipe.claim_sender().unwrap(),
            SenderClaim::Pending(_)
        ));
    }
}
