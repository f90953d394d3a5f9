//! Protocol-level rejections.
//!
//! # Responsibilities
//! - One-line plaintext error bodies, matching status codes
//! - CORS header on every rejection
//!
//! # Design Decisions
//! - Rejections never mutate pipe or registry state; the handler decides
//!   eviction separately
//! - 405 only for unsupported methods, 400 for everything else

use axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// A request that violates the piping protocol.
///
/// The display string doubles as the response body, one line each, in the
/// wire format clients of the original service expect.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("[ERROR] Service Worker registration is rejected.\n")]
    ServiceWorkerRejected,

    #[error("[ERROR] The number of receivers has reached limits.\n")]
    ReceiverLimit,

    #[error("[ERROR] Another sender has been connected on '{path}'.\n")]
    SenderConnected { path: String },

    #[error("[ERROR] Cannot send to the reserved path '{path}'. (e.g. '/p/mypath123')\n")]
    ReservedPath { path: String },

    #[error("[ERROR] Content-Range is not supported for now in {method}\n")]
    ContentRangeUnsupported { method: Method },

    #[error("[ERROR] Unsupported method: {method}.\n")]
    UnsupportedMethod { method: Method },

    #[error("[ERROR] The receiver disconnected before the transfer started.\n")]
    ReceiverGone,
}

impl ProtocolError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProtocolError::UnsupportedMethod { .. } => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
            self.to_string(),
        )
            .into_response()
    }
}
