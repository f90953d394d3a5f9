//! Request dispatch.
//!
//! # Responsibilities
//! - Route each request by method and path shape: receiver flow, sender
//!   flow, CORS preflight, static assets, or a protocol rejection
//! - Drive the rendezvous for both roles
//! - Emit request and completion traces
//!
//! # Design Decisions
//! - Piping happens under `/p/` only; everything else belongs to the static
//!   collaborator (GET/HEAD) or is a reserved-path violation (POST/PUT)
//! - A sender that cannot deliver to its matched receiver evicts the pipe
//!   instead of writing into a dead connection

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, CONTENT_LENGTH, CONTENT_RANGE,
};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::http::error::ProtocolError;
use crate::http::server::AppState;
use crate::pipe::transfer::{build_transfer_headers, resolve_transfer_source, TransferBody};
use crate::pipe::SenderClaim;

/// Namespace reserved for piping; everything under it is a transfer path.
pub const PIPE_PATH_PREFIX: &str = "/p/";

pub fn is_pipe_path(path: &str) -> bool {
    path.starts_with(PIPE_PATH_PREFIX)
}

/// Entry point for every inbound request.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        version = ?request.version(),
        "Incoming request"
    );

    if (method == Method::GET || method == Method::HEAD) && !is_pipe_path(&path) {
        return state.assets.serve(request).await;
    }

    if method == Method::GET {
        receive(state, path, request).await
    } else if method == Method::POST || method == Method::PUT {
        send(state, path, request).await
    } else if method == Method::OPTIONS {
        preflight()
    } else {
        // HEAD on a pipe path lands here as well.
        ProtocolError::UnsupportedMethod { method }.into_response()
    }
}

/// Receiver flow: park the response sink and suspend until the sender
/// delivers the response, or the client goes away.
async fn receive(state: AppState, path: String, request: Request) -> Response {
    // Service Worker registration through a pipe would let a sender plant a
    // script on the receiver's origin.
    let probe = request
        .headers()
        .get("service-worker")
        .is_some_and(|value| value.as_bytes() == b"script");
    if probe {
        return ProtocolError::ServiceWorkerRejected.into_response();
    }

    let pipe = state.registry.get_or_create(&path);
    let waiting = match pipe.join_receiver() {
        Ok(waiting) => waiting,
        Err(_) => return ProtocolError::ReceiverLimit.into_response(),
    };

    tracing::debug!(path = %path, "Receiver waiting for sender");
    match waiting.await {
        Ok(response) => response,
        // The sink was dropped without a response; only possible if the pipe
        // was torn down underneath us.
        Err(_) => pipe_closed(),
    }
}

/// Fallback for either role when its pipe is torn down mid-wait.
fn pipe_closed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        "[ERROR] The pipe was closed unexpectedly.\n",
    )
        .into_response()
}

/// Sender flow: claim exclusivity, wait for a receiver if necessary, hand it
/// a response wrapping this request's body, then block until the copy ends.
async fn send(state: AppState, path: String, request: Request) -> Response {
    let method = request.method().clone();

    if !is_pipe_path(&path) {
        return ProtocolError::ReservedPath { path }.into_response();
    }
    // Resumable uploads are not supported; reject rather than silently
    // ignoring the range.
    if request.headers().contains_key(CONTENT_RANGE) {
        return ProtocolError::ContentRangeUnsupported { method }.into_response();
    }

    let pipe = state.registry.get_or_create(&path);
    let sink = match pipe.claim_sender() {
        Err(_) => return ProtocolError::SenderConnected { path }.into_response(),
        Ok(SenderClaim::Matched(sink)) => sink,
        Ok(SenderClaim::Pending(pending)) => {
            tracing::debug!(path = %path, "Sender waiting for receiver");
            match pending.await {
                Ok(sink) => sink,
                // The handoff vanished without a receiver; only possible if
                // the pipe was torn down underneath us.
                Err(_) => return pipe_closed(),
            }
        }
    };

    let (parts, body) = request.into_parts();
    let (source_headers, stream) = resolve_transfer_source(&parts.headers, body).await;
    let response_headers = build_transfer_headers(&source_headers, &parts.headers);

    let (done_tx, done_rx) = oneshot::channel();
    let transfer = TransferBody::new(
        stream,
        done_tx,
        state.registry.clone(),
        path.clone(),
        pipe.clone(),
    );

    let mut response = Response::new(Body::from_stream(transfer));
    *response.headers_mut() = response_headers;

    if let Err(response) = sink.send(response) {
        // The matched receiver disconnected while parked. Dropping the
        // response drops the transfer body, whose cleanup discards the dead
        // pipe; the path becomes usable again.
        drop(response);
        return ProtocolError::ReceiverGone.into_response();
    }

    // The receiver's connection now drives the copy; wait for it to finish
    // before acknowledging the sender. Cleanup belongs to the transfer body.
    let bytes = done_rx.await.unwrap_or(0);
    tracing::info!(
        path = %path,
        method = %method,
        bytes,
        "Transfer finished"
    );

    (
        StatusCode::OK,
        [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        "",
    )
        .into_response()
}

/// CORS preflight: fixed allow-list, 24h max-age, empty body.
fn preflight() -> Response {
    (
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (
                ACCESS_CONTROL_ALLOW_METHODS,
                "GET, HEAD, POST, PUT, OPTIONS",
            ),
            (
                ACCESS_CONTROL_ALLOW_HEADERS,
                "Content-Type, Content-Disposition, X-Piping",
            ),
            (ACCESS_CONTROL_MAX_AGE, "86400"),
            (CONTENT_LENGTH, "0"),
        ],
        "",
    )
        .into_response()
}
