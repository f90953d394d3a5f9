//! Header translation and streamed copy for a matched pipe.
//!
//! # Responsibilities
//! - Unwrap a multipart/form-data envelope (first part only)
//! - Propagate Content-Type / Content-Length / Content-Disposition under the
//!   single-value rule; ambiguous multi-value headers are dropped
//! - Copy X-Piping verbatim and advertise it for CORS when present
//! - Stream the body with bounded memory, firing completion exactly once
//!
//! # Design Decisions
//! - The receiver's response body wraps the sender's request body stream, so
//!   the receiver's connection drives the copy and transport flow control is
//!   the only backpressure
//! - Cleanup lives in the stream guard itself: it runs whether the copy ends
//!   normally, on a sender error, or because the receiver dropped mid-copy

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE,
};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt, TryStreamExt};
use tokio::sync::oneshot;

use crate::pipe::registry::PathRegistry;
use crate::pipe::rendezvous::Pipe;

/// Application header carried through the pipe verbatim.
pub const X_PIPING: HeaderName = HeaderName::from_static("x-piping");

const X_ROBOTS_TAG: HeaderName = HeaderName::from_static("x-robots-tag");

/// Byte stream flowing from the sender's body into the receiver's response.
pub type ByteStream = BoxStream<'static, Result<Bytes, axum::Error>>;

/// Resolve the transfer-header source and body stream for a sender request.
///
/// A `multipart/form-data` request is unwrapped to its first part: the part's
/// headers replace the request's as the source of Content-Type and
/// Content-Disposition, and the part's content becomes the body. Anything
/// else streams the raw request body. A malformed envelope is recovered
/// locally and never surfaces as an error response.
pub async fn resolve_transfer_source(headers: &HeaderMap, body: Body) -> (HeaderMap, ByteStream) {
    let Some(boundary) = multipart_boundary(headers) else {
        return (headers.clone(), body.into_data_stream().boxed());
    };

    let mut parts = multer::Multipart::new(body.into_data_stream(), boundary);
    match parts.next_field().await {
        Ok(Some(field)) => {
            let part_headers = field.headers().clone();
            (part_headers, field.map_err(axum::Error::new).boxed())
        }
        Ok(None) | Err(_) => {
            // The envelope advertised multipart but carried no readable part.
            tracing::debug!("multipart envelope could not be parsed, transferring empty body");
            (headers.clone(), futures_util::stream::empty().boxed())
        }
    }
}

fn multipart_boundary(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime: mime::Mime = content_type.parse().ok()?;
    if mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA {
        mime.get_param(mime::BOUNDARY)
            .map(|boundary| boundary.as_str().to_owned())
    } else {
        None
    }
}

/// Build the receiver's response headers from the sender's.
///
/// `source` is the transfer-header source (request headers, or first-part
/// headers for multipart); `request` is always the raw request header map,
/// which is where X-Piping is read from. Starting from an empty map also
/// clears any pre-existing Content-Type, so nothing is left to sniff.
pub fn build_transfer_headers(source: &HeaderMap, request: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for name in [CONTENT_TYPE, CONTENT_LENGTH, CONTENT_DISPOSITION] {
        let mut values = source.get_all(&name).iter();
        // Only an unambiguous single value is propagated.
        if let (Some(value), None) = (values.next(), values.next()) {
            headers.insert(name, value.clone());
        }
    }

    let mut has_x_piping = false;
    for value in request.get_all(&X_PIPING) {
        headers.append(X_PIPING, value.clone());
        has_x_piping = true;
    }
    if has_x_piping {
        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("X-Piping"),
        );
    }

    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(X_ROBOTS_TAG, HeaderValue::from_static("none"));
    headers
}

/// Body stream that owns the pipe's cleanup.
///
/// Wraps the sender's byte stream; when the stream ends, errors out, or is
/// dropped because the receiver disconnected, it removes the registry entry
/// and fires the completion signal exactly once with the byte count.
pub struct TransferBody {
    inner: ByteStream,
    completion: Option<Completion>,
    bytes: u64,
}

struct Completion {
    done: oneshot::Sender<u64>,
    registry: Arc<PathRegistry>,
    path: String,
    pipe: Arc<Pipe>,
}

impl TransferBody {
    pub fn new(
        inner: ByteStream,
        done: oneshot::Sender<u64>,
        registry: Arc<PathRegistry>,
        path: String,
        pipe: Arc<Pipe>,
    ) -> Self {
        Self {
            inner,
            completion: Some(Completion {
                done,
                registry,
                path,
                pipe,
            }),
            bytes: 0,
        }
    }

    fn complete(&mut self) {
        if let Some(completion) = self.completion.take() {
            completion.registry.remove(&completion.path, &completion.pipe);
            tracing::debug!(
                path = %completion.path,
                bytes = self.bytes,
                "Pipe discarded"
            );
            let _ = completion.done.send(self.bytes);
        }
    }
}

impl Stream for TransferBody {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.completion.is_none() {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(_))) => {
                // Sender disconnected mid-copy: end the stream silently.
                this.complete();
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for TransferBody {
    fn drop(&mut self) {
        // Receiver disconnected mid-copy: cleanup still runs.
        self.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn single_value_headers_are_propagated() {
        let source = header_map(&[
            ("content-type", "text/plain"),
            ("content-length", "5"),
            ("content-disposition", "attachment; filename=\"a.txt\""),
        ]);
        let headers = build_transfer_headers(&source, &source);

        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "5");
        assert_eq!(
            headers.get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"a.txt\""
        );
    }

    #[test]
    fn ambiguous_multi_value_headers_are_dropped() {
        let source = header_map(&[
            ("content-type", "text/plain"),
            ("content-type", "application/json"),
        ]);
        let headers = build_transfer_headers(&source, &source);
        assert!(headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn absent_headers_stay_absent() {
        let headers = build_transfer_headers(&HeaderMap::new(), &HeaderMap::new());
        assert!(headers.get(CONTENT_TYPE).is_none());
        assert!(headers.get(CONTENT_LENGTH).is_none());
        assert!(headers.get(ACCESS_CONTROL_EXPOSE_HEADERS).is_none());
    }

    #[test]
    fn x_piping_is_copied_verbatim_and_exposed() {
        let request = header_map(&[("x-piping", "a=1"), ("x-piping", "b=2")]);
        let headers = build_transfer_headers(&HeaderMap::new(), &request);

        let values: Vec<_> = headers.get_all(&X_PIPING).iter().collect();
        assert_eq!(values, vec!["a=1", "b=2"]);
        assert_eq!(
            headers.get(ACCESS_CONTROL_EXPOSE_HEADERS).unwrap(),
            "X-Piping"
        );
    }

    #[test]
    fn every_transfer_carries_cors_and_robots_headers() {
        let headers = build_transfer_headers(&HeaderMap::new(), &HeaderMap::new());
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(headers.get(&X_ROBOTS_TAG).unwrap(), "none");
    }

    #[test]
    fn boundary_extraction_requires_form_data() {
        let multipart = header_map(&[(
            "content-type",
            "multipart/form-data; boundary=------boundary123",
        )]);
        assert_eq!(
            multipart_boundary(&multipart).as_deref(),
            Some("------boundary123")
        );

        let mixed = header_map(&[("content-type", "multipart/mixed; boundary=x")]);
        assert_eq!(multipart_boundary(&mixed), None);

        let plain = header_map(&[("content-type", "text/plain")]);
        assert_eq!(multipart_boundary(&plain), None);
    }

    #[tokio::test]
    async fn multipart_first_part_becomes_the_body() {
        let boundary = "XBOUNDARY";
        let payload = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"input_file\"; filename=\"a.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             part one\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"second\"\r\n\r\n\
             part two\r\n\
             --{boundary}--\r\n"
        );
        let content_type = format!("multipart/form-data; boundary={boundary}");
        let request_headers = header_map(&[("content-type", content_type.as_str())]);

        let (headers, stream) =
            resolve_transfer_source(&request_headers, Body::from(payload)).await;

        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
        let chunks: Vec<_> = stream.try_collect::<Vec<_>>().await.unwrap();
        let body: Vec<u8> = chunks.concat();
        assert_eq!(body, b"part one");
    }

    #[tokio::test]
    async fn non_multipart_body_streams_unchanged() {
        let request_headers = header_map(&[("content-type", "application/octet-stream")]);
        let (headers, stream) =
            resolve_transfer_source(&request_headers, Body::from("raw bytes")).await;

        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/octet-stream");
        let chunks: Vec<_> = stream.try_collect::<Vec<_>>().await.unwrap();
        assert_eq!(chunks.concat(), b"raw bytes");
    }

    #[tokio::test]
    async fn malformed_multipart_recovers_locally() {
        let request_headers = header_map(&[(
            "content-type",
            "multipart/form-data; boundary=XBOUNDARY",
        )]);
        let (_, stream) =
            resolve_transfer_source(&request_headers, Body::from("not a multipart body")).await;

        let chunks: Vec<_> = stream.try_collect::<Vec<_>>().await.unwrap();
        assert!(chunks.concat().is_empty());
    }

    #[tokio::test]
    async fn transfer_body_fires_completion_with_byte_count() {
        let registry = Arc::new(PathRegistry::new());
        let pipe = registry.get_or_create("/p/abc");
        let (done_tx, done_rx) = oneshot::channel();

        let inner = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ])
        .boxed();
        let body = TransferBody::new(inner, done_tx, registry.clone(), "/p/abc".into(), pipe);

        let chunks: Vec<_> = body.try_collect::<Vec<_>>().await.unwrap();
        assert_eq!(chunks.concat(), b"hello world");
        assert_eq!(done_rx.await.unwrap(), 11);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn dropped_transfer_body_still_cleans_up() {
        let registry = Arc::new(PathRegistry::new());
        let pipe = registry.get_or_create("/p/abc");
        let (done_tx, done_rx) = oneshot::channel();

        let inner = futures_util::stream::pending().boxed();
        let body = TransferBody::new(inner, done_tx, registry.clone(), "/p/abc".into(), pipe);
        drop(body);

        assert_eq!(done_rx.await.unwrap(), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn stale_body_cleanup_spares_a_replacement_pipe() {
        let registry = Arc::new(PathRegistry::new());
        let old = registry.get_or_create("/p/abc");
        let (done_tx, _done_rx) = oneshot::channel();

        let inner = futures_util::stream::pending().boxed();
        let body = TransferBody::new(inner, done_tx, registry.clone(), "/p/abc".into(), old.clone());

        // The entry turns over while the body is still in flight: its own
        // pipe is discarded and a new one takes the path.
        registry.remove("/p/abc", &old);
        let replacement = registry.get_or_create("/p/abc");

        drop(body);
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.get_or_create("/p/abc"), &replacement));
    }
}
