use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use thiserror::Error;

use hap_http::Request;

/// Error returned by a deferred handler future.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The accessory-side operation backing a deferred response failed.
    #[error("handler operation failed: {0}")]
    Failed(String),

    /// The connection was closed (e.g. server shutdown) before the
    /// deferred operation resolved.
    #[error("deferred response cancelled")]
    Cancelled,
}

/// A handler response body that is either ready immediately or will
/// resolve later without blocking the connection's task.
pub enum ResponseBody {
    /// The body bytes are already available.
    Ready(Bytes),
    /// The body will be produced by a future, e.g. an accessory that must
    /// perform its own I/O (a camera snapshot) before it can respond.
    /// The connection engine awaits this future without blocking any
    /// other connection, but holds off on parsing further requests from
    /// this connection until it resolves.
    Pending(PendingBody),
}

/// A boxed future producing a deferred response body.
pub struct PendingBody(pub Pin<Box<dyn Future<Output = Result<Bytes, HandlerError>> + Send>>);

impl PendingBody {
    /// Wrap a future as a pending response body.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<Bytes, HandlerError>> + Send + 'static,
    {
        Self(Box::pin(future))
    }
}

/// A response produced by an [`AccessoryHandler`].
pub struct HandlerResponse {
    /// HTTP status code.
    pub status: u16,
    /// HTTP status reason phrase.
    pub reason: &'static str,
    /// Extra response headers (beyond Content-Length/Transfer-Encoding,
    /// which the caller adds automatically).
    pub headers: Vec<(&'static str, String)>,
    /// The response body.
    pub body: ResponseBody,
    /// Whether the body should be sent chunked rather than with a
    /// `Content-Length` header. Used for streamed responses such as a
    /// camera snapshot.
    pub chunked: bool,
    /// If set, the shared secret established by this exchange (typically
    /// pair-verify). The connection engine installs a [`hap_crypto::CryptoSession`]
    /// derived from this key immediately after this response has been
    /// fully written to the socket.
    pub shared_key: Option<[u8; 32]>,
}

impl HandlerResponse {
    /// Build a simple `200 OK` response with a ready body and no crypto
    /// handoff.
    #[must_use]
    pub fn ok(body: Bytes) -> Self {
        Self {
            status: 200,
            reason: "OK",
            headers: Vec::new(),
            body: ResponseBody::Ready(body),
            chunked: false,
            shared_key: None,
        }
    }
}

/// Dispatches parsed requests to accessory-specific logic.
///
/// Implementations must not block the calling task: long-running work
/// (e.g. taking a camera snapshot) must be returned as
/// [`ResponseBody::Pending`] rather than awaited inline.
pub trait AccessoryHandler: Send + Sync {
    /// Handle one fully-received request and its body.
    ///
    /// `encrypted` reports whether the connection has completed the
    /// pairing encryption handoff, so routes that require it can reject
    /// plaintext requests.
    fn dispatch(&self, request: &Request, body: Bytes, encrypted: bool) -> HandlerResponse;
}
