//! The per-connection state machine.
//!
//! ```text
//!              dispatch              shared_key present
//!  Plaintext ------------> Plaintext --------------------> Encrypted
//!      |    (no shared_key)                                    |
//!      |                                                        |
//!      +--------------------------- Close -----------------------+
//! ```
//!
//! A [`ConnectionEngine`] never touches a socket. It is fed raw bytes via
//! [`ConnectionEngine::receive`] and returns [`ConnectionAction`]s describing
//! what the caller should do: write bytes, await a deferred handler
//! response and call [`ConnectionEngine::resume`] with its result, or close
//! the connection. Keeping one connection's entire lifecycle driven by a
//! single caller task (as `hap-server` does, one `tokio::spawn` per
//! connection) is what gives the "no pipelining overlap, ordering
//! preserved" guarantee without any locking inside the engine itself.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use hap_crypto::{CryptoSession, derive_session_keys};
use hap_http::{Codec, Response, ResponseBody as HttpResponseBody};

use crate::env::Environment;
use crate::error::ConnectionError;
use crate::handler::{AccessoryHandler, HandlerError, HandlerResponse, PendingBody, ResponseBody};

/// Which half of the connection's life it is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Traffic is plain HTTP/1.1; no crypto session has been installed.
    Plaintext,
    /// Traffic is AEAD-framed; all reads and writes go through a
    /// [`CryptoSession`].
    Encrypted,
}

/// Why the engine asked the caller to close the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// No activity within `ConnectionConfig::idle_timeout`.
    IdleTimeout,
    /// A deferred handler response failed.
    HandlerFailure,
    /// The server is shutting down.
    Shutdown,
}

/// An instruction for the executor driving this connection.
pub enum ConnectionAction {
    /// Write these bytes to the socket, in order.
    Send(Bytes),
    /// Await this future, then call [`ConnectionEngine::resume`] with its
    /// result. Until `resume` is called, no further [`ConnectionEngine::receive`]
    /// calls should be made on this engine.
    Defer(PendingBody),
    /// Close the connection for the given reason.
    Close(CloseReason),
}

/// Tuning knobs for a connection's lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// How long a connection may sit idle before the engine asks the
    /// caller to close it. HAP itself does not mandate a value; this
    /// exists so a connection cannot live forever as a resource leak.
    pub idle_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { idle_timeout: Duration::from_secs(15 * 60) }
    }
}

struct PendingMeta {
    status: u16,
    reason: &'static str,
    headers: Vec<(&'static str, String)>,
    chunked: bool,
    shared_key: Option<[u8; 32]>,
}

/// The per-connection HAP protocol engine: HTTP codec + optional crypto
/// session + handler dispatch, all driven by inbound bytes.
pub struct ConnectionEngine<H: AccessoryHandler, E: Environment> {
    phase: ConnectionPhase,
    http: Codec,
    crypto: Option<CryptoSession>,
    handler: Arc<H>,
    env: E,
    config: ConnectionConfig,
    pending: Option<PendingMeta>,
    last_activity: E::Instant,
}

impl<H: AccessoryHandler, E: Environment> ConnectionEngine<H, E> {
    /// Create a new engine in the `Plaintext` phase.
    pub fn new(handler: Arc<H>, env: E, config: ConnectionConfig) -> Self {
        let last_activity = env.now();
        Self {
            phase: ConnectionPhase::Plaintext,
            http: Codec::new(),
            crypto: None,
            handler,
            env,
            config,
            pending: None,
            last_activity,
        }
    }

    /// The connection's current phase.
    #[must_use]
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Whether a deferred response is currently outstanding. While `true`,
    /// callers must not call [`Self::receive`] again until [`Self::resume`]
    /// has been called.
    #[must_use]
    pub fn is_awaiting_response(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed newly received bytes (ciphertext if `phase()` is `Encrypted`,
    /// plaintext HTTP otherwise) and process as many complete requests as
    /// are available.
    pub fn receive(&mut self, data: &[u8]) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.pending.is_some() {
            return Err(ConnectionError::InvalidState(
                "received bytes while a deferred response is outstanding",
            ));
        }
        self.last_activity = self.env.now();

        if let Some(crypto) = self.crypto.as_mut() {
            crypto.feed_ciphertext(data);
        } else {
            self.http.feed(data);
        }

        self.drain()
    }

    /// Resume processing after a deferred [`ConnectionAction::Defer`]
    /// future has resolved.
    pub fn resume(&mut self, result: Result<Bytes, HandlerError>) -> Result<Vec<ConnectionAction>, ConnectionError> {
        let meta = self
            .pending
            .take()
            .ok_or(ConnectionError::InvalidState("resume called with no deferred response outstanding"))?;

        let mut actions = Vec::new();
        match result {
            Ok(body) => {
                let wire = self.encode_response(meta.status, meta.reason, &meta.headers, meta.chunked, body)?;
                actions.push(ConnectionAction::Send(wire));
                self.maybe_install_crypto(meta.shared_key);
            },
            Err(HandlerError::Cancelled) => {
                actions.push(ConnectionAction::Close(CloseReason::Shutdown));
                return Ok(actions);
            },
            Err(_) => {
                actions.push(ConnectionAction::Close(CloseReason::HandlerFailure));
                return Ok(actions);
            },
        }

        actions.extend(self.drain()?);
        Ok(actions)
    }

    /// Encode a push-event frame for sending out of band, encrypting it
    /// if the connection is currently `Encrypted`. Mirrors the crypto
    /// handling in [`Self::encode_response`]; unlike a request/response
    /// frame, an event never carries a crypto handoff of its own.
    pub fn encode_event(&mut self, frame: Bytes) -> Result<Bytes, ConnectionError> {
        match self.crypto.as_mut() {
            Some(crypto) => Ok(crypto.encrypt(&frame)?),
            None => Ok(frame),
        }
    }

    /// Check for idle timeout; returns a `Close` action if the connection
    /// has been silent too long.
    pub fn tick(&mut self, now: E::Instant) -> Vec<ConnectionAction> {
        if self.pending.is_some() {
            return Vec::new();
        }
        if now - self.last_activity >= self.config.idle_timeout {
            tracing::info!("closing connection after idle timeout");
            vec![ConnectionAction::Close(CloseReason::IdleTimeout)]
        } else {
            Vec::new()
        }
    }

    fn drain(&mut self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if let Some(crypto) = self.crypto.as_mut() {
            while let Some(plaintext) = crypto.drain_plaintext()? {
                self.http.feed(&plaintext);
            }
        }

        let mut actions = Vec::new();
        loop {
            let Some((request, body)) = self.http.poll_request()? else {
                return Ok(actions);
            };

            let encrypted = matches!(self.phase, ConnectionPhase::Encrypted);
            let response: HandlerResponse = self.handler.dispatch(&request, body, encrypted);

            match response.body {
                ResponseBody::Ready(body_bytes) => {
                    let wire =
                        self.encode_response(response.status, response.reason, &response.headers, response.chunked, body_bytes)?;
                    actions.push(ConnectionAction::Send(wire));
                    self.maybe_install_crypto(response.shared_key);
                },
                ResponseBody::Pending(future) => {
                    self.pending = Some(PendingMeta {
                        status: response.status,
                        reason: response.reason,
                        headers: response.headers,
                        chunked: response.chunked,
                        shared_key: response.shared_key,
                    });
                    actions.push(ConnectionAction::Defer(future));
                    return Ok(actions);
                },
            }
        }
    }

    fn encode_response(
        &mut self,
        status: u16,
        reason: &'static str,
        headers: &[(&'static str, String)],
        chunked: bool,
        body: Bytes,
    ) -> Result<Bytes, ConnectionError> {
        let body = if chunked { HttpResponseBody::Chunked(body) } else { HttpResponseBody::Full(body) };
        let response = Response { status, reason, headers: headers.to_vec(), body };
        let plaintext = response.encode();

        match self.crypto.as_mut() {
            Some(crypto) => Ok(crypto.encrypt(&plaintext)?),
            None => Ok(plaintext),
        }
    }

    /// Install the crypto session carried by a just-sent response, if any.
    /// Must only be called after that response's bytes have already been
    /// queued for send: the crypto handoff takes effect for the *next*
    /// frame, not the one that carried the key.
    fn maybe_install_crypto(&mut self, shared_key: Option<[u8; 32]>) {
        if let Some(secret) = shared_key {
            let keys = derive_session_keys(&secret);
            self.crypto = Some(CryptoSession::new(&keys));
            self.phase = ConnectionPhase::Encrypted;
            tracing::debug!("connection upgraded to encrypted transport");
        }
    }
}
