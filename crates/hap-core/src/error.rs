use thiserror::Error;

use hap_crypto::CryptoError;
use hap_http::HttpError;

/// Errors produced by the connection engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The HTTP codec rejected the inbound bytes.
    #[error("http codec error: {0}")]
    Http(#[from] HttpError),

    /// The crypto session rejected inbound ciphertext or ran out of
    /// nonce space. Always fatal.
    #[error("crypto session error: {0}")]
    Crypto(#[from] CryptoError),

    /// The caller invoked the engine in a way its current state does not
    /// allow, e.g. feeding more bytes while a deferred response is still
    /// outstanding.
    #[error("invalid connection state: {0}")]
    InvalidState(&'static str),
}
