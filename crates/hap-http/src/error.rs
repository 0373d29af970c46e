use thiserror::Error;

/// Errors produced while parsing inbound HTTP bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// `httparse` rejected the request line or headers.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A header needed to frame the body (`Content-Length`) was present
    /// but not a valid integer.
    #[error("invalid Content-Length header")]
    InvalidContentLength,

    /// A chunked-encoded body had a malformed chunk size line.
    #[error("invalid chunk size")]
    InvalidChunkSize,

    /// The request exceeded the maximum number of headers this codec will
    /// buffer for.
    #[error("too many headers")]
    TooManyHeaders,
}
