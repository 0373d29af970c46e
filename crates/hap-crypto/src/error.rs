use thiserror::Error;

/// Errors produced by the HAP crypto session.
///
/// Both variants are fatal: the connection that produced them must be
/// closed, never resumed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD authentication failed while decrypting an inbound frame.
    #[error("AEAD authentication failed")]
    AuthenticationFailed,

    /// The per-direction frame counter would wrap past `u64::MAX`.
    #[error("nonce counter exhausted")]
    CounterOverflow,

    /// A frame's declared length exceeds the 1024-byte HAP frame limit.
    #[error("frame length {0} exceeds the 1024-byte limit")]
    FrameTooLarge(usize),
}
