//! AEAD frame encryption for the HAP accessory transport.
//!
//! # Key lifecycle
//!
//! ```text
//! shared secret (from pair-verify, 32 bytes)
//!        |
//!        v  HKDF-SHA-512, salt "Control-Salt"
//!   +----+----+
//!   |         |
//! write key  read key    (info "Control-Write-Encryption-Key" / "Control-Read-Encryption-Key")
//!   |         |
//!   v         v
//! encrypt()  feed_ciphertext()/drain_plaintext()
//! ```
//!
//! A [`CryptoSession`] is constructed once per connection, from the shared
//! secret established during pair-verify, and lives for the lifetime of
//! that connection's encrypted phase. There is no re-key operation: once a
//! session is built its two keys never change.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod keys;
mod session;

pub use error::CryptoError;
pub use keys::{SessionKeys, derive_session_keys};
pub use session::CryptoSession;
