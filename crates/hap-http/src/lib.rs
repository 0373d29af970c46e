//! Sans-IO HTTP/1.1 codec for the HAP accessory transport.
//!
//! [`Codec`] never touches a socket. It accepts raw bytes via
//! [`Codec::feed`] and yields complete `(Request, Bytes)` pairs via
//! [`Codec::poll_request`] once the request line, headers, and body have
//! all arrived — possibly across many `feed` calls, in arbitrarily small
//! pieces. The caller owns the actual I/O and feeds bytes as they arrive
//! from the network.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod codec;
mod error;
mod message;

pub use codec::Codec;
pub use error::HttpError;
pub use message::{Request, Response, ResponseBody};
