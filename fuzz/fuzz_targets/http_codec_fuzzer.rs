//! Fuzz target for the HTTP codec's split-input and malformed-input
//! handling.
//!
//! # Strategy
//!
//! Feed arbitrary bytes into [`hap_http::Codec`] split at arbitrary
//! boundaries, mimicking a socket that delivers data in unpredictable
//! chunk sizes.
//!
//! # Invariants
//!
//! - The codec never panics, regardless of input.
//! - A successfully parsed request's body length matches what
//!   `Content-Length` declared.

#![no_main]

use arbitrary::Arbitrary;
use hap_http::Codec;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct SplitInput {
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|input: SplitInput| {
    let mut codec = Codec::new();

    for chunk in input.chunks.iter().take(64) {
        codec.feed(&chunk[..chunk.len().min(4096)]);

        loop {
            match codec.poll_request() {
                Ok(Some((request, body))) => {
                    if let Some(len) = request.header("content-length") {
                        if let Ok(expected) = len.trim().parse::<usize>() {
                            assert_eq!(body.len(), expected);
                        }
                    }
                },
                Ok(None) => break,
                Err(_) => break,
            }
        }
    }
});
