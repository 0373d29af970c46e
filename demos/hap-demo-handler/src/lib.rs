//! Minimal [`hap_core::AccessoryHandler`] used to exercise the HAP
//! transport core from `hap-server`'s binary and integration tests.
//!
//! This is not part of the transport core: real accessory logic (the
//! object graph, TLV8 pairing math, persisted pairings) lives entirely
//! outside the scope this handler stands in for. It implements just
//! enough to drive three observable behaviors: a plaintext pair-setup
//! exchange that hands off a shared key, a route that rejects requests
//! made before that handoff, and a deferred (camera-snapshot-style)
//! route that resolves asynchronously.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use hap_core::{AccessoryHandler, HandlerResponse, PendingBody, ResponseBody};
use hap_http::Request;

/// Status code HAP uses to reject operations attempted before the
/// encrypted session has been established.
const INSUFFICIENT_PRIVILEGES: i32 = -70401;

/// A toy accessory handler with three routes: `/pair-setup`,
/// `/accessories`, and `/snapshot`.
pub struct DemoHandler {
    paired: AtomicBool,
}

impl Default for DemoHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoHandler {
    /// Create a handler with no pairing established yet.
    #[must_use]
    pub fn new() -> Self {
        Self { paired: AtomicBool::new(false) }
    }

    fn handle_pair_setup(&self) -> HandlerResponse {
        let already_paired = self.paired.swap(true, Ordering::SeqCst);
        let mut response = HandlerResponse::ok(Bytes::from_static(b"\x06\x01\x02"));
        response.headers.push(("Content-Type", "application/pairing+tlv8".to_string()));
        if !already_paired {
            response.shared_key = Some([0x24u8; 32]);
        }
        response
    }

    fn handle_accessories(&self, encrypted: bool) -> HandlerResponse {
        if !encrypted {
            let mut response = HandlerResponse::ok(Bytes::from(format!(r#"{{"status": {INSUFFICIENT_PRIVILEGES}}}"#)));
            response.headers.push(("Content-Type", "application/hap+json".to_string()));
            return response;
        }
        let mut response = HandlerResponse::ok(Bytes::from_static(br#"{"accessories":[]}"#));
        response.headers.push(("Content-Type", "application/hap+json".to_string()));
        response
    }

    fn handle_snapshot(&self) -> HandlerResponse {
        HandlerResponse {
            status: 200,
            reason: "OK",
            headers: vec![("Content-Type", "image/jpeg".to_string())],
            body: ResponseBody::Pending(PendingBody::new(async {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                Ok(Bytes::from_static(b"fakesnap"))
            })),
            chunked: true,
            shared_key: None,
        }
    }
}

impl AccessoryHandler for DemoHandler {
    fn dispatch(&self, request: &Request, _body: Bytes, encrypted: bool) -> HandlerResponse {
        match request.path.as_str() {
            "/pair-setup" => self.handle_pair_setup(),
            "/accessories" => self.handle_accessories(encrypted),
            "/snapshot" => self.handle_snapshot(),
            _ => {
                let mut response = HandlerResponse::ok(Bytes::new());
                response.status = 404;
                response.reason = "Not Found";
                response
            },
        }
    }
}
