use bytes::{Bytes, BytesMut};

/// A fully parsed HTTP/1.1 request line plus headers. The body, if any, is
/// handed to the caller separately once fully accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The request method, e.g. `"GET"`, `"POST"`, `"PUT"`.
    pub method: String,
    /// The request target, e.g. `"/pair-setup"`.
    pub path: String,
    /// Headers in the order they appeared on the wire, lower-cased names.
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// Return the value of the first header matching `name`
    /// (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// How a response body should be framed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Send `Content-Length: <len>` followed by the full body.
    Full(Bytes),
    /// Send `Transfer-Encoding: chunked`, with the body as a single chunk
    /// followed by the terminating zero-length chunk.
    Chunked(Bytes),
}

/// A response ready to serialize onto the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code, e.g. `200`.
    pub status: u16,
    /// Status reason phrase, e.g. `"OK"`.
    pub reason: &'static str,
    /// Extra headers beyond `Content-Type`/`Content-Length`/
    /// `Transfer-Encoding`, which are added automatically.
    pub headers: Vec<(&'static str, String)>,
    /// The response body and its wire framing.
    pub body: ResponseBody,
}

impl Response {
    /// Serialize this response to its exact wire bytes.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();
        out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", self.status, self.reason).as_bytes());

        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }

        match &self.body {
            ResponseBody::Full(body) => {
                out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
                out.extend_from_slice(body);
            },
            ResponseBody::Chunked(body) => {
                out.extend_from_slice(b"Transfer-Encoding: chunked\r\n\r\n");
                out.extend_from_slice(format!("{:x}\r\n", body.len()).as_bytes());
                out.extend_from_slice(body);
                out.extend_from_slice(b"\r\n0\r\n\r\n");
            },
        }
        out.freeze()
    }

    /// Construct an `EVENT/1.0 200 OK` push message carrying `body` as
    /// `application/hap+json`, per the HAP event-push wire format.
    #[must_use]
    pub fn event_push(body: Bytes) -> Bytes {
        let mut out = BytesMut::new();
        out.extend_from_slice(b"EVENT/1.0 200 OK\r\n");
        out.extend_from_slice(b"Content-Type: application/hap+json\r\n");
        out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
        out.extend_from_slice(&body);
        out.freeze()
    }
}
