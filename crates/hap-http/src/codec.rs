use bytes::{Bytes, BytesMut};

use crate::error::HttpError;
use crate::message::Request;

const MAX_HEADERS: usize = 64;

#[derive(Debug)]
enum BodyFraming {
    /// No body expected at all (no `Content-Length`, no chunked encoding).
    None,
    /// Exactly `remaining` more bytes of body are expected.
    ContentLength { remaining: usize },
    /// Chunked transfer-encoding; `chunk_remaining` is `None` between
    /// chunks (still need to read a size line) or `Some(n)` while `n`
    /// bytes of the current chunk's data remain.
    Chunked { chunk_remaining: Option<usize> },
}

struct PartialRequest {
    request: Request,
    framing: BodyFraming,
    body: BytesMut,
}

/// Sans-IO HTTP/1.1 request parser.
///
/// Bytes arrive via [`Self::feed`] in whatever pieces the transport
/// happens to deliver them in — one byte at a time, or many requests'
/// worth at once. [`Self::poll_request`] returns `Ok(None)` until a full
/// request (request line, headers, and body) has accumulated, at which
/// point it returns the parsed request and drains exactly those bytes
/// from the internal buffer, leaving any remainder for the next request.
#[derive(Default)]
pub struct Codec {
    buffer: BytesMut,
    partial: Option<PartialRequest>,
}

impl Codec {
    /// Create an empty codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer newly received bytes for parsing.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempt to produce the next complete `(request, body)` pair.
    /// Returns `Ok(None)` if more bytes are needed.
    pub fn poll_request(&mut self) -> Result<Option<(Request, Bytes)>, HttpError> {
        loop {
            if self.partial.is_none() {
                match self.try_parse_head()? {
                    None => return Ok(None),
                    Some(partial) => self.partial = Some(partial),
                }
            }

            // Safety of `expect`-free access: we just ensured `partial` is
            // `Some` above, or it was already `Some` on entry.
            let Some(partial) = self.partial.as_mut() else {
                return Ok(None);
            };

            match &mut partial.framing {
                BodyFraming::None => {
                    let partial = self.partial.take().unwrap_or_else(|| unreachable!("checked Some above"));
                    return Ok(Some((partial.request, Bytes::new())));
                },
                BodyFraming::ContentLength { remaining } => {
                    let take = (*remaining).min(self.buffer.len());
                    if take > 0 {
                        let chunk = self.buffer.split_to(take);
                        partial.body.extend_from_slice(&chunk);
                        *remaining -= take;
                    }
                    if *remaining > 0 {
                        return Ok(None);
                    }
                    let partial = self.partial.take().unwrap_or_else(|| unreachable!("checked Some above"));
                    return Ok(Some((partial.request, partial.body.freeze())));
                },
                BodyFraming::Chunked { chunk_remaining } => {
                    match drive_chunked(&mut self.buffer, &mut partial.body, chunk_remaining)? {
                        ChunkProgress::NeedMore => return Ok(None),
                        ChunkProgress::Done => {
                            let partial = self.partial.take().unwrap_or_else(|| unreachable!("checked Some above"));
                            return Ok(Some((partial.request, partial.body.freeze())));
                        },
                    }
                },
            }
        }
    }

    fn try_parse_head(&mut self) -> Result<Option<PartialRequest>, HttpError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut headers);

        let status = parsed.parse(&self.buffer).map_err(|e| match e {
            httparse::Error::TooManyHeaders => HttpError::TooManyHeaders,
            other => HttpError::MalformedRequest(other.to_string()),
        })?;

        let consumed = match status {
            httparse::Status::Partial => return Ok(None),
            httparse::Status::Complete(n) => n,
        };

        let method = parsed.method.unwrap_or_default().to_string();
        let path = parsed.path.unwrap_or_default().to_string();
        let header_pairs: Vec<(String, String)> = parsed
            .headers
            .iter()
            .map(|h| (h.name.to_ascii_lowercase(), String::from_utf8_lossy(h.value).into_owned()))
            .collect();

        let request = Request { method, path, headers: header_pairs };
        let framing = determine_framing(&request)?;

        self.buffer.split_to(consumed);
        Ok(Some(PartialRequest { request, framing, body: BytesMut::new() }))
    }
}

fn determine_framing(request: &Request) -> Result<BodyFraming, HttpError> {
    if let Some(value) = request.header("transfer-encoding") {
        if value.eq_ignore_ascii_case("chunked") {
            return Ok(BodyFraming::Chunked { chunk_remaining: None });
        }
    }
    if let Some(value) = request.header("content-length") {
        let len: usize = value.trim().parse().map_err(|_| HttpError::InvalidContentLength)?;
        if len == 0 {
            return Ok(BodyFraming::None);
        }
        return Ok(BodyFraming::ContentLength { remaining: len });
    }
    Ok(BodyFraming::None)
}

enum ChunkProgress {
    NeedMore,
    Done,
}

fn drive_chunked(
    buffer: &mut BytesMut,
    body: &mut BytesMut,
    chunk_remaining: &mut Option<usize>,
) -> Result<ChunkProgress, HttpError> {
    loop {
        match *chunk_remaining {
            None => {
                let Some(line_end) = find_crlf(buffer) else {
                    return Ok(ChunkProgress::NeedMore);
                };
                let size_line = &buffer[..line_end];
                let size_str = std::str::from_utf8(size_line).map_err(|_| HttpError::InvalidChunkSize)?;
                let size_str = size_str.split(';').next().unwrap_or(size_str).trim();
                let size = usize::from_str_radix(size_str, 16).map_err(|_| HttpError::InvalidChunkSize)?;
                buffer.split_to(line_end + 2);

                if size == 0 {
                    // Trailing CRLF after the zero-length terminator chunk.
                    if buffer.len() < 2 {
                        *chunk_remaining = Some(0);
                        return Ok(ChunkProgress::NeedMore);
                    }
                    buffer.split_to(2);
                    return Ok(ChunkProgress::Done);
                }
                *chunk_remaining = Some(size);
            },
            Some(0) => {
                // Only reachable right after the terminator chunk's size
                // line, waiting on its trailing CRLF.
                if buffer.len() < 2 {
                    return Ok(ChunkProgress::NeedMore);
                }
                buffer.split_to(2);
                return Ok(ChunkProgress::Done);
            },
            Some(remaining) => {
                let take = remaining.min(buffer.len());
                if take > 0 {
                    let chunk = buffer.split_to(take);
                    body.extend_from_slice(&chunk);
                    *chunk_remaining = Some(remaining - take);
                }
                match *chunk_remaining {
                    Some(0) => {
                        if buffer.len() < 2 {
                            return Ok(ChunkProgress::NeedMore);
                        }
                        buffer.split_to(2);
                        *chunk_remaining = None;
                    },
                    _ => return Ok(ChunkProgress::NeedMore),
                }
            },
        }
    }
}

fn find_crlf(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn content_length_body_round_trips_regardless_of_split(
            body in prop::collection::vec(any::<u8>(), 0..2048),
            split_ratio in 0.0f64..1.0,
        ) {
            let mut raw = format!("POST /x HTTP/1.1\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes();
            raw.extend_from_slice(&body);

            let split_at = ((raw.len() as f64) * split_ratio) as usize;
            let mut codec = Codec::new();
            codec.feed(&raw[..split_at]);
            codec.feed(&raw[split_at..]);

            let (_, parsed_body) = codec.poll_request().unwrap().unwrap();
            prop_assert_eq!(&parsed_body[..], &body[..]);
        }
    }

    #[test]
    fn parses_request_with_no_body() {
        let mut codec = Codec::new();
        codec.feed(b"GET /accessories HTTP/1.1\r\nHost: x\r\n\r\n");
        let (request, body) = codec.poll_request().unwrap().unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/accessories");
        assert!(body.is_empty());
    }

    #[test]
    fn parses_request_with_content_length_body() {
        let mut codec = Codec::new();
        codec.feed(b"POST /pair-setup HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
        let (request, body) = codec.poll_request().unwrap().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(&body[..], b"hello");
    }

    #[test]
    fn returns_none_on_split_request() {
        let mut codec = Codec::new();
        codec.feed(b"POST /pair-setup HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel");
        assert!(codec.poll_request().unwrap().is_none());
        codec.feed(b"lo");
        let (_, body) = codec.poll_request().unwrap().unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[test]
    fn parses_byte_at_a_time() {
        let mut codec = Codec::new();
        let raw = b"GET /x HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi";
        for byte in raw {
            codec.feed(&[*byte]);
        }
        let (_, body) = codec.poll_request().unwrap().unwrap();
        assert_eq!(&body[..], b"hi");
    }

    #[test]
    fn parses_chunked_body() {
        let mut codec = Codec::new();
        codec.feed(b"POST /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n");
        let (_, body) = codec.poll_request().unwrap().unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[test]
    fn parses_multi_chunk_body() {
        let mut codec = Codec::new();
        codec.feed(
            b"POST /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nfoo\r\n3\r\nbar\r\n0\r\n\r\n",
        );
        let (_, body) = codec.poll_request().unwrap().unwrap();
        assert_eq!(&body[..], b"foobar");
    }

    #[test]
    fn handles_two_pipelined_requests_sequentially() {
        let mut codec = Codec::new();
        codec.feed(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");
        let (first, _) = codec.poll_request().unwrap().unwrap();
        assert_eq!(first.path, "/a");
        let (second, _) = codec.poll_request().unwrap().unwrap();
        assert_eq!(second.path, "/b");
    }

    #[test]
    fn invalid_content_length_is_an_error() {
        let mut codec = Codec::new();
        codec.feed(b"GET /x HTTP/1.1\r\nContent-Length: not-a-number\r\n\r\n");
        assert!(codec.poll_request().is_err());
    }

    #[test]
    fn too_many_headers_is_reported_distinctly() {
        let mut codec = Codec::new();
        let mut raw = b"GET /x HTTP/1.1\r\n".to_vec();
        for i in 0..MAX_HEADERS + 1 {
            raw.extend_from_slice(format!("X-Header-{i}: v\r\n").as_bytes());
        }
        raw.extend_from_slice(b"\r\n");
        codec.feed(&raw);
        assert_eq!(codec.poll_request(), Err(HttpError::TooManyHeaders));
    }
}
