//! Per-stream state machine turning SPDY frames into HTTP/1.1 request bytes.
//!
//! The request line and header block are written as soon as the stream
//! opens. The body is framed with the declared `content-length` when one is
//! present and with chunked transfer coding otherwise, so a downstream
//! HTTP/1.1 parser always sees a complete, self-delimiting request.

use std::mem;

use log::{debug, warn};

use super::{SharedAccumulator, StreamHandler};
use crate::{
    error::StreamError,
    frame::{HeaderBlock, StreamId, SynStream, VALUE_SEPARATOR, merge_in_header},
    metrics,
};

/// Names carrying the request line rather than ordinary headers.
const REQUEST_FIELDS: &[&str] = &["method", "url", "version", "scheme"];

/// Connection-specific headers with no meaning once demultiplexed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
];

const CONTENT_LENGTH: &str = "content-length";
const HOST: &str = "host";

/// Externally visible converter state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConverterState {
    /// Waiting for the stream-open frame.
    AwaitingHeaders,
    /// The request head was written; body frames are being converted.
    StreamingBody,
    /// The stream ended and the request is complete.
    Terminated,
    /// The stream failed; nothing more is written.
    Error,
}

#[derive(Debug)]
enum BodyFraming {
    /// Header block still open; framing is chosen by the first body byte.
    Pending,
    /// Body delimited by `content-length`.
    Identity { declared: u64, received: u64 },
    /// Chunked body; trailers arrive via `HEADERS` frames.
    Chunked { trailers: HeaderBlock },
}

#[derive(Debug)]
enum State {
    AwaitingHeaders,
    StreamingBody(BodyFraming),
    Terminated,
    Error,
}

/// Validated request line and headers from a stream-open frame.
struct RequestHead<'a> {
    method: &'a str,
    url: &'a str,
    version: &'a str,
    host: &'a str,
    fields: HeaderBlock,
    content_length: Option<u64>,
}

/// Converts one logical stream into HTTP/1.1 request bytes written to its
/// accumulator.
#[derive(Debug)]
pub struct StreamConverter {
    stream_id: StreamId,
    accumulator: SharedAccumulator,
    state: State,
}

impl StreamConverter {
    /// Create a converter for `stream_id` writing into `accumulator`.
    #[must_use]
    pub fn new(stream_id: StreamId, accumulator: SharedAccumulator) -> Self {
        Self {
            stream_id,
            accumulator,
            state: State::AwaitingHeaders,
        }
    }

    /// Stream this converter serves.
    #[must_use]
    pub const fn stream_id(&self) -> StreamId { self.stream_id }

    /// Accumulator receiving this stream's output.
    #[must_use]
    pub const fn accumulator(&self) -> &SharedAccumulator { &self.accumulator }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConverterState {
        match self.state {
            State::AwaitingHeaders => ConverterState::AwaitingHeaders,
            State::StreamingBody(_) => ConverterState::StreamingBody,
            State::Terminated => ConverterState::Terminated,
            State::Error => ConverterState::Error,
        }
    }

    fn emit(&self, bytes: &[u8]) { self.accumulator.borrow_mut().write(bytes); }

    fn fail(&mut self, error: StreamError) {
        warn!("stream {} failed: {error}", self.stream_id);
        self.accumulator.borrow_mut().mark_error(error);
        self.state = State::Error;
        metrics::inc_stream_errors();
    }

    fn terminate(&mut self) {
        self.accumulator.borrow_mut().mark_complete();
        self.state = State::Terminated;
        debug!("stream {} complete", self.stream_id);
    }

    fn open(&mut self, frame: &SynStream) -> Result<(), StreamError> {
        let head = RequestHead::parse(self.stream_id, &frame.headers)?;
        debug!(
            "stream {}: {} {} {}",
            self.stream_id, head.method, head.url, head.version
        );

        let mut out = format!("{} {} {}\r\n", head.method, head.url, head.version);
        push_line(&mut out, HOST, head.host);
        push_fields(&mut out, &head.fields);

        if frame.is_fin() {
            if let Some(declared) = head.content_length.filter(|&n| n != 0) {
                return Err(StreamError::ContentLengthMismatch {
                    stream_id: self.stream_id,
                    declared,
                    received: 0,
                });
            }
            out.push_str("\r\n");
            self.emit(out.as_bytes());
            self.terminate();
            return Ok(());
        }

        let framing = match head.content_length {
            Some(declared) => {
                out.push_str("\r\n");
                BodyFraming::Identity {
                    declared,
                    received: 0,
                }
            }
            None => BodyFraming::Pending,
        };
        self.emit(out.as_bytes());
        self.state = State::StreamingBody(framing);
        Ok(())
    }

    fn body(
        &mut self,
        framing: BodyFraming,
        payload: &[u8],
        fin: bool,
    ) -> Result<(), StreamError> {
        let framing = match framing {
            BodyFraming::Pending if payload.is_empty() => BodyFraming::Pending,
            BodyFraming::Pending => {
                let mut out = String::new();
                push_line(&mut out, "transfer-encoding", "chunked");
                out.push_str("\r\n");
                self.emit(out.as_bytes());
                self.emit_chunk(payload);
                BodyFraming::Chunked {
                    trailers: HeaderBlock::new(),
                }
            }
            BodyFraming::Identity { declared, received } => {
                let len = u64::try_from(payload.len()).unwrap_or(u64::MAX);
                let received = received.saturating_add(len);
                if received > declared {
                    return Err(StreamError::ContentLengthMismatch {
                        stream_id: self.stream_id,
                        declared,
                        received,
                    });
                }
                self.emit(payload);
                BodyFraming::Identity { declared, received }
            }
            BodyFraming::Chunked { trailers } => {
                if !payload.is_empty() {
                    self.emit_chunk(payload);
                }
                BodyFraming::Chunked { trailers }
            }
        };
        self.settle(framing, fin)
    }

    fn headers(
        &mut self,
        framing: BodyFraming,
        headers: &HeaderBlock,
        fin: bool,
    ) -> Result<(), StreamError> {
        let framing = match framing {
            BodyFraming::Pending => {
                let mut fields = HeaderBlock::new();
                let content_length = collect_fields(self.stream_id, headers, &mut fields)?;
                let mut out = String::new();
                push_fields(&mut out, &fields);
                match content_length {
                    Some(declared) => {
                        out.push_str("\r\n");
                        self.emit(out.as_bytes());
                        BodyFraming::Identity {
                            declared,
                            received: 0,
                        }
                    }
                    None => {
                        self.emit(out.as_bytes());
                        BodyFraming::Pending
                    }
                }
            }
            BodyFraming::Chunked { mut trailers } => {
                let mut fields = HeaderBlock::new();
                collect_fields(self.stream_id, headers, &mut fields)?;
                fields.remove(CONTENT_LENGTH);
                for (name, value) in &fields {
                    merge_in_header(&mut trailers, name, value);
                }
                BodyFraming::Chunked { trailers }
            }
            identity @ BodyFraming::Identity { .. } => {
                debug!(
                    "stream {}: ignoring headers after a sized body started",
                    self.stream_id
                );
                identity
            }
        };
        self.settle(framing, fin)
    }

    /// Store `framing` back, or close the request when `fin` is set.
    fn settle(&mut self, framing: BodyFraming, fin: bool) -> Result<(), StreamError> {
        if !fin {
            self.state = State::StreamingBody(framing);
            return Ok(());
        }
        match framing {
            BodyFraming::Pending => self.emit(b"\r\n"),
            BodyFraming::Identity { declared, received } => {
                if received != declared {
                    return Err(StreamError::ContentLengthMismatch {
                        stream_id: self.stream_id,
                        declared,
                        received,
                    });
                }
            }
            BodyFraming::Chunked { trailers } => {
                let mut out = String::from("0\r\n");
                push_fields(&mut out, &trailers);
                out.push_str("\r\n");
                self.emit(out.as_bytes());
            }
        }
        self.terminate();
        Ok(())
    }

    fn emit_chunk(&self, payload: &[u8]) {
        let mut acc = self.accumulator.borrow_mut();
        acc.write(format!("{:x}\r\n", payload.len()).as_bytes());
        acc.write(payload);
        acc.write(b"\r\n");
    }

    /// Run `step` against the body framing if the stream is streaming.
    fn with_body<F>(&mut self, what: &str, step: F)
    where
        F: FnOnce(&mut Self, BodyFraming) -> Result<(), StreamError>,
    {
        match mem::replace(&mut self.state, State::Error) {
            State::StreamingBody(framing) => {
                if let Err(error) = step(self, framing) {
                    self.fail(error);
                }
            }
            State::AwaitingHeaders => {
                self.state = State::AwaitingHeaders;
                self.fail(StreamError::UnknownStream {
                    stream_id: self.stream_id,
                });
            }
            State::Terminated => {
                self.state = State::Terminated;
                warn!("stream {}: {what} after stream end ignored", self.stream_id);
            }
            State::Error => {}
        }
    }
}

impl StreamHandler for StreamConverter {
    fn on_syn_stream(&mut self, frame: &SynStream) {
        match self.state {
            State::AwaitingHeaders => {
                if let Err(error) = self.open(frame) {
                    self.fail(error);
                }
            }
            State::Error => {}
            State::StreamingBody(_) | State::Terminated => {
                self.fail(StreamError::DuplicateStream {
                    stream_id: self.stream_id,
                });
            }
        }
    }

    fn on_data(&mut self, payload: &[u8], fin: bool) {
        self.with_body("data", |this, framing| this.body(framing, payload, fin));
    }

    fn on_headers(&mut self, headers: &HeaderBlock, fin: bool) {
        self.with_body("headers", |this, framing| this.headers(framing, headers, fin));
    }

    fn on_reset(&mut self, status: u32) {
        if matches!(self.state, State::Terminated | State::Error) {
            return;
        }
        self.fail(StreamError::Reset {
            stream_id: self.stream_id,
            status,
        });
    }

    fn on_error(&mut self, error: StreamError) {
        match self.state {
            State::Error => {}
            State::Terminated => {
                debug!(
                    "stream {}: error after stream end ignored: {error}",
                    self.stream_id
                );
            }
            State::AwaitingHeaders | State::StreamingBody(_) => self.fail(error),
        }
    }

    fn is_terminated(&self) -> bool { matches!(self.state, State::Terminated) }
}

impl<'a> RequestHead<'a> {
    fn parse(stream_id: StreamId, headers: &'a HeaderBlock) -> Result<Self, StreamError> {
        let method = required(stream_id, headers, "method", &["method", ":method"])?;
        let url = required(stream_id, headers, "url", &["url", ":path"])?;
        let version = required(stream_id, headers, "version", &["version", ":version"])?;
        let host = required(stream_id, headers, HOST, &[HOST, ":host"])?;

        let invalid = |name: &str| StreamError::InvalidHeader {
            stream_id,
            name: name.to_owned(),
        };
        if !is_token(method) {
            return Err(invalid("method"));
        }
        if url.is_empty()
            || url
                .bytes()
                .any(|b| b.is_ascii_whitespace() || b.is_ascii_control())
        {
            return Err(invalid("url"));
        }
        if !version.starts_with("HTTP/") || version.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(invalid("version"));
        }
        if host.is_empty() || !is_field_value(host) || host.contains(VALUE_SEPARATOR) {
            return Err(invalid(HOST));
        }

        let mut fields = HeaderBlock::new();
        let content_length = collect_fields(stream_id, headers, &mut fields)?;
        Ok(Self {
            method,
            url,
            version,
            host,
            fields,
            content_length,
        })
    }
}

fn required<'a>(
    stream_id: StreamId,
    headers: &'a HeaderBlock,
    name: &'static str,
    aliases: &[&str],
) -> Result<&'a str, StreamError> {
    aliases
        .iter()
        .find_map(|alias| headers.get(*alias))
        .map(String::as_str)
        .ok_or(StreamError::MissingHeader { stream_id, name })
}

/// Copy the ordinary headers of `headers` into `fields`, validating them.
///
/// Returns the declared `content-length`, if any.
fn collect_fields(
    stream_id: StreamId,
    headers: &HeaderBlock,
    fields: &mut HeaderBlock,
) -> Result<Option<u64>, StreamError> {
    let mut content_length = None;
    for (name, value) in headers {
        let name = name.as_str();
        if name.starts_with(':') || name == HOST || REQUEST_FIELDS.contains(&name) {
            continue;
        }
        if HOP_BY_HOP.contains(&name) {
            debug!("stream {stream_id}: dropping hop-by-hop header {name}");
            continue;
        }
        if !is_token(name) || !is_field_value(value) {
            return Err(StreamError::InvalidHeader {
                stream_id,
                name: name.to_owned(),
            });
        }
        if name == CONTENT_LENGTH {
            content_length = Some(parse_content_length(stream_id, value)?);
        }
        merge_in_header(fields, name, value);
    }
    Ok(content_length)
}

/// All parts of a multi-valued `content-length` must agree.
fn parse_content_length(stream_id: StreamId, value: &str) -> Result<u64, StreamError> {
    let mut declared = None;
    for part in value.split(VALUE_SEPARATOR) {
        let part = part.trim();
        let parsed = part
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| part.parse::<u64>().ok())
            .flatten();
        match (parsed, declared) {
            (Some(n), None) => declared = Some(n),
            (Some(n), Some(prev)) if n == prev => {}
            _ => {
                return Err(StreamError::InvalidHeader {
                    stream_id,
                    name: CONTENT_LENGTH.to_owned(),
                });
            }
        }
    }
    declared.ok_or(StreamError::InvalidHeader {
        stream_id,
        name: CONTENT_LENGTH.to_owned(),
    })
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

fn is_field_value(s: &str) -> bool { !s.bytes().any(|b| b == b'\r' || b == b'\n') }

fn push_line(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

fn push_fields(out: &mut String, fields: &HeaderBlock) {
    for (name, value) in fields {
        for part in value.split(VALUE_SEPARATOR) {
            push_line(out, name, part);
        }
    }
}
