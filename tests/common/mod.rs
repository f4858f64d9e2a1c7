//! Shared utilities for integration tests.
//!
//! Provides a scripted raw transport, SPDY/2 frame builders, a log capture
//! fixture, and a small HTTP/1.1 request parser used to check the filter's
//! output.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, OnceLock},
};

use bytes::{BufMut, Bytes, BytesMut};
use logtest::Logger;
use rstest::fixture;
use spdy_demux::{
    BlockMode,
    Brigade,
    ByteSource,
    ConnectionContext,
    InputFilter,
    NegotiationState,
    ReadError,
    ReadMode,
    ReadResult,
    SpeculativeRead,
    frame::{FLAG_FIN, Frame, FrameProcessor, HeaderBlock, SpdyFrameProcessor, StreamId, SynStream},
};

/// One scripted outcome of a raw read.
#[derive(Clone, Debug)]
pub enum Step {
    /// Bytes served across as many reads as needed.
    Bytes(Vec<u8>),
    /// A status returned once.
    Status(ReadError),
}

/// Raw transport replaying a script, then reporting `end` forever.
#[derive(Debug)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    end: ReadError,
    /// Negotiation outcome published by the first successful probe.
    pub negotiate: Option<(ConnectionContext, NegotiationState)>,
    /// Number of consuming reads served.
    pub reads: usize,
    /// Number of probes served.
    pub probes: usize,
}

impl ScriptedSource {
    /// Serve `bytes`, then report would-block.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_steps([Step::Bytes(bytes.into())], ReadError::WouldBlock)
    }

    /// Serve `steps`, then report `end`.
    pub fn from_steps(steps: impl IntoIterator<Item = Step>, end: ReadError) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            end,
            negotiate: None,
            reads: 0,
            probes: 0,
        }
    }
}

impl ByteSource for ScriptedSource {
    fn read(
        &mut self,
        brigade: &mut Brigade,
        mode: ReadMode,
        _block: BlockMode,
        max_bytes: usize,
    ) -> ReadResult {
        if mode == ReadMode::Init {
            return Ok(());
        }
        self.reads += 1;
        match self.steps.pop_front() {
            None => Err(self.end.clone()),
            Some(Step::Status(status)) => Err(status),
            Some(Step::Bytes(mut bytes)) => {
                let len = match mode {
                    ReadMode::Exhaustive => bytes.len(),
                    ReadMode::GetLine => bytes
                        .iter()
                        .take(max_bytes)
                        .position(|&b| b == b'\n')
                        .map_or(bytes.len().min(max_bytes), |pos| pos + 1),
                    _ => bytes.len().min(max_bytes),
                };
                brigade.push_bytes(&bytes[..len]);
                if mode == ReadMode::Speculative {
                    self.steps.push_front(Step::Bytes(bytes));
                } else if len < bytes.len() {
                    self.steps.push_front(Step::Bytes(bytes.split_off(len)));
                }
                Ok(())
            }
        }
    }
}

impl SpeculativeRead for ScriptedSource {
    fn probe(&mut self) -> ReadResult {
        self.probes += 1;
        if let Some(Step::Status(_)) = self.steps.front() {
            return match self.steps.pop_front() {
                Some(Step::Status(status)) => Err(status),
                _ => Ok(()),
            };
        }
        if let Some((ctx, state)) = self.negotiate.take() {
            ctx.set_negotiation_state(state);
        }
        if self.steps.is_empty() {
            return Err(self.end.clone());
        }
        Ok(())
    }
}

/// Wrap `source` in a filter for a connection that negotiated SPDY.
pub fn spdy_filter(source: ScriptedSource) -> InputFilter<ScriptedSource> {
    InputFilter::new(source, ConnectionContext::with_state(NegotiationState::UsingSpdy))
}

/// Read non-blocking until the filter reports anything but success.
///
/// Returns every byte delivered, the final status, and whether an
/// end-of-stream marker was appended.
pub fn read_until_status<S: ByteSource>(filter: &mut S) -> (Vec<u8>, ReadError, bool) {
    let mut out = Vec::new();
    loop {
        let mut brigade = Brigade::new();
        let result = filter.read(&mut brigade, ReadMode::ReadBytes, BlockMode::NonBlocking, 4096);
        out.extend_from_slice(brigade.as_bytes());
        if let Err(status) = result {
            return (out, status, brigade.is_eos());
        }
    }
}

/// Header block from `(name, value)` pairs.
pub fn block(pairs: &[(&str, &str)]) -> HeaderBlock {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

/// Request fields for `method url` against `example.com`.
pub fn request(method: &str, url: &str) -> HeaderBlock {
    block(&[
        ("method", method),
        ("url", url),
        ("version", "HTTP/1.1"),
        ("host", "example.com"),
        ("scheme", "https"),
    ])
}

fn encode(frame: &Frame) -> Vec<u8> {
    let mut dst = BytesMut::new();
    SpdyFrameProcessor::default()
        .encode(frame, &mut dst)
        .expect("test frame encodes");
    dst.to_vec()
}

const fn fin_flag(fin: bool) -> u8 {
    if fin { FLAG_FIN } else { 0 }
}

/// Encoded `SYN_STREAM`.
pub fn syn_stream(stream_id: u32, headers: HeaderBlock, fin: bool) -> Vec<u8> {
    encode(&Frame::SynStream(SynStream {
        stream_id: StreamId(stream_id),
        associated_stream_id: StreamId(0),
        priority: 0,
        flags: fin_flag(fin),
        headers,
    }))
}

/// Encoded data frame.
pub fn data(stream_id: u32, payload: &[u8], fin: bool) -> Vec<u8> {
    encode(&Frame::Data {
        stream_id: StreamId(stream_id),
        flags: fin_flag(fin),
        payload: Bytes::copy_from_slice(payload),
    })
}

/// Encoded `HEADERS`.
pub fn headers(stream_id: u32, headers: HeaderBlock, fin: bool) -> Vec<u8> {
    encode(&Frame::Headers {
        stream_id: StreamId(stream_id),
        flags: fin_flag(fin),
        headers,
    })
}

/// Encoded `RST_STREAM`.
pub fn rst_stream(stream_id: u32, status: u32) -> Vec<u8> {
    encode(&Frame::RstStream {
        stream_id: StreamId(stream_id),
        status,
    })
}

/// Encoded `PING`.
pub fn ping(id: u32) -> Vec<u8> { encode(&Frame::Ping { id }) }

/// `SYN_STREAM` carrying `block` verbatim as its header block.
pub fn raw_syn_stream(stream_id: u32, block: &[u8]) -> Vec<u8> {
    let mut payload = BytesMut::new();
    payload.put_u32(stream_id);
    payload.put_u32(0);
    payload.put_u16(0);
    payload.put_slice(block);

    let mut frame = BytesMut::new();
    frame.put_u16(0x8002);
    frame.put_u16(1);
    frame.put_u8(0);
    let len = u32::try_from(payload.len()).expect("test payload fits");
    frame.put_slice(&len.to_be_bytes()[1..]);
    frame.put_slice(&payload);
    frame.to_vec()
}

/// Concatenate encoded frames.
pub fn wire(frames: impl IntoIterator<Item = Vec<u8>>) -> Vec<u8> {
    frames.into_iter().flatten().collect()
}

/// A request parsed back out of the filter's output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub trailers: Vec<(String, String)>,
}

impl ParsedRequest {
    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn take_line<'a>(input: &mut &'a [u8]) -> Result<&'a str, String> {
    let pos = input
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or("unterminated line")?;
    let line = std::str::from_utf8(&input[..pos]).map_err(|e| e.to_string())?;
    *input = &input[pos + 2..];
    Ok(line)
}

fn take_fields(input: &mut &[u8]) -> Result<Vec<(String, String)>, String> {
    let mut fields = Vec::new();
    loop {
        let line = take_line(input)?;
        if line.is_empty() {
            return Ok(fields);
        }
        let (name, value) = line.split_once(": ").ok_or(format!("bad field {line:?}"))?;
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(format!("bad field name {name:?}"));
        }
        fields.push((name.to_owned(), value.to_owned()));
    }
}

fn take_bytes(input: &mut &[u8], len: usize) -> Result<Vec<u8>, String> {
    if input.len() < len {
        return Err(format!("body truncated: {} < {len}", input.len()));
    }
    let (body, rest) = input.split_at(len);
    *input = rest;
    Ok(body.to_vec())
}

fn parse_one(input: &mut &[u8]) -> Result<ParsedRequest, String> {
    let line = take_line(input)?;
    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("bad request line {line:?}"));
    };
    if !version.starts_with("HTTP/") {
        return Err(format!("bad version {version:?}"));
    }
    let headers = take_fields(input)?;
    let field = |name: &str| {
        headers
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
    };
    let lengths = field("content-length");
    let chunked = field("transfer-encoding") == ["chunked"];

    let mut body = Vec::new();
    let mut trailers = Vec::new();
    if chunked {
        if !lengths.is_empty() {
            return Err("both content-length and chunked".into());
        }
        loop {
            let size = take_line(input)?;
            let size = usize::from_str_radix(size, 16).map_err(|e| e.to_string())?;
            if size == 0 {
                trailers = take_fields(input)?;
                break;
            }
            body.extend(take_bytes(input, size)?);
            if take_line(input)? != "" {
                return Err("chunk not followed by CRLF".into());
            }
        }
    } else if let Some(first) = lengths.first() {
        if lengths.iter().any(|l| l != first) {
            return Err("conflicting content-length".into());
        }
        let len = first.parse().map_err(|_| format!("bad content-length {first:?}"))?;
        body = take_bytes(input, len)?;
    }

    Ok(ParsedRequest {
        method: method.to_owned(),
        target: target.to_owned(),
        version: version.to_owned(),
        headers,
        body,
        trailers,
    })
}

/// Parse a sequence of complete HTTP/1.1 requests.
///
/// # Errors
///
/// Describes the first syntax error or truncated request.
pub fn parse_requests(mut input: &[u8]) -> Result<Vec<ParsedRequest>, String> {
    let mut requests = Vec::new();
    while !input.is_empty() {
        requests.push(parse_one(&mut input)?);
    }
    Ok(requests)
}

/// Handle to the global logger with exclusive access.
///
/// Serialises log capture so tests in one binary do not see each other's
/// records.
pub struct LoggerHandle {
    guard: MutexGuard<'static, Logger>,
}

impl LoggerHandle {
    /// Acquire the global [`Logger`] and discard records left by earlier
    /// tests.
    pub fn new() -> Self {
        static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| Mutex::new(Logger::start()));
        let mut guard = logger
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        while guard.pop().is_some() {}

        Self { guard }
    }
}

impl std::ops::Deref for LoggerHandle {
    type Target = Logger;

    fn deref(&self) -> &Self::Target { &self.guard }
}

impl std::ops::DerefMut for LoggerHandle {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.guard }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn logger() -> LoggerHandle { LoggerHandle::new() }
