//! Frame processor implementations.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{
    ControlType,
    FRAME_HEADER_LEN,
    Frame,
    FramingError,
    MAX_PAYLOAD_LEN,
    MAX_STREAM_ID,
    SPDY_VERSION,
    StreamId,
    SynStream,
    header_block::{decode_header_block, encode_header_block},
};

const CONTROL_BIT: u32 = 0x8000_0000;

/// Trait defining how raw bytes are decoded into frames and encoded back.
pub trait FrameProcessor {
    /// Logical frame type extracted from the stream.
    type Frame;

    /// Error type returned by `decode` and `encode`.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Attempt to decode the next frame from `src`.
    ///
    /// # Errors
    /// Returns an error if the bytes in `src` cannot be parsed into a complete frame.
    fn decode(&self, src: &mut BytesMut) -> Result<Option<Self::Frame>, Self::Error>;

    /// Encode `frame` and append the bytes to `dst`.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be written to `dst`.
    fn encode(&self, frame: &Self::Frame, dst: &mut BytesMut) -> Result<(), Self::Error>;
}

/// Fixed eight-byte header shared by control and data frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RawHeader {
    Control {
        kind: ControlType,
        flags: u8,
        length: usize,
    },
    Data {
        stream_id: StreamId,
        flags: u8,
        length: usize,
    },
}

impl RawHeader {
    /// Payload length announced by a header prefix of at least eight bytes.
    pub(crate) fn payload_len(header: &[u8]) -> usize {
        (usize::from(header[5]) << 16) | (usize::from(header[6]) << 8) | usize::from(header[7])
    }

    fn parse(header: &[u8]) -> Result<Self, FramingError> {
        let mut buf = header;
        let first = buf.get_u32();
        let flags = buf.get_u8();
        let length = Self::payload_len(header);

        if first & CONTROL_BIT == 0 {
            return Ok(Self::Data {
                stream_id: StreamId(first & MAX_STREAM_ID),
                flags,
                length,
            });
        }

        let version = u16::try_from((first >> 16) & 0x7fff).unwrap_or(u16::MAX);
        let type_id = u16::try_from(first & 0xffff).unwrap_or(u16::MAX);
        if version != SPDY_VERSION {
            return Err(FramingError::UnsupportedVersion { version });
        }
        let kind =
            ControlType::from_code(type_id).ok_or(FramingError::UnknownControlType { type_id })?;
        Ok(Self::Control {
            kind,
            flags,
            length,
        })
    }

    const fn length(self) -> usize {
        match self {
            Self::Control { length, .. } | Self::Data { length, .. } => length,
        }
    }
}

/// SPDY/2 frame codec with a configurable payload ceiling.
///
/// A malformed header block is reported only after its whole frame has been
/// taken off the buffer.
#[derive(Clone, Copy, Debug)]
pub struct SpdyFrameProcessor {
    max_frame_len: usize,
}

impl SpdyFrameProcessor {
    /// Creates a processor rejecting payloads longer than `max_frame_len`.
    #[must_use]
    pub const fn new(max_frame_len: usize) -> Self { Self { max_frame_len } }

    /// Largest payload this processor accepts.
    #[must_use]
    pub const fn max_frame_len(&self) -> usize { self.max_frame_len }

    /// Validate the header at the front of `src` without consuming anything.
    ///
    /// Returns `Ok(None)` when fewer than eight bytes are buffered.
    pub(crate) fn peek_header(&self, src: &[u8]) -> Result<Option<RawHeader>, FramingError> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let header = RawHeader::parse(&src[..FRAME_HEADER_LEN])?;
        if header.length() > self.max_frame_len {
            return Err(FramingError::OversizedFrame {
                size: header.length(),
                max: self.max_frame_len,
            });
        }
        Ok(Some(header))
    }
}

impl Default for SpdyFrameProcessor {
    fn default() -> Self { Self::new(MAX_PAYLOAD_LEN) }
}

fn require(kind: ControlType, payload: &Bytes, need: usize) -> Result<(), FramingError> {
    if payload.len() < need {
        return Err(FramingError::TruncatedPayload {
            kind: kind.as_str(),
            have: payload.len(),
            need,
        });
    }
    Ok(())
}

fn take_stream_id(kind: ControlType, payload: &mut Bytes) -> Result<StreamId, FramingError> {
    let stream_id = StreamId(payload.get_u32() & MAX_STREAM_ID);
    if stream_id.0 == 0 {
        return Err(FramingError::InvalidStreamId {
            kind: kind.as_str(),
        });
    }
    Ok(stream_id)
}

fn decode_control(kind: ControlType, flags: u8, mut payload: Bytes) -> Result<Frame, FramingError> {
    let frame = match kind {
        ControlType::SynStream => {
            require(kind, &payload, 10)?;
            let stream_id = take_stream_id(kind, &mut payload)?;
            let associated_stream_id = StreamId(payload.get_u32() & MAX_STREAM_ID);
            let priority = payload.get_u8() >> 6;
            payload.advance(1);
            Frame::SynStream(SynStream {
                stream_id,
                associated_stream_id,
                priority,
                flags,
                headers: decode_header_block(stream_id, &payload)?,
            })
        }
        ControlType::SynReply => {
            require(kind, &payload, 6)?;
            let stream_id = take_stream_id(kind, &mut payload)?;
            payload.advance(2);
            Frame::SynReply {
                stream_id,
                flags,
                headers: decode_header_block(stream_id, &payload)?,
            }
        }
        ControlType::Headers => {
            require(kind, &payload, 6)?;
            let stream_id = take_stream_id(kind, &mut payload)?;
            payload.advance(2);
            Frame::Headers {
                stream_id,
                flags,
                headers: decode_header_block(stream_id, &payload)?,
            }
        }
        ControlType::RstStream => {
            require(kind, &payload, 8)?;
            let stream_id = take_stream_id(kind, &mut payload)?;
            Frame::RstStream {
                stream_id,
                status: payload.get_u32(),
            }
        }
        ControlType::Settings => {
            require(kind, &payload, 4)?;
            let count = usize::try_from(payload.get_u32()).unwrap_or(usize::MAX);
            require(kind, &payload, count.saturating_mul(8))?;
            let entries = (0..count)
                .map(|_| (payload.get_u32(), payload.get_u32()))
                .collect();
            Frame::Settings { flags, entries }
        }
        ControlType::Noop => Frame::Noop,
        ControlType::Ping => {
            require(kind, &payload, 4)?;
            Frame::Ping {
                id: payload.get_u32(),
            }
        }
        ControlType::GoAway => {
            require(kind, &payload, 4)?;
            Frame::GoAway {
                last_good_stream_id: StreamId(payload.get_u32() & MAX_STREAM_ID),
            }
        }
    };
    Ok(frame)
}

fn put_length(len: usize, dst: &mut BytesMut) -> Result<(), FramingError> {
    let oversized = FramingError::OversizedFrame {
        size: len,
        max: MAX_PAYLOAD_LEN,
    };
    if len > MAX_PAYLOAD_LEN {
        return Err(oversized);
    }
    let len = u32::try_from(len).map_err(|_| oversized)?;
    dst.put_slice(&len.to_be_bytes()[1..]);
    Ok(())
}

impl FrameProcessor for SpdyFrameProcessor {
    type Frame = Frame;
    type Error = FramingError;

    fn decode(&self, src: &mut BytesMut) -> Result<Option<Self::Frame>, Self::Error> {
        let Some(header) = self.peek_header(src)? else {
            return Ok(None);
        };
        let needed = FRAME_HEADER_LEN + header.length();
        if src.len() < needed {
            return Ok(None);
        }
        src.advance(FRAME_HEADER_LEN);
        let payload = src.split_to(header.length()).freeze();

        match header {
            RawHeader::Data {
                stream_id, flags, ..
            } => {
                if stream_id.0 == 0 {
                    return Err(FramingError::InvalidStreamId { kind: "DATA" });
                }
                Ok(Some(Frame::Data {
                    stream_id,
                    flags,
                    payload,
                }))
            }
            RawHeader::Control { kind, flags, .. } => {
                decode_control(kind, flags, payload).map(Some)
            }
        }
    }

    fn encode(&self, frame: &Self::Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::new();
        let (kind, flags) = match frame {
            Frame::Data {
                stream_id,
                flags,
                payload,
            } => {
                dst.reserve(FRAME_HEADER_LEN + payload.len());
                dst.put_u32(stream_id.0 & MAX_STREAM_ID);
                dst.put_u8(*flags);
                put_length(payload.len(), dst)?;
                dst.extend_from_slice(payload);
                return Ok(());
            }
            Frame::SynStream(syn) => {
                body.put_u32(syn.stream_id.0 & MAX_STREAM_ID);
                body.put_u32(syn.associated_stream_id.0 & MAX_STREAM_ID);
                body.put_u8((syn.priority & 0x03) << 6);
                body.put_u8(0);
                encode_header_block(syn.stream_id, &syn.headers, &mut body)?;
                (ControlType::SynStream, syn.flags)
            }
            Frame::SynReply {
                stream_id,
                flags,
                headers,
            } => {
                body.put_u32(stream_id.0 & MAX_STREAM_ID);
                body.put_u16(0);
                encode_header_block(*stream_id, headers, &mut body)?;
                (ControlType::SynReply, *flags)
            }
            Frame::Headers {
                stream_id,
                flags,
                headers,
            } => {
                body.put_u32(stream_id.0 & MAX_STREAM_ID);
                body.put_u16(0);
                encode_header_block(*stream_id, headers, &mut body)?;
                (ControlType::Headers, *flags)
            }
            Frame::RstStream { stream_id, status } => {
                body.put_u32(stream_id.0 & MAX_STREAM_ID);
                body.put_u32(*status);
                (ControlType::RstStream, 0)
            }
            Frame::Settings { flags, entries } => {
                let count =
                    u32::try_from(entries.len()).map_err(|_| FramingError::OversizedFrame {
                        size: entries.len().saturating_mul(8),
                        max: MAX_PAYLOAD_LEN,
                    })?;
                body.put_u32(count);
                for (id, value) in entries {
                    body.put_u32(*id);
                    body.put_u32(*value);
                }
                (ControlType::Settings, *flags)
            }
            Frame::Noop => (ControlType::Noop, 0),
            Frame::Ping { id } => {
                body.put_u32(*id);
                (ControlType::Ping, 0)
            }
            Frame::GoAway {
                last_good_stream_id,
            } => {
                body.put_u32(last_good_stream_id.0 & MAX_STREAM_ID);
                (ControlType::GoAway, 0)
            }
        };

        dst.reserve(FRAME_HEADER_LEN + body.len());
        dst.put_u16(0x8000 | SPDY_VERSION);
        dst.put_u16(kind as u16);
        dst.put_u8(flags);
        put_length(body.len(), dst)?;
        dst.extend_from_slice(&body);
        Ok(())
    }
}
