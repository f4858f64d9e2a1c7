//! Typed SPDY/2 frames.

use std::fmt;

use bytes::Bytes;

use super::HeaderBlock;

/// Protocol version carried in every control frame header.
pub const SPDY_VERSION: u16 = 2;
/// Length of the fixed header preceding every frame.
pub const FRAME_HEADER_LEN: usize = 8;
/// Largest payload length representable by the 24-bit length field.
pub const MAX_PAYLOAD_LEN: usize = 0x00ff_ffff;
/// Stream identifiers are 31 bits wide.
pub const MAX_STREAM_ID: u32 = 0x7fff_ffff;
/// Flag marking the last frame the sender will emit on a stream.
pub const FLAG_FIN: u8 = 0x01;
/// Flag marking a stream the sender will not read from.
pub const FLAG_UNIDIRECTIONAL: u8 = 0x02;

/// Identifies a logical stream multiplexed over one connection.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StreamId(pub u32);

impl From<u32> for StreamId {
    fn from(value: u32) -> Self { Self(value & MAX_STREAM_ID) }
}

impl From<StreamId> for u32 {
    fn from(value: StreamId) -> Self { value.0 }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Control frame type codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ControlType {
    SynStream = 1,
    SynReply = 2,
    RstStream = 3,
    Settings = 4,
    Noop = 5,
    Ping = 6,
    GoAway = 7,
    Headers = 8,
}

impl ControlType {
    /// Map a wire type code to a known control type.
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => Self::SynStream,
            2 => Self::SynReply,
            3 => Self::RstStream,
            4 => Self::Settings,
            5 => Self::Noop,
            6 => Self::Ping,
            7 => Self::GoAway,
            8 => Self::Headers,
            _ => return None,
        })
    }

    /// Wire name used in logs and metrics labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SynStream => "SYN_STREAM",
            Self::SynReply => "SYN_REPLY",
            Self::RstStream => "RST_STREAM",
            Self::Settings => "SETTINGS",
            Self::Noop => "NOOP",
            Self::Ping => "PING",
            Self::GoAway => "GOAWAY",
            Self::Headers => "HEADERS",
        }
    }
}

/// Stream-opening frame carrying the request header block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynStream {
    pub stream_id: StreamId,
    pub associated_stream_id: StreamId,
    /// Two-bit priority, 0 being the highest.
    pub priority: u8,
    pub flags: u8,
    pub headers: HeaderBlock,
}

impl SynStream {
    /// Whether the frame also ends the stream.
    #[must_use]
    pub const fn is_fin(&self) -> bool { self.flags & FLAG_FIN != 0 }
}

/// A fully parsed SPDY/2 frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    SynStream(SynStream),
    SynReply {
        stream_id: StreamId,
        flags: u8,
        headers: HeaderBlock,
    },
    RstStream {
        stream_id: StreamId,
        status: u32,
    },
    /// Raw `(id|flags, value)` pairs; settings are not interpreted here.
    Settings {
        flags: u8,
        entries: Vec<(u32, u32)>,
    },
    Noop,
    Ping {
        id: u32,
    },
    GoAway {
        last_good_stream_id: StreamId,
    },
    Headers {
        stream_id: StreamId,
        flags: u8,
        headers: HeaderBlock,
    },
    Data {
        stream_id: StreamId,
        flags: u8,
        payload: Bytes,
    },
}

impl Frame {
    /// Stream the frame belongs to, or `None` for connection-level frames.
    #[must_use]
    pub fn stream_id(&self) -> Option<StreamId> {
        match self {
            Self::SynStream(syn) => Some(syn.stream_id),
            Self::SynReply { stream_id, .. }
            | Self::RstStream { stream_id, .. }
            | Self::Headers { stream_id, .. }
            | Self::Data { stream_id, .. } => Some(*stream_id),
            Self::Settings { .. } | Self::Noop | Self::Ping { .. } | Self::GoAway { .. } => None,
        }
    }

    /// Short name of the frame kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SynStream(_) => ControlType::SynStream.as_str(),
            Self::SynReply { .. } => ControlType::SynReply.as_str(),
            Self::RstStream { .. } => ControlType::RstStream.as_str(),
            Self::Settings { .. } => ControlType::Settings.as_str(),
            Self::Noop => ControlType::Noop.as_str(),
            Self::Ping { .. } => ControlType::Ping.as_str(),
            Self::GoAway { .. } => ControlType::GoAway.as_str(),
            Self::Headers { .. } => ControlType::Headers.as_str(),
            Self::Data { .. } => "DATA",
        }
    }

    /// Whether the frame carries the FIN flag.
    #[must_use]
    pub fn is_fin(&self) -> bool {
        match self {
            Self::SynStream(syn) => syn.is_fin(),
            Self::SynReply { flags, .. }
            | Self::Headers { flags, .. }
            | Self::Data { flags, .. } => flags & FLAG_FIN != 0,
            _ => false,
        }
    }
}
