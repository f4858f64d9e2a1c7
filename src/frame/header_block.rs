//! SPDY/2 name/value header blocks.
//!
//! A block is a 16-bit pair count followed by 16-bit length-prefixed names
//! and values. Several values for one name travel as a single value joined
//! with NUL bytes.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, BytesMut};

use super::{FramingError, StreamId};

/// Header table keyed by lowercase header name.
pub type HeaderBlock = BTreeMap<String, String>;

/// Separator joining multiple values of one header.
pub const VALUE_SEPARATOR: char = '\0';

/// Add a header to `headers`, joining with any existing value.
///
/// The key is lowercased as SPDY requires. When the key is already present
/// the new value is appended after a NUL separator instead of replacing the
/// old one.
///
/// # Examples
///
/// ```
/// use spdy_demux::frame::{HeaderBlock, merge_in_header};
///
/// let mut headers = HeaderBlock::new();
/// merge_in_header(&mut headers, "Accept", "text/html");
/// merge_in_header(&mut headers, "accept", "text/plain");
/// assert_eq!(headers["accept"], "text/html\0text/plain");
/// ```
pub fn merge_in_header(headers: &mut HeaderBlock, key: &str, value: &str) {
    let key = key.to_ascii_lowercase();
    match headers.get_mut(&key) {
        Some(existing) => {
            existing.push(VALUE_SEPARATOR);
            existing.push_str(value);
        }
        None => {
            headers.insert(key, value.to_owned());
        }
    }
}

fn take_field(src: &mut &[u8], what: &'static str) -> Result<String, &'static str> {
    if src.remaining() < 2 {
        return Err(what);
    }
    let len = usize::from(src.get_u16());
    if src.remaining() < len {
        return Err(what);
    }
    let (field, rest) = src.split_at(len);
    *src = rest;
    String::from_utf8(field.to_vec()).map_err(|_| "header field is not UTF-8")
}

/// Parse a header block belonging to `stream_id`.
pub(crate) fn decode_header_block(
    stream_id: StreamId,
    mut src: &[u8],
) -> Result<HeaderBlock, FramingError> {
    let malformed = |reason| FramingError::MalformedHeaderBlock { stream_id, reason };

    if src.remaining() < 2 {
        return Err(malformed("missing pair count"));
    }
    let count = src.get_u16();
    let mut headers = HeaderBlock::new();
    for _ in 0..count {
        let name = take_field(&mut src, "truncated header name").map_err(malformed)?;
        let value = take_field(&mut src, "truncated header value").map_err(malformed)?;
        if name.is_empty() {
            return Err(malformed("empty header name"));
        }
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(malformed("uppercase header name"));
        }
        if headers.contains_key(&name) {
            return Err(malformed("duplicate header name"));
        }
        headers.insert(name, value);
    }
    if src.has_remaining() {
        return Err(malformed("trailing bytes after header block"));
    }
    Ok(headers)
}

fn put_field(field: &str, dst: &mut BytesMut) -> Result<(), &'static str> {
    let len = u16::try_from(field.len()).map_err(|_| "header field too long")?;
    dst.put_u16(len);
    dst.put_slice(field.as_bytes());
    Ok(())
}

/// Serialise `headers` for `stream_id` into `dst`.
pub(crate) fn encode_header_block(
    stream_id: StreamId,
    headers: &HeaderBlock,
    dst: &mut BytesMut,
) -> Result<(), FramingError> {
    let malformed = |reason| FramingError::MalformedHeaderBlock { stream_id, reason };

    let count = u16::try_from(headers.len()).map_err(|_| malformed("too many headers"))?;
    dst.put_u16(count);
    for (name, value) in headers {
        put_field(name, dst).map_err(malformed)?;
        put_field(value, dst).map_err(malformed)?;
    }
    Ok(())
}
