//! Unit tests for the raw byte source adapter.

use std::io::{self, Read};

use rstest::rstest;

use super::*;
use crate::error::ReadError;

/// Reader returning one scripted result per call.
struct Scripted(Vec<io::Result<&'static [u8]>>);

impl Read for Scripted {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.0.is_empty() {
            return Ok(0);
        }
        match self.0.remove(0) {
            Ok(chunk) => {
                let len = chunk.len().min(buf.len());
                buf[..len].copy_from_slice(&chunk[..len]);
                Ok(len)
            }
            Err(e) => Err(e),
        }
    }
}

fn read(source: &mut impl ByteSource, mode: ReadMode, max: usize) -> (ReadResult, Vec<u8>) {
    let mut brigade = Brigade::new();
    let result = source.read(&mut brigade, mode, BlockMode::Blocking, max);
    (result, brigade.as_bytes().to_vec())
}

#[rstest]
fn read_bytes_respects_limit() {
    let mut source = IoSource::new(&b"hello world"[..]);
    assert_eq!(read(&mut source, ReadMode::ReadBytes, 5), (Ok(()), b"hello".to_vec()));
    assert_eq!(read(&mut source, ReadMode::ReadBytes, 64), (Ok(()), b" world".to_vec()));
    assert_eq!(read(&mut source, ReadMode::ReadBytes, 64), (Err(ReadError::Eof), Vec::new()));
}

#[rstest]
fn speculative_reads_do_not_consume() {
    let mut source = IoSource::new(&b"abcdef"[..]);
    assert_eq!(read(&mut source, ReadMode::Speculative, 3), (Ok(()), b"abc".to_vec()));
    assert_eq!(source.pending(), 3);
    assert_eq!(read(&mut source, ReadMode::ReadBytes, 6), (Ok(()), b"abc".to_vec()));
    assert_eq!(read(&mut source, ReadMode::ReadBytes, 6), (Ok(()), b"def".to_vec()));
}

#[rstest]
fn probe_keeps_bytes_for_the_next_read() {
    let mut source = IoSource::new(&b"xy"[..]);
    assert_eq!(source.probe(), Ok(()));
    assert_eq!(source.pending(), 1);
    assert_eq!(read(&mut source, ReadMode::ReadBytes, 8), (Ok(()), b"x".to_vec()));
    assert_eq!(read(&mut source, ReadMode::ReadBytes, 8), (Ok(()), b"y".to_vec()));
    assert_eq!(source.probe(), Err(ReadError::Eof));
}

#[rstest]
fn get_line_spans_reads() {
    let mut source = IoSource::new(Scripted(vec![
        Ok(&b"GET / HT"[..]),
        Ok(&b"TP/1.1\r\nHost"[..]),
    ]));
    assert_eq!(
        read(&mut source, ReadMode::GetLine, 64),
        (Ok(()), b"GET / HTTP/1.1\r\n".to_vec())
    );
    assert_eq!(read(&mut source, ReadMode::GetLine, 64), (Ok(()), b"Host".to_vec()));
    assert_eq!(read(&mut source, ReadMode::GetLine, 64), (Err(ReadError::Eof), Vec::new()));
}

#[rstest]
fn get_line_stops_at_limit() {
    let mut source = IoSource::new(&b"abcdef\n"[..]);
    assert_eq!(read(&mut source, ReadMode::GetLine, 4), (Ok(()), b"abcd".to_vec()));
    assert_eq!(read(&mut source, ReadMode::GetLine, 4), (Ok(()), b"ef\n".to_vec()));
}

#[rstest]
fn eat_crlf_and_init_return_nothing() {
    let mut source = IoSource::new(&b"\r\n\r\nGET"[..]);
    assert_eq!(read(&mut source, ReadMode::Init, 8), (Ok(()), Vec::new()));
    assert_eq!(read(&mut source, ReadMode::EatCrlf, 8), (Ok(()), Vec::new()));
    assert_eq!(read(&mut source, ReadMode::Exhaustive, 1), (Ok(()), b"GET".to_vec()));
}

#[rstest]
fn interrupted_reads_are_retried() {
    let mut source = IoSource::new(Scripted(vec![
        Err(io::Error::from(io::ErrorKind::Interrupted)),
        Ok(&b"ok"[..]),
    ]));
    assert_eq!(read(&mut source, ReadMode::ReadBytes, 8), (Ok(()), b"ok".to_vec()));
}

#[rstest]
#[case(io::ErrorKind::WouldBlock, ReadError::WouldBlock)]
#[case(io::ErrorKind::ConnectionAborted, ReadError::ConnectionAborted)]
#[case(
    io::ErrorKind::ConnectionReset,
    ReadError::Transport { kind: io::ErrorKind::ConnectionReset, message: "boom".into() }
)]
fn transport_errors_map_to_read_errors(#[case] kind: io::ErrorKind, #[case] expected: ReadError) {
    let mut source = IoSource::new(Scripted(vec![Err(io::Error::new(kind, "boom"))]));
    assert_eq!(read(&mut source, ReadMode::ReadBytes, 8), (Err(expected), Vec::new()));
}

#[rstest]
fn read_errors_convert_back_to_io_errors() {
    assert_eq!(io::Error::from(ReadError::WouldBlock).kind(), io::ErrorKind::WouldBlock);
    assert_eq!(io::Error::from(ReadError::General).kind(), io::ErrorKind::InvalidData);
    assert!(ReadError::WouldBlock.is_would_block());
    assert!(!ReadError::Eof.is_would_block());
}

#[rstest]
fn brigade_take_clears_marker() {
    let mut brigade = Brigade::new();
    brigade.push_bytes(b"abc");
    brigade.push_eos();
    assert!(brigade.is_eos());
    assert_eq!(brigade.len(), 3);
    assert_eq!(&brigade.take()[..], b"abc");
    assert!(brigade.is_empty());
    assert!(!brigade.is_eos());
}

#[rstest]
fn mutable_references_are_sources() {
    let mut inner = IoSource::new(&b"z"[..]);
    let mut by_ref = &mut inner;
    assert_eq!(by_ref.probe(), Ok(()));
    assert_eq!(read(&mut by_ref, ReadMode::ReadBytes, 1), (Ok(()), b"z".to_vec()));
}
