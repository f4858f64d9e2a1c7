//! [`ByteSource`] adapter over any [`std::io::Read`].

use std::io::{self, Read};

use bytes::{Buf, BytesMut};

use super::{BlockMode, Brigade, ByteSource, ReadMode, SpeculativeRead};
use crate::error::{ReadError, ReadResult};

const EXHAUSTIVE_CHUNK: usize = 8 * 1024;

/// Raw byte source reading from an [`io::Read`].
///
/// Bytes pulled by speculative reads and probes are held in a look-ahead
/// buffer and served again by the next consuming read. Blocking behaviour is
/// whatever the wrapped reader does; a reader in non-blocking mode reports
/// [`io::ErrorKind::WouldBlock`], which maps to [`ReadError::WouldBlock`].
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
    lookahead: BytesMut,
    eof: bool,
}

impl<R: Read> IoSource<R> {
    /// Wrap `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            lookahead: BytesMut::new(),
            eof: false,
        }
    }

    /// Borrow the wrapped reader.
    pub fn get_ref(&self) -> &R { &self.inner }

    /// Consume the adapter, discarding any look-ahead bytes.
    pub fn into_inner(self) -> R { self.inner }

    /// Bytes pulled from the reader but not yet consumed.
    pub fn pending(&self) -> usize { self.lookahead.len() }

    /// Read once from the wrapped reader into the look-ahead buffer.
    ///
    /// Returns the number of bytes added; zero marks end of input.
    fn fill(&mut self, want: usize) -> Result<usize, ReadError> {
        if self.eof || want == 0 {
            return Ok(0);
        }
        let start = self.lookahead.len();
        self.lookahead.resize(start + want, 0);
        loop {
            match self.inner.read(&mut self.lookahead[start..]) {
                Ok(n) => {
                    self.lookahead.truncate(start + n);
                    if n == 0 {
                        self.eof = true;
                    }
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.lookahead.truncate(start);
                    return Err(e.into());
                }
            }
        }
    }

    /// Ensure at least one byte is buffered.
    fn fill_some(&mut self, want: usize) -> ReadResult {
        if self.lookahead.is_empty() && self.fill(want.max(1))? == 0 {
            return Err(ReadError::Eof);
        }
        Ok(())
    }

    fn deliver(&mut self, brigade: &mut Brigade, len: usize) {
        brigade.push_bytes(&self.lookahead[..len]);
        self.lookahead.advance(len);
    }

    fn read_line(&mut self, brigade: &mut Brigade, max_bytes: usize) -> ReadResult {
        loop {
            let window = self.lookahead.len().min(max_bytes);
            if let Some(pos) = self.lookahead[..window].iter().position(|&b| b == b'\n') {
                self.deliver(brigade, pos + 1);
                return Ok(());
            }
            if window == max_bytes {
                self.deliver(brigade, window);
                return Ok(());
            }
            match self.fill(max_bytes - window) {
                Ok(0) => break,
                Ok(_) => {}
                Err(ReadError::WouldBlock) if !self.lookahead.is_empty() => break,
                Err(e) => return Err(e),
            }
        }
        if self.lookahead.is_empty() {
            return Err(ReadError::Eof);
        }
        let len = self.lookahead.len();
        self.deliver(brigade, len);
        Ok(())
    }

    fn read_exhaustive(&mut self, brigade: &mut Brigade) -> ReadResult {
        loop {
            match self.fill(EXHAUSTIVE_CHUNK) {
                Ok(0) => break,
                Ok(_) => {}
                Err(ReadError::WouldBlock) if !self.lookahead.is_empty() => break,
                Err(e) => return Err(e),
            }
        }
        if self.lookahead.is_empty() {
            return Err(ReadError::Eof);
        }
        let len = self.lookahead.len();
        self.deliver(brigade, len);
        Ok(())
    }
}

impl<R: Read> ByteSource for IoSource<R> {
    fn read(
        &mut self,
        brigade: &mut Brigade,
        mode: ReadMode,
        _block: BlockMode,
        max_bytes: usize,
    ) -> ReadResult {
        match mode {
            ReadMode::Init => Ok(()),
            ReadMode::ReadBytes => {
                self.fill_some(max_bytes)?;
                let len = self.lookahead.len().min(max_bytes);
                self.deliver(brigade, len);
                Ok(())
            }
            ReadMode::Speculative => {
                self.fill_some(max_bytes)?;
                let len = self.lookahead.len().min(max_bytes);
                brigade.push_bytes(&self.lookahead[..len]);
                Ok(())
            }
            ReadMode::GetLine => self.read_line(brigade, max_bytes),
            ReadMode::Exhaustive => self.read_exhaustive(brigade),
            ReadMode::EatCrlf => loop {
                let skip = self
                    .lookahead
                    .iter()
                    .take_while(|&&b| b == b'\r' || b == b'\n')
                    .count();
                self.lookahead.advance(skip);
                if !self.lookahead.is_empty() || self.fill(EXHAUSTIVE_CHUNK)? == 0 {
                    return Ok(());
                }
            },
        }
    }
}

impl<R: Read> SpeculativeRead for IoSource<R> {
    fn probe(&mut self) -> ReadResult { self.fill_some(1) }
}
