//! Liveness adapter between a raw [`ByteSource`] and the framer.

use log::debug;

use crate::{
    error::ReadResult,
    frame::{FrameVisitor, SpdyFramer},
    source::{BlockMode, Brigade, ByteSource, ReadMode},
};

/// Pulls raw bytes into a [`SpdyFramer`] one frame at a time.
///
/// The pump never requests more than the framer needs to finish the frame it
/// is buffering, so raw bytes past a frame boundary stay in the source until
/// they are needed.
#[derive(Debug)]
pub struct FramePump {
    framer: SpdyFramer,
    read_chunk: usize,
    scratch: Brigade,
    last_status: ReadResult,
}

impl FramePump {
    /// Create a pump feeding `framer`, reading at most `read_chunk` raw bytes
    /// per upstream read.
    #[must_use]
    pub fn new(framer: SpdyFramer, read_chunk: usize) -> Self {
        Self {
            framer,
            read_chunk: read_chunk.max(1),
            scratch: Brigade::new(),
            last_status: Ok(()),
        }
    }

    /// Borrow the framer.
    #[must_use]
    pub const fn framer(&self) -> &SpdyFramer { &self.framer }

    /// Status returned by the most recent upstream read.
    #[must_use]
    pub fn last_status(&self) -> ReadResult { self.last_status.clone() }

    /// Read and decode until at least one frame reaches `visitor` or the
    /// source stops yielding bytes.
    ///
    /// Returns `true` when raw bytes were consumed or a frame was
    /// dispatched. A failed framer makes no further progress.
    pub fn pump_one_frame<S, V>(
        &mut self,
        source: &mut S,
        block: BlockMode,
        visitor: &mut V,
    ) -> bool
    where
        S: ByteSource + ?Sized,
        V: FrameVisitor + ?Sized,
    {
        if self.framer.has_error() {
            return false;
        }
        let mut progressed = false;
        loop {
            let want = self.framer.bytes_needed().min(self.read_chunk);
            self.last_status = source.read(&mut self.scratch, ReadMode::ReadBytes, block, want);
            if self.scratch.is_empty() {
                if let Err(status) = &self.last_status {
                    debug!("upstream read yielded nothing: {status}");
                }
                return progressed;
            }
            let bytes = self.scratch.take();
            progressed = true;
            let frames = self.framer.process_input(&bytes, visitor);
            if frames > 0 || self.framer.has_error() {
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        error::ReadError,
        frame::{
            FLAG_FIN,
            Frame,
            FrameProcessor,
            FramingError,
            HeaderBlock,
            SpdyFrameProcessor,
            StreamId,
            SynStream,
        },
    };

    /// Source serving pre-split chunks, then a fixed status.
    struct Chunks {
        chunks: Vec<Vec<u8>>,
        requested: Vec<usize>,
        end: ReadError,
    }

    impl ByteSource for Chunks {
        fn read(
            &mut self,
            brigade: &mut Brigade,
            _mode: ReadMode,
            _block: BlockMode,
            max_bytes: usize,
        ) -> ReadResult {
            self.requested.push(max_bytes);
            if self.chunks.is_empty() {
                return Err(self.end.clone());
            }
            let chunk = &mut self.chunks[0];
            let len = chunk.len().min(max_bytes);
            brigade.push_bytes(&chunk[..len]);
            chunk.drain(..len);
            if chunk.is_empty() {
                self.chunks.remove(0);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        frames: Vec<&'static str>,
        errors: Vec<FramingError>,
    }

    impl FrameVisitor for Recorder {
        fn on_syn_stream(&mut self, _frame: SynStream) { self.frames.push("SYN_STREAM"); }

        fn on_data(&mut self, _stream_id: StreamId, _payload: Bytes, _fin: bool) {
            self.frames.push("DATA");
        }

        fn on_headers(&mut self, _stream_id: StreamId, _headers: HeaderBlock, _fin: bool) {
            self.frames.push("HEADERS");
        }

        fn on_rst_stream(&mut self, _stream_id: StreamId, _status: u32) {
            self.frames.push("RST_STREAM");
        }

        fn on_error(&mut self, error: FramingError) { self.errors.push(error); }
    }

    fn data_frame(stream_id: u32, payload: &'static [u8]) -> Vec<u8> {
        let mut dst = BytesMut::new();
        SpdyFrameProcessor::default()
            .encode(
                &Frame::Data {
                    stream_id: StreamId(stream_id),
                    flags: FLAG_FIN,
                    payload: Bytes::from_static(payload),
                },
                &mut dst,
            )
            .expect("encode data frame");
        dst.to_vec()
    }

    #[fixture]
    fn pump() -> FramePump { FramePump::new(SpdyFramer::default(), 4096) }

    #[rstest]
    fn stops_after_one_frame(mut pump: FramePump) {
        let mut wire = data_frame(1, b"abc");
        wire.extend(data_frame(1, b"def"));
        let mut source = Chunks {
            chunks: vec![wire],
            requested: Vec::new(),
            end: ReadError::WouldBlock,
        };
        let mut visitor = Recorder::default();

        assert!(pump.pump_one_frame(&mut source, BlockMode::NonBlocking, &mut visitor));
        assert_eq!(visitor.frames, ["DATA"]);
        // header, then exactly the three payload bytes
        assert_eq!(source.requested, [8, 3]);

        assert!(pump.pump_one_frame(&mut source, BlockMode::NonBlocking, &mut visitor));
        assert_eq!(visitor.frames, ["DATA", "DATA"]);
        assert_eq!(pump.last_status(), Ok(()));
    }

    #[rstest]
    fn partial_frame_is_progress_without_dispatch(mut pump: FramePump) {
        let wire = data_frame(1, b"abcdef");
        let mut source = Chunks {
            chunks: vec![wire[..10].to_vec()],
            requested: Vec::new(),
            end: ReadError::WouldBlock,
        };
        let mut visitor = Recorder::default();

        assert!(pump.pump_one_frame(&mut source, BlockMode::NonBlocking, &mut visitor));
        assert!(visitor.frames.is_empty());
        assert_eq!(pump.last_status(), Err(ReadError::WouldBlock));
        assert_eq!(pump.framer().bytes_needed(), 4);
    }

    #[rstest]
    #[case(ReadError::WouldBlock)]
    #[case(ReadError::Eof)]
    fn empty_source_reports_no_progress(mut pump: FramePump, #[case] end: ReadError) {
        let mut source = Chunks {
            chunks: Vec::new(),
            requested: Vec::new(),
            end: end.clone(),
        };
        let mut visitor = Recorder::default();

        assert!(!pump.pump_one_frame(&mut source, BlockMode::NonBlocking, &mut visitor));
        assert_eq!(pump.last_status(), Err(end));
    }

    #[rstest]
    fn failed_framer_stops_pumping() {
        let mut pump = FramePump::new(SpdyFramer::new(2), 4096);
        let mut wire = data_frame(1, b"abc");
        wire.extend(data_frame(3, b"x"));
        let mut source = Chunks {
            chunks: vec![wire],
            requested: Vec::new(),
            end: ReadError::WouldBlock,
        };
        let mut visitor = Recorder::default();

        assert!(pump.pump_one_frame(&mut source, BlockMode::NonBlocking, &mut visitor));
        assert_eq!(visitor.errors.len(), 1);
        assert!(!pump.pump_one_frame(&mut source, BlockMode::NonBlocking, &mut visitor));
        assert!(visitor.frames.is_empty());
    }
}
