use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use crate::decoder::{DecoderStats, FrameDecoder};
use crate::error::{Result, ThermalError};
use crate::frame::ThermalFrame;

/// Read size used when replaying a capture; matches the live read loop.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Decodes frames from any `Read` source, such as a recorded capture file.
///
/// Each `read` call's bytes are handed to the decoder as one invocation, the
/// same way the live read loop does, so desync behavior matches the device.
pub struct CaptureReader<T> {
    inner: T,
    decoder: FrameDecoder,
    ready: VecDeque<ThermalFrame>,
    /// Reused for every read; its length is the chunk size.
    chunk: Vec<u8>,
}

impl<T: Read> CaptureReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_SIZE)
    }

    /// Create a reader that feeds the decoder `chunk_size` bytes at a time.
    pub fn with_chunk_size(inner: T, chunk_size: usize) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(),
            ready: VecDeque::new(),
            chunk: vec![0u8; chunk_size.max(1)],
        }
    }

    /// Next complete frame, or `None` at end of input.
    ///
    /// Trailing bytes that do not complete a frame are dropped at EOF.
    pub fn next_frame(&mut self) -> Result<Option<ThermalFrame>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }

            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ThermalError::Io(err)),
            };
            if read == 0 {
                return Ok(None);
            }

            self.ready.extend(self.decoder.push(&self.chunk[..read]));
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::wire::{encode_frame, FRAME_SAMPLES, LINE_SIZE};

    fn capture(frames: usize) -> Vec<u8> {
        let mut wire = BytesMut::new();
        for n in 0..frames {
            encode_frame(&vec![n as u16; FRAME_SAMPLES], &mut wire).unwrap();
        }
        wire.to_vec()
    }

    #[test]
    fn reads_every_frame_in_capture() {
        let mut reader = CaptureReader::new(Cursor::new(capture(3)));

        for n in 0..3u16 {
            let frame = reader.next_frame().unwrap().unwrap();
            assert_eq!(frame.min(), n);
        }
        assert!(reader.next_frame().unwrap().is_none());
        assert_eq!(reader.stats().frames, 3);
    }

    #[test]
    fn line_sized_chunks() {
        let mut reader = CaptureReader::with_chunk_size(Cursor::new(capture(2)), LINE_SIZE);
        assert!(reader.next_frame().unwrap().is_some());
        assert!(reader.next_frame().unwrap().is_some());
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn every_read_offers_a_full_chunk() {
        let source = Recording {
            inner: Cursor::new(capture(2)),
            offered: Vec::new(),
        };
        let mut reader = CaptureReader::with_chunk_size(source, 500);
        while reader.next_frame().unwrap().is_some() {}

        let offered = reader.into_inner().offered;
        assert!(offered.len() > 2);
        assert!(offered.iter().all(|&len| len == 500));
    }

    #[test]
    fn truncated_capture_yields_nothing() {
        let mut bytes = capture(1);
        bytes.truncate(bytes.len() - 1);
        let mut reader = CaptureReader::new(Cursor::new(bytes));
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(capture(1)),
        };
        let mut frames = CaptureReader::new(reader);
        assert!(frames.next_frame().unwrap().is_some());
    }

    #[test]
    fn io_error_propagates() {
        let mut frames = CaptureReader::new(Failing);
        assert!(matches!(frames.next_frame(), Err(ThermalError::Io(_))));
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct Recording {
        inner: Cursor<Vec<u8>>,
        offered: Vec<usize>,
    }

    impl Read for Recording {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.offered.push(buf.len());
            self.inner.read(buf)
        }
    }

    struct Failing;

    impl Read for Failing {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }
    }
}
