use bytes::Buf;
use tracing::{trace, warn};

use crate::frame::ThermalFrame;
use crate::wire::{FRAME_SAMPLES, LINE_ID_MASK, SAMPLE_MASK, WIDTH};

/// What the next word on the wire is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    LineId,
    Checksum { line_id: u16 },
    Sample,
}

/// A line id mismatch that caused the rest of a read to be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Desync {
    /// Masked id found on the wire.
    pub line_id: u16,
    /// Id the decoder was waiting for.
    pub expected: u16,
    /// Bytes of the read left unprocessed.
    pub discarded: usize,
}

/// Output of one [`DecoderState::feed`] call.
#[derive(Debug, Default)]
pub struct Decoded {
    pub frames: Vec<ThermalFrame>,
    pub desync: Option<Desync>,
}

/// Decoder state threaded through successive reads.
///
/// `feed` consumes the state and returns its successor, so the decoder is a
/// plain function of `(state, bytes)`. Resets rebuild the whole struct.
#[derive(Debug, Clone)]
pub struct DecoderState {
    raw: Box<[u16]>,
    count: usize,
    next_line_id: u16,
    min: u16,
    max: u16,
    expect: Expect,
    pending: Option<u8>,
}

impl Default for DecoderState {
    fn default() -> Self {
        Self::empty(vec![0u16; FRAME_SAMPLES].into_boxed_slice())
    }
}

impl DecoderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty-frame state reusing an existing sample buffer.
    fn empty(raw: Box<[u16]>) -> Self {
        Self {
            raw,
            count: 0,
            next_line_id: 0,
            min: u16::MAX,
            max: 0,
            expect: Expect::LineId,
            pending: None,
        }
    }

    /// Samples stored for the in-progress frame.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Line id the decoder will accept next.
    pub fn next_line_id(&self) -> u16 {
        self.next_line_id
    }

    /// Range of the in-progress frame, once it has any samples.
    pub fn range(&self) -> Option<(u16, u16)> {
        (self.count > 0).then_some((self.min, self.max))
    }

    /// True when the decoder sits at a frame boundary with nothing buffered.
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.expect == Expect::LineId && self.pending.is_none()
    }

    /// Decode one read's worth of bytes.
    ///
    /// Words split across reads are carried over. On a line id mismatch the
    /// rest of `bytes` is dropped and the state restarts at line 0, so the
    /// next read is expected to begin at a true line boundary.
    pub fn feed(self, bytes: &[u8]) -> (Self, Decoded) {
        let mut state = self;
        let mut decoded = Decoded::default();
        let mut buf = bytes;

        while let Some(word) = state.next_word(&mut buf) {
            match state.expect {
                Expect::LineId => {
                    state.expect = Expect::Checksum {
                        line_id: word & LINE_ID_MASK,
                    };
                }
                Expect::Checksum { line_id } => {
                    if line_id != state.next_line_id {
                        decoded.desync = Some(Desync {
                            line_id,
                            expected: state.next_line_id,
                            discarded: buf.len(),
                        });
                        return (Self::empty(state.raw), decoded);
                    }
                    state.next_line_id += 1;
                    state.expect = Expect::Sample;
                }
                Expect::Sample => {
                    let value = word & SAMPLE_MASK;
                    state.raw[state.count] = value;
                    state.count += 1;
                    state.min = state.min.min(value);
                    state.max = state.max.max(value);

                    if state.count == FRAME_SAMPLES {
                        let DecoderState { raw, min, max, .. } = state;
                        decoded.frames.push(ThermalFrame::from_decoded(raw, min, max));
                        state = Self::default();
                    } else if state.count % WIDTH == 0 {
                        state.expect = Expect::LineId;
                    }
                }
            }
        }

        (state, decoded)
    }

    fn next_word(&mut self, buf: &mut &[u8]) -> Option<u16> {
        if let Some(high) = self.pending {
            if !buf.has_remaining() {
                return None;
            }
            self.pending = None;
            return Some(u16::from_be_bytes([high, buf.get_u8()]));
        }
        match buf.remaining() {
            0 => None,
            1 => {
                self.pending = Some(buf.get_u8());
                None
            }
            _ => Some(buf.get_u16()),
        }
    }
}

/// Running counters for a [`FrameDecoder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Complete frames emitted.
    pub frames: u64,
    /// Line id mismatches recovered from.
    pub desyncs: u64,
    /// Bytes fed in.
    pub bytes: u64,
}

/// Stateful wrapper around [`DecoderState`] for use inside a read loop.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    state: Option<DecoderState>,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read's bytes and collect every frame they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<ThermalFrame> {
        let state = self.state.take().unwrap_or_default();
        let (state, decoded) = state.feed(bytes);
        self.state = Some(state);

        self.stats.bytes += bytes.len() as u64;
        self.stats.frames += decoded.frames.len() as u64;
        if let Some(desync) = decoded.desync {
            self.stats.desyncs += 1;
            warn!(
                line_id = desync.line_id,
                expected = desync.expected,
                discarded = desync.discarded,
                "unexpected line id; waiting for resync"
            );
        }
        for frame in &decoded.frames {
            trace!(min = frame.min(), max = frame.max(), "frame decoded");
        }
        decoded.frames
    }

    /// Current decoder state.
    pub fn state(&self) -> Option<&DecoderState> {
        self.state.as_ref()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Drop any partially decoded frame.
    pub fn reset(&mut self) {
        self.state = None;
    }
}
