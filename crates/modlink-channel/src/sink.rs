use bytes::Bytes;
use modlink_thermal::{render, FrameDecoder};
use tracing::debug;

use crate::event::{ChannelEvent, EventSender, ThermalImage};

/// Consumer of inbound bytes, one call per read.
///
/// The read loop owns the sink and calls it from the reader thread only.
/// Send failures on `events` mean the owner stopped listening and are
/// ignored.
pub trait InboundSink: Send + 'static {
    fn consume(&mut self, bytes: &[u8], events: &EventSender);

    /// Called once after the read loop stops, whatever the reason.
    fn finish(&mut self, _events: &EventSender) {}
}

/// Forwards every read unchanged as [`ChannelEvent::Data`].
#[derive(Debug, Default)]
pub struct RawSink;

impl InboundSink for RawSink {
    fn consume(&mut self, bytes: &[u8], events: &EventSender) {
        let _ = events.send(ChannelEvent::Data(Bytes::copy_from_slice(bytes)));
    }
}

/// Decodes the sensor line protocol and emits rendered frames.
#[derive(Debug, Default)]
pub struct ThermalSink {
    decoder: FrameDecoder,
    sequence: u64,
}

impl ThermalSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InboundSink for ThermalSink {
    fn consume(&mut self, bytes: &[u8], events: &EventSender) {
        for frame in self.decoder.push(bytes) {
            let image = ThermalImage {
                sequence: self.sequence,
                min: frame.min(),
                max: frame.max(),
                bitmap: render(&frame),
            };
            self.sequence += 1;
            debug!(sequence = image.sequence, min = image.min, max = image.max, "frame ready");
            let _ = events.send(ChannelEvent::Image(image));
        }
    }

    fn finish(&mut self, events: &EventSender) {
        let stats = self.decoder.stats();
        debug!(frames = stats.frames, desyncs = stats.desyncs, bytes = stats.bytes, "decoder finished");
        let _ = events.send(ChannelEvent::Stats(stats));
    }
}
