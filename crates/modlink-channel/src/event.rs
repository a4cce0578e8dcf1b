use std::fmt;
use std::io;

use bytes::Bytes;
use modlink_thermal::{Bitmap, DecoderStats};

/// Producer side of the event queue.
pub type EventSender = crossbeam_channel::Sender<ChannelEvent>;

/// Consumer side of the event queue.
pub type EventReceiver = crossbeam_channel::Receiver<ChannelEvent>;

/// Everything a channel reports back to its owner.
#[derive(Debug)]
pub enum ChannelEvent {
    /// The channel is open and the activation command has been sent.
    Ready,
    /// Bytes from one read, forwarded by a [`crate::RawSink`].
    Data(Bytes),
    /// A complete rendered frame from a [`crate::ThermalSink`].
    Image(ThermalImage),
    /// A queued write could not be delivered. Later writes are still attempted.
    WriteFailed {
        len: usize,
        kind: io::ErrorKind,
        message: String,
    },
    /// Final decoder counters from a [`crate::ThermalSink`], sent once the
    /// read loop has stopped and before [`ChannelEvent::Disconnected`].
    Stats(DecoderStats),
    /// The channel stopped reading. Sent exactly once per channel.
    Disconnected(DisconnectCause),
}

/// A rendered thermal frame plus the range it was normalized against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalImage {
    /// Counts from 0 for each channel.
    pub sequence: u64,
    pub min: u16,
    pub max: u16,
    pub bitmap: Bitmap,
}

/// Why a channel stopped reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The owner closed the channel.
    LocalClose,
    /// The accessory went away (hangup or end of stream).
    PeerHangup,
    /// A read on the device handle failed.
    ReadFailed { kind: io::ErrorKind, message: String },
    /// Waiting on the device handle failed.
    PollFailed { message: String },
}

impl DisconnectCause {
    /// True unless the owner asked for the disconnect.
    pub fn is_fault(&self) -> bool {
        !matches!(self, Self::LocalClose)
    }
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalClose => f.write_str("closed locally"),
            Self::PeerHangup => f.write_str("accessory hung up"),
            Self::ReadFailed { message, .. } => write!(f, "read failed: {message}"),
            Self::PollFailed { message } => write!(f, "wait failed: {message}"),
        }
    }
}
