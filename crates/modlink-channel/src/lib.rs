//! Duplex channel to one attached accessory.
//!
//! A [`Channel`] owns the accessory's device handle and runs two workers
//! against it: a read loop that blocks on data, hangup and cancellation in a
//! single wait, and a write queue that delivers caller writes in FIFO order.
//! Everything the channel observes comes back to the caller as
//! [`ChannelEvent`]s on a message queue.

pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod sink;

mod reader;
mod writer;

pub use channel::{Channel, ChannelState, ChannelWriter};
pub use config::{
    ChannelConfig, ACTIVATE_COMMAND, DEACTIVATE_COMMAND, DEFAULT_DRAIN_TIMEOUT, DEFAULT_READ_CHUNK,
};
pub use error::{ChannelError, Result};
pub use event::{ChannelEvent, DisconnectCause, EventReceiver, EventSender, ThermalImage};
pub use sink::{InboundSink, RawSink, ThermalSink};
