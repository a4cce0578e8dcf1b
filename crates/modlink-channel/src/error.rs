use crate::channel::ChannelState;
use crate::event::DisconnectCause;

/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The accessory's device handle could not be obtained at open time.
    #[error("accessory handle unavailable: {0}")]
    HandleUnavailable(#[source] modlink_transport::TransportError),

    /// The link broke underneath an open channel.
    #[error("transport broken: {0}")]
    TransportBroken(DisconnectCause),

    /// A queued write could not be delivered.
    #[error("write of {len} bytes failed: {source}")]
    WriteFailed { len: usize, source: std::io::Error },

    /// The channel is not accepting work in its current state.
    #[error("channel is not open (state: {0})")]
    NotOpen(ChannelState),

    /// A worker thread could not be started.
    #[error("failed to spawn {name} worker: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// A worker thread panicked before it could be joined.
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),

    /// Transport-level error outside of handle acquisition.
    #[error("transport error: {0}")]
    Transport(#[from] modlink_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
