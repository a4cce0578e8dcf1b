use std::time::Duration;

use bytes::Bytes;

/// Largest single read handed to the inbound sink.
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Sent once the handle is open, before the read loop starts waiting.
pub const ACTIVATE_COMMAND: &[u8] = b"on\0";

/// Sent on a graceful close while the accessory is still attached.
pub const DEACTIVATE_COMMAND: &[u8] = b"off\0";

/// How long `close` lets the write queue finish before aborting it.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for a [`crate::Channel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Upper bound on bytes per read. Default: 1024.
    pub read_chunk_size: usize,
    /// Command written before the workers start.
    pub activate: Option<Bytes>,
    /// Command written on close if the accessory is still attached.
    pub deactivate: Option<Bytes>,
    /// Prefix for worker thread names.
    pub thread_name: String,
    /// Grace period on close for the deactivation command and any write
    /// already in progress. A write still blocked after it is abandoned.
    pub drain_timeout: Duration,
}

impl ChannelConfig {
    /// Thermal sensor accessory: streams only between `on` and `off`.
    pub fn thermal() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK,
            activate: Some(Bytes::from_static(ACTIVATE_COMMAND)),
            deactivate: Some(Bytes::from_static(DEACTIVATE_COMMAND)),
            thread_name: "modlink".to_string(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Plain byte pipe with no activation protocol.
    pub fn raw() -> Self {
        Self {
            activate: None,
            deactivate: None,
            ..Self::thermal()
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::thermal()
    }
}
