//! Accessory device handles and the primitives the duplex channel is built on.
//!
//! - [`DeviceHandle`]: one readable/writable accessory handle (device node or socket)
//! - [`HandleProvider`]: the acquire/release boundary owned by the accessory manager
//! - [`cancel_signal`]: a one-shot wake for a blocked readiness wait
//! - [`wait_for_event`]: a single multiplexed wait on data, hangup and cancellation
//! - [`wait_for_writable`]: the same wait for room in a non-blocking write
//!
//! This is the lowest layer of modlink. Nothing here knows about any accessory's
//! wire protocol.

pub mod error;
pub mod handle;
pub mod provider;
#[cfg(unix)]
pub mod signal;
#[cfg(unix)]
pub mod wait;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use handle::DeviceHandle;
pub use provider::{DevicePath, HandleProvider};

#[cfg(unix)]
pub use provider::SocketPath;
#[cfg(unix)]
pub use signal::{cancel_signal, CancelTrigger, CancelWatch};
#[cfg(unix)]
pub use uds::EmulatorSocket;
#[cfg(unix)]
pub use wait::{wait_for_event, wait_for_writable, WaitOutcome, WriteOutcome};
