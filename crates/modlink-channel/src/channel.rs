use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use modlink_transport::{cancel_signal, CancelTrigger, CancelWatch, DeviceHandle, HandleProvider};
use tracing::{debug, info, trace, warn};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::event::{ChannelEvent, DisconnectCause, EventReceiver, EventSender};
use crate::reader::read_loop;
use crate::sink::{InboundSink, RawSink, ThermalSink};
use crate::writer::{write_queue, write_request, AbortableWriter, WriteRequest};

/// Lifecycle of a [`Channel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
        })
    }
}

#[derive(Debug)]
struct Status {
    state: ChannelState,
    cause: Option<DisconnectCause>,
}

/// State shared between the owner and both workers.
#[derive(Debug)]
struct Shared {
    status: Mutex<Status>,
    events: EventSender,
}

impl Shared {
    fn new(events: EventSender) -> Self {
        Self {
            status: Mutex::new(Status {
                state: ChannelState::Opening,
                cause: None,
            }),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_open(&self) {
        self.lock().state = ChannelState::Open;
        let _ = self.events.send(ChannelEvent::Ready);
    }

    /// Record a fault seen by the read loop. Only the first cause is announced.
    fn connection_lost(&self, cause: DisconnectCause) {
        let mut status = self.lock();
        if status.cause.is_some() {
            return;
        }
        status.cause = Some(cause.clone());
        if status.state == ChannelState::Open {
            status.state = ChannelState::Closed;
        }
        drop(status);

        warn!(cause = %cause, "accessory connection lost");
        let _ = self.events.send(ChannelEvent::Disconnected(cause));
    }

    /// Enter `Closing`. Returns true when the accessory is still attached.
    fn begin_close(&self) -> bool {
        let mut status = self.lock();
        if status.state != ChannelState::Closed {
            status.state = ChannelState::Closing;
        }
        status.cause.is_none()
    }

    fn finish_close(&self) {
        let mut status = self.lock();
        status.state = ChannelState::Closed;
        if status.cause.is_some() {
            return;
        }
        status.cause = Some(DisconnectCause::LocalClose);
        drop(status);

        let _ = self
            .events
            .send(ChannelEvent::Disconnected(DisconnectCause::LocalClose));
    }

    /// Refuse new work unless the channel is open.
    fn check_open(&self) -> Result<()> {
        let status = self.lock();
        if status.state == ChannelState::Open {
            return Ok(());
        }
        Err(match &status.cause {
            Some(cause) if cause.is_fault() => ChannelError::TransportBroken(cause.clone()),
            _ => ChannelError::NotOpen(status.state),
        })
    }
}

/// Everything torn down by [`Channel::close`].
struct Workers {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    reader_cancel: CancelTrigger,
    writer_cancel: CancelTrigger,
    /// Disconnects when the writer thread exits.
    writer_done: Receiver<()>,
    handle: DeviceHandle,
    provider: Box<dyn HandleProvider + Send>,
}

/// Handles derived from the acquired device before any worker starts.
struct Endpoints {
    reader_cancel: (CancelTrigger, CancelWatch),
    writer_cancel: (CancelTrigger, CancelWatch),
    reader: DeviceHandle,
    writer: DeviceHandle,
}

impl Endpoints {
    fn new(handle: &DeviceHandle) -> Result<Self> {
        Ok(Self {
            reader_cancel: cancel_signal()?,
            writer_cancel: cancel_signal()?,
            reader: handle.try_clone()?,
            writer: handle.try_clone()?,
        })
    }
}

/// Cloneable write side of a [`Channel`], usable from any thread.
#[derive(Debug, Clone)]
pub struct ChannelWriter {
    shared: Arc<Shared>,
    queue: Sender<WriteRequest>,
}

impl ChannelWriter {
    /// Queue `bytes` for delivery after every earlier write.
    ///
    /// Returns once the bytes are queued. Delivery failures arrive later as
    /// [`ChannelEvent::WriteFailed`].
    pub fn write(&self, bytes: impl Into<Bytes>) -> Result<()> {
        self.shared.check_open()?;
        let bytes = bytes.into();
        trace!(len = bytes.len(), "write queued");
        self.queue
            .send(WriteRequest::Payload(bytes))
            .map_err(|_| ChannelError::NotOpen(self.shared.lock().state))
    }
}

/// A duplex channel to one accessory.
///
/// Opening acquires the device handle, sends the activation command and
/// starts the reader and writer threads. Closing reverses all of it; dropping
/// an open channel closes it.
///
/// ```no_run
/// use modlink_channel::{Channel, ChannelEvent};
/// use modlink_transport::DevicePath;
///
/// let mut channel = Channel::open_thermal(DevicePath::new("/dev/raw"))?;
/// for event in channel.events() {
///     if let ChannelEvent::Image(image) = event {
///         println!("frame {} range {}..={}", image.sequence, image.min, image.max);
///         break;
///     }
/// }
/// channel.close()?;
/// # Ok::<(), modlink_channel::ChannelError>(())
/// ```
pub struct Channel {
    device: String,
    writer: ChannelWriter,
    closing: Arc<AtomicBool>,
    events: EventReceiver,
    deactivate: Option<Bytes>,
    drain_timeout: Duration,
    workers: Option<Workers>,
}

impl Channel {
    /// Open a channel that feeds every read into `sink`.
    pub fn open<P, S>(mut provider: P, sink: S, config: ChannelConfig) -> Result<Self>
    where
        P: HandleProvider + Send + 'static,
        S: InboundSink,
    {
        let device = provider.describe();
        let handle = provider
            .acquire()
            .map_err(ChannelError::HandleUnavailable)?;
        debug!(device = %device, kind = handle.kind(), "accessory handle acquired");

        let endpoints = match Endpoints::new(&handle) {
            Ok(endpoints) => endpoints,
            Err(err) => {
                provider.release(handle);
                return Err(err);
            }
        };
        let Endpoints {
            reader_cancel: (reader_cancel, reader_watch),
            writer_cancel: (writer_cancel, writer_watch),
            reader: reader_handle,
            writer: mut writer_handle,
        } = endpoints;

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared::new(events_tx));

        if let Some(command) = &config.activate {
            if let Err(err) = write_request(&mut writer_handle, command) {
                warn!(device = %device, error = %err, "activation command failed");
                let _ = shared.events.send(ChannelEvent::WriteFailed {
                    len: command.len(),
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
        }

        // From here on writes wait in poll(2) so close can abandon them.
        if let Err(err) = handle.set_nonblocking(true) {
            provider.release(handle);
            return Err(err.into());
        }

        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        let (done_tx, writer_done) = crossbeam_channel::bounded::<()>(0);
        let closing = Arc::new(AtomicBool::new(false));
        let writer = {
            let closing = Arc::clone(&closing);
            let events = shared.events.clone();
            thread::Builder::new()
                .name(format!("{}-writer", config.thread_name))
                .spawn(move || {
                    let _done = done_tx;
                    let out = AbortableWriter::new(writer_handle, writer_watch);
                    write_queue(out, queue_rx, closing, events);
                })
        };
        let writer = match writer {
            Ok(writer) => writer,
            Err(source) => {
                provider.release(handle);
                return Err(ChannelError::Spawn {
                    name: "writer",
                    source,
                });
            }
        };

        shared.mark_open();

        let reader = {
            let shared = Arc::clone(&shared);
            let chunk_size = config.read_chunk_size;
            let mut sink = sink;
            thread::Builder::new()
                .name(format!("{}-reader", config.thread_name))
                .spawn(move || {
                    let cause =
                        read_loop(reader_handle, &reader_watch, &mut sink, &shared.events, chunk_size);
                    sink.finish(&shared.events);
                    if cause.is_fault() {
                        shared.connection_lost(cause);
                    }
                })
        };
        let reader = match reader {
            Ok(reader) => reader,
            Err(source) => {
                closing.store(true, Ordering::Release);
                let _ = queue_tx.send(WriteRequest::Stop);
                let _ = writer_cancel.cancel();
                let _ = writer.join();
                provider.release(handle);
                shared.finish_close();
                return Err(ChannelError::Spawn {
                    name: "reader",
                    source,
                });
            }
        };

        info!(device = %device, "channel open");
        Ok(Self {
            device,
            writer: ChannelWriter {
                shared,
                queue: queue_tx,
            },
            closing,
            events: events_rx,
            deactivate: config.deactivate,
            drain_timeout: config.drain_timeout,
            workers: Some(Workers {
                reader,
                writer,
                reader_cancel,
                writer_cancel,
                writer_done,
                handle,
                provider: Box::new(provider),
            }),
        })
    }

    /// Open a thermal sensor channel with the default protocol settings.
    pub fn open_thermal<P>(provider: P) -> Result<Self>
    where
        P: HandleProvider + Send + 'static,
    {
        Self::open(provider, ThermalSink::new(), ChannelConfig::thermal())
    }

    /// Open a plain byte pipe that reports reads as [`ChannelEvent::Data`].
    pub fn open_raw<P>(provider: P) -> Result<Self>
    where
        P: HandleProvider + Send + 'static,
    {
        Self::open(provider, RawSink, ChannelConfig::raw())
    }

    /// Queue `bytes` for the accessory. See [`ChannelWriter::write`].
    pub fn write(&self, bytes: impl Into<Bytes>) -> Result<()> {
        self.writer.write(bytes)
    }

    /// A write handle that can be moved to other threads.
    pub fn writer(&self) -> ChannelWriter {
        self.writer.clone()
    }

    /// The event queue. Events are delivered to one receiver each, so
    /// normally a single consumer listens.
    pub fn events(&self) -> EventReceiver {
        self.events.clone()
    }

    pub fn state(&self) -> ChannelState {
        self.writer.shared.lock().state
    }

    /// Why the channel disconnected, once it has.
    pub fn disconnect_cause(&self) -> Option<DisconnectCause> {
        self.writer.shared.lock().cause.clone()
    }

    /// Accessory name as reported by its provider.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Shut the channel down and release the device handle.
    ///
    /// Pending caller writes are dropped. If the accessory is still attached
    /// the deactivation command is written first. A write that is still
    /// blocked after [`ChannelConfig::drain_timeout`] is abandoned, so `close`
    /// returns even when the accessory stopped reading. Calling `close` again
    /// is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(workers) = self.workers.take() else {
            return Ok(());
        };
        let Workers {
            reader,
            writer,
            reader_cancel,
            writer_cancel,
            writer_done,
            handle,
            mut provider,
        } = workers;
        let shared = &self.writer.shared;

        let attached = shared.begin_close();
        self.closing.store(true, Ordering::Release);
        if attached {
            if let Some(command) = self.deactivate.clone() {
                let _ = self.writer.queue.send(WriteRequest::Deactivate(command));
            }
        }
        let _ = self.writer.queue.send(WriteRequest::Stop);
        if let Err(RecvTimeoutError::Timeout) = writer_done.recv_timeout(self.drain_timeout) {
            debug!(device = %self.device, "write queue still blocked; aborting");
        }
        let aborted = writer_cancel.cancel();
        let writer = writer.join();

        let cancelled = reader_cancel.cancel();
        let reader = reader.join();

        provider.release(handle);
        shared.finish_close();
        info!(device = %self.device, "channel closed");

        if writer.is_err() {
            return Err(ChannelError::WorkerPanicked("writer"));
        }
        if reader.is_err() {
            return Err(ChannelError::WorkerPanicked("reader"));
        }
        aborted.and(cancelled).map_err(ChannelError::from)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("device", &self.device)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(device = %self.device, error = %err, "close on drop failed");
        }
    }
}
