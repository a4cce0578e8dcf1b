use std::io::{self, ErrorKind, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::Receiver;
use modlink_transport::{wait_for_writable, CancelWatch, DeviceHandle, WriteOutcome};
use tracing::{debug, trace, warn};

use crate::error::ChannelError;
use crate::event::{ChannelEvent, EventSender};

/// Work item for the write queue.
#[derive(Debug)]
pub(crate) enum WriteRequest {
    /// Caller data. Skipped once the channel starts closing.
    Payload(Bytes),
    /// Deactivation command; always written.
    Deactivate(Bytes),
    /// Exit after everything queued ahead of it.
    Stop,
}

/// Drain `queue` in FIFO order, one complete write per request.
///
/// A failed write is reported as [`ChannelEvent::WriteFailed`] and the
/// worker moves on to the next request. Returns the output once `Stop`
/// arrives or every sender is gone.
pub(crate) fn write_queue<W: Write>(
    mut out: W,
    queue: Receiver<WriteRequest>,
    closing: Arc<AtomicBool>,
    events: EventSender,
) -> W {
    while let Ok(request) = queue.recv() {
        let bytes = match request {
            WriteRequest::Payload(bytes) if closing.load(Ordering::Acquire) => {
                trace!(len = bytes.len(), "dropping queued write on close");
                continue;
            }
            WriteRequest::Payload(bytes) | WriteRequest::Deactivate(bytes) => bytes,
            WriteRequest::Stop => break,
        };
        if let Err(err) = write_request(&mut out, &bytes) {
            if err.kind() == ErrorKind::ConnectionAborted && closing.load(Ordering::Acquire) {
                debug!(len = bytes.len(), "in-flight write aborted on close");
                break;
            }
            let len = bytes.len();
            let kind = err.kind();
            let err = ChannelError::WriteFailed { len, source: err };
            warn!(error = %err, "queued write failed");
            let _ = events.send(ChannelEvent::WriteFailed {
                len,
                kind,
                message: err.to_string(),
            });
        }
    }
    debug!("write queue stopped");
    out
}

/// Device writer whose blocked writes can be abandoned from another thread.
///
/// The handle must be non-blocking. When the device has no room the writer
/// waits for it together with `cancel`; once `cancel` fires, the current and
/// every later write fail with [`ErrorKind::ConnectionAborted`].
pub(crate) struct AbortableWriter {
    device: DeviceHandle,
    cancel: CancelWatch,
    aborted: bool,
}

impl AbortableWriter {
    pub(crate) fn new(device: DeviceHandle, cancel: CancelWatch) -> Self {
        Self {
            device,
            cancel,
            aborted: false,
        }
    }
}

impl Write for AbortableWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            if self.aborted {
                return Err(io::Error::new(ErrorKind::ConnectionAborted, "write aborted"));
            }
            match self.device.write(buf) {
                Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                other => return other,
            }
            match wait_for_writable(&self.device, &self.cancel) {
                Ok(WriteOutcome::Writable) => {}
                Ok(WriteOutcome::HangUp) => return Err(io::Error::from(ErrorKind::BrokenPipe)),
                Ok(WriteOutcome::Cancelled) => self.aborted = true,
                Err(err) => return Err(io::Error::other(err)),
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.device.flush()
    }
}

/// Write one request completely, so concurrent requests never interleave.
pub(crate) fn write_request<W: Write>(out: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    out.write_all(bytes)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::os::unix::net::UnixStream;
    use std::thread;
    use std::time::Duration;

    use modlink_transport::cancel_signal;

    use super::*;

    fn run(requests: Vec<WriteRequest>, closing: bool) -> (Vec<u8>, Vec<ChannelEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        for request in requests {
            tx.send(request).unwrap();
        }
        drop(tx);
        let out = write_queue(Vec::new(), rx, Arc::new(AtomicBool::new(closing)), events_tx);
        (out, events_rx.try_iter().collect())
    }

    #[test]
    fn writes_in_submission_order() {
        let (out, events) = run(
            vec![
                WriteRequest::Payload(Bytes::from_static(b"A")),
                WriteRequest::Payload(Bytes::from_static(b"BC")),
                WriteRequest::Payload(Bytes::from_static(b"D")),
            ],
            false,
        );
        assert_eq!(out, b"ABCD");
        assert!(events.is_empty());
    }

    #[test]
    fn stop_ends_worker_before_later_requests() {
        let (out, _) = run(
            vec![
                WriteRequest::Payload(Bytes::from_static(b"A")),
                WriteRequest::Stop,
                WriteRequest::Payload(Bytes::from_static(b"B")),
            ],
            false,
        );
        assert_eq!(out, b"A");
    }

    #[test]
    fn closing_skips_payloads_but_not_deactivation() {
        let (out, _) = run(
            vec![
                WriteRequest::Payload(Bytes::from_static(b"late")),
                WriteRequest::Deactivate(Bytes::from_static(b"off\0")),
                WriteRequest::Stop,
            ],
            true,
        );
        assert_eq!(out, b"off\0");
    }

    #[test]
    fn failed_write_is_reported_and_worker_continues() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        tx.send(WriteRequest::Payload(Bytes::from_static(b"first"))).unwrap();
        tx.send(WriteRequest::Payload(Bytes::from_static(b"second"))).unwrap();
        tx.send(WriteRequest::Stop).unwrap();

        let out = FailOnce {
            failed: false,
            written: Vec::new(),
        };
        let worker = thread::spawn(move || {
            write_queue(out, rx, Arc::new(AtomicBool::new(false)), events_tx)
        });
        let out = worker.join().unwrap();

        assert_eq!(out.written, b"second");
        let events: Vec<_> = events_rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ChannelEvent::WriteFailed { len, kind, .. } => {
                assert_eq!(*len, 5);
                assert_eq!(*kind, io::ErrorKind::BrokenPipe);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    struct FailOnce {
        failed: bool,
        written: Vec<u8>,
    }

    impl Write for FailOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn abortable_writer_delivers_when_peer_reads() {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let (_trigger, watch) = cancel_signal().unwrap();
        let device = DeviceHandle::from_unix(ours);
        device.set_nonblocking(true).unwrap();

        let payload = vec![7u8; 1024 * 1024];
        let expected = payload.len();
        let reader = thread::spawn(move || {
            let mut received = Vec::new();
            theirs.read_to_end(&mut received).unwrap();
            received.len()
        });

        let mut out = AbortableWriter::new(device, watch);
        write_request(&mut out, &payload).unwrap();
        drop(out);
        assert_eq!(reader.join().unwrap(), expected);
    }

    #[test]
    fn abortable_writer_gives_up_when_cancelled() {
        let (ours, _theirs) = UnixStream::pair().unwrap();
        let (trigger, watch) = cancel_signal().unwrap();
        let device = DeviceHandle::from_unix(ours);
        device.set_nonblocking(true).unwrap();

        let writer = thread::spawn(move || {
            let mut out = AbortableWriter::new(device, watch);
            let first = write_request(&mut out, &vec![0u8; 8 * 1024 * 1024]);
            let second = write_request(&mut out, b"off\0");
            (first, second)
        });
        thread::sleep(Duration::from_millis(50));
        trigger.cancel().unwrap();

        let (first, second) = writer.join().unwrap();
        assert_eq!(first.unwrap_err().kind(), io::ErrorKind::ConnectionAborted);
        assert_eq!(second.unwrap_err().kind(), io::ErrorKind::ConnectionAborted);
    }

    #[test]
    fn aborted_write_on_close_stops_worker_quietly() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        tx.send(WriteRequest::Deactivate(Bytes::from_static(b"off\0"))).unwrap();
        tx.send(WriteRequest::Deactivate(Bytes::from_static(b"off\0"))).unwrap();
        tx.send(WriteRequest::Stop).unwrap();

        let out = Aborted { attempts: 0 };
        let out = write_queue(out, rx, Arc::new(AtomicBool::new(true)), events_tx);

        assert_eq!(out.attempts, 1);
        assert!(events_rx.try_recv().is_err());
    }

    struct Aborted {
        attempts: usize,
    }

    impl Write for Aborted {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            self.attempts += 1;
            Err(io::Error::from(io::ErrorKind::ConnectionAborted))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
