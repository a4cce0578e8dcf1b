use std::io::{ErrorKind, Read};

use modlink_transport::{wait_for_event, CancelWatch, DeviceHandle, WaitOutcome};
use tracing::{debug, trace};

use crate::event::{DisconnectCause, EventSender};
use crate::sink::InboundSink;

/// Run the read loop until cancellation, hangup or a read error.
///
/// Each pass waits on the device and the cancel watch together, then does at
/// most one bounded read and hands exactly those bytes to `sink`. Returns why
/// the loop stopped; the caller decides what to announce.
pub(crate) fn read_loop(
    mut device: DeviceHandle,
    cancel: &CancelWatch,
    sink: &mut dyn InboundSink,
    events: &EventSender,
    chunk_size: usize,
) -> DisconnectCause {
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        match wait_for_event(&device, cancel) {
            Ok(WaitOutcome::Readable) => {}
            Ok(WaitOutcome::Cancelled) => {
                debug!("read loop cancelled");
                return DisconnectCause::LocalClose;
            }
            Ok(WaitOutcome::HangUp) => {
                debug!("accessory hung up");
                return DisconnectCause::PeerHangup;
            }
            Err(err) => {
                return DisconnectCause::PollFailed {
                    message: err.to_string(),
                }
            }
        }

        match device.read(&mut buf) {
            Ok(0) => {
                debug!("accessory closed stream");
                return DisconnectCause::PeerHangup;
            }
            Ok(n) => {
                trace!(bytes = n, "read");
                sink.consume(&buf[..n], events);
            }
            Err(err) if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {}
            Err(err) => {
                return DisconnectCause::ReadFailed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::thread;
    use std::time::Duration;

    use modlink_transport::cancel_signal;

    use super::*;
    use crate::event::ChannelEvent;
    use crate::sink::RawSink;

    fn collect_data(rx: &crossbeam_channel::Receiver<ChannelEvent>, len: usize) -> Vec<Vec<u8>> {
        let mut reads = Vec::new();
        let mut total = 0;
        while total < len {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                ChannelEvent::Data(bytes) => {
                    total += bytes.len();
                    reads.push(bytes.to_vec());
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        reads
    }

    #[test]
    fn forwards_reads_until_hangup() {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let (_trigger, watch) = cancel_signal().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        let worker = thread::spawn(move || {
            read_loop(DeviceHandle::from_unix(ours), &watch, &mut RawSink, &tx, 1024)
        });
        theirs.write_all(b"hello").unwrap();
        assert_eq!(collect_data(&rx, 5).concat(), b"hello");

        drop(theirs);
        assert_eq!(worker.join().unwrap(), DisconnectCause::PeerHangup);
    }

    #[test]
    fn reads_are_bounded_by_chunk_size() {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let (_trigger, watch) = cancel_signal().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        let worker = thread::spawn(move || {
            read_loop(DeviceHandle::from_unix(ours), &watch, &mut RawSink, &tx, 4)
        });
        theirs.write_all(&[7u8; 10]).unwrap();
        let reads = collect_data(&rx, 10);
        assert!(reads.len() >= 3);
        assert!(reads.iter().all(|read| read.len() <= 4));

        drop(theirs);
        assert_eq!(worker.join().unwrap(), DisconnectCause::PeerHangup);
    }

    #[test]
    fn cancel_stops_idle_loop() {
        let (ours, _theirs) = UnixStream::pair().unwrap();
        let (trigger, watch) = cancel_signal().unwrap();
        let (tx, _rx) = crossbeam_channel::unbounded();

        let worker = thread::spawn(move || {
            read_loop(DeviceHandle::from_unix(ours), &watch, &mut RawSink, &tx, 1024)
        });
        trigger.cancel().unwrap();
        assert_eq!(worker.join().unwrap(), DisconnectCause::LocalClose);
    }
}
