use std::os::fd::AsRawFd;

use tracing::trace;

use crate::error::{Result, TransportError};
use crate::signal::CancelWatch;

/// The single condition that ended a [`wait_for_event`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Bytes are ready on the device handle.
    Readable,
    /// The accessory side of the handle went away.
    HangUp,
    /// The cancellation signal fired. The wake has been acknowledged.
    Cancelled,
}

/// The single condition that ended a [`wait_for_writable`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The device accepts more bytes, or has an error the next write reports.
    Writable,
    /// The accessory side of the handle went away.
    HangUp,
    /// The cancellation signal fired. The wake has been acknowledged.
    Cancelled,
}

/// Block until the device has data, the peer hangs up, or cancellation fires.
///
/// All three are watched in one `poll(2)` call. When several are ready at
/// once cancellation wins, then hangup, then data, so a hung-up handle with
/// unread bytes still reports [`WaitOutcome::HangUp`].
pub fn wait_for_event(device: &impl AsRawFd, cancel: &CancelWatch) -> Result<WaitOutcome> {
    let Some(device_events) = poll_with_cancel(device, libc::POLLIN, cancel)? else {
        return Ok(WaitOutcome::Cancelled);
    };
    if device_events & libc::POLLHUP != 0 {
        return Ok(WaitOutcome::HangUp);
    }
    if device_events & libc::POLLIN != 0 {
        return Ok(WaitOutcome::Readable);
    }

    Err(TransportError::Poll(std::io::Error::other(format!(
        "unexpected device events {device_events:#x}"
    ))))
}

/// Block until a non-blocking device can take more bytes, or cancellation fires.
///
/// Cancellation wins over writability. Errors flagged by `POLLERR` are left
/// for the following write call to report.
pub fn wait_for_writable(device: &impl AsRawFd, cancel: &CancelWatch) -> Result<WriteOutcome> {
    let Some(device_events) = poll_with_cancel(device, libc::POLLOUT, cancel)? else {
        return Ok(WriteOutcome::Cancelled);
    };
    if device_events & (libc::POLLOUT | libc::POLLERR) != 0 {
        return Ok(WriteOutcome::Writable);
    }
    if device_events & libc::POLLHUP != 0 {
        return Ok(WriteOutcome::HangUp);
    }

    Err(TransportError::Poll(std::io::Error::other(format!(
        "unexpected device events {device_events:#x}"
    ))))
}

/// Poll `device` for `interest` alongside `cancel`.
///
/// Returns `None` when the cancel watch fired (and acknowledges it),
/// otherwise the device's `revents`.
fn poll_with_cancel(
    device: &impl AsRawFd,
    interest: libc::c_short,
    cancel: &CancelWatch,
) -> Result<Option<libc::c_short>> {
    let mut fds = [
        libc::pollfd {
            fd: device.as_raw_fd(),
            events: interest | libc::POLLHUP,
            revents: 0,
        },
        libc::pollfd {
            fd: cancel.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
    ];

    loop {
        // SAFETY: `fds` is a valid array of two pollfd entries for the duration
        // of the call and both descriptors are owned by live objects.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(TransportError::Poll(err));
        }
        if rc == 0 {
            continue;
        }
        break;
    }

    let device_events = fds[0].revents;
    let cancel_events = fds[1].revents;
    trace!(device_events, cancel_events, "readiness wait woke");

    if cancel_events != 0 {
        cancel.acknowledge();
        return Ok(None);
    }
    Ok(Some(device_events))
}
