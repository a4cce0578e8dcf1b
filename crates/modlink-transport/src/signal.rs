//! One-shot cancellation of a blocked readiness wait.
//!
//! A [`CancelTrigger`] is held by whoever may tear the channel down; the
//! matching [`CancelWatch`] is polled by the read loop alongside the device
//! handle. Firing consumes the trigger, so a signal can never be raised twice,
//! and a fresh pair is created for every channel open.
//!
//! On Linux the pair shares one `eventfd`. Elsewhere it is a connected
//! `UnixStream` pair.

use std::os::fd::{AsRawFd, RawFd};

use tracing::debug;

use crate::error::{Result, TransportError};

/// Create a fresh trigger/watch pair.
pub fn cancel_signal() -> Result<(CancelTrigger, CancelWatch)> {
    let (trigger, watch) = Endpoint::pair()?;
    Ok((
        CancelTrigger {
            endpoint: trigger,
            fired: false,
        },
        CancelWatch { endpoint: watch },
    ))
}

/// Raising side of the signal. Dropping an unfired trigger also fires it.
#[derive(Debug)]
pub struct CancelTrigger {
    endpoint: Endpoint,
    fired: bool,
}

impl CancelTrigger {
    /// Wake the watcher. Consumes the trigger.
    pub fn cancel(mut self) -> Result<()> {
        self.endpoint.raise()?;
        self.fired = true;
        debug!("cancellation signalled");
        Ok(())
    }
}

impl Drop for CancelTrigger {
    fn drop(&mut self) {
        if !self.fired {
            let _ = self.endpoint.raise();
        }
    }
}

/// Waiting side of the signal; poll its raw fd for readability.
#[derive(Debug)]
pub struct CancelWatch {
    endpoint: Endpoint,
}

impl CancelWatch {
    /// Consume a pending wake so the signal is observed exactly once.
    pub fn acknowledge(&self) {
        self.endpoint.drain();
    }
}

impl AsRawFd for CancelWatch {
    fn as_raw_fd(&self) -> RawFd {
        self.endpoint.as_raw_fd()
    }
}

#[derive(Debug)]
enum Endpoint {
    #[cfg(target_os = "linux")]
    EventFd(std::sync::Arc<std::os::fd::OwnedFd>),
    #[cfg(not(target_os = "linux"))]
    Socket(std::os::unix::net::UnixStream),
}

impl Endpoint {
    #[cfg(target_os = "linux")]
    fn pair() -> Result<(Self, Self)> {
        use std::os::fd::FromRawFd;

        // SAFETY: eventfd has no pointer arguments; the returned descriptor is
        // checked before being wrapped.
        let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };
        if fd < 0 {
            return Err(TransportError::Signal(std::io::Error::last_os_error()));
        }
        // SAFETY: `fd` is a freshly created descriptor owned by nobody else.
        let owned = std::sync::Arc::new(unsafe { std::os::fd::OwnedFd::from_raw_fd(fd) });
        Ok((Self::EventFd(owned.clone()), Self::EventFd(owned)))
    }

    #[cfg(not(target_os = "linux"))]
    fn pair() -> Result<(Self, Self)> {
        let (wake, watch) =
            std::os::unix::net::UnixStream::pair().map_err(TransportError::Signal)?;
        watch.set_nonblocking(true).map_err(TransportError::Signal)?;
        Ok((Self::Socket(wake), Self::Socket(watch)))
    }

    #[cfg(target_os = "linux")]
    fn raise(&self) -> Result<()> {
        let value: u64 = 1;
        // SAFETY: writes exactly 8 bytes from a live u64 to an eventfd we own.
        let rc = unsafe {
            libc::write(
                self.as_raw_fd(),
                (&value as *const u64).cast::<libc::c_void>(),
                std::mem::size_of::<u64>(),
            )
        };
        if rc < 0 {
            return Err(TransportError::Signal(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn raise(&self) -> Result<()> {
        use std::io::Write;

        let Self::Socket(stream) = self;
        (&*stream)
            .write_all(&[0xFF])
            .map_err(TransportError::Signal)
    }

    #[cfg(target_os = "linux")]
    fn drain(&self) {
        let mut value: u64 = 0;
        // SAFETY: reads at most 8 bytes into a live u64; the fd is non-blocking.
        let _ = unsafe {
            libc::read(
                self.as_raw_fd(),
                (&mut value as *mut u64).cast::<libc::c_void>(),
                std::mem::size_of::<u64>(),
            )
        };
    }

    #[cfg(not(target_os = "linux"))]
    fn drain(&self) {
        use std::io::Read;

        let Self::Socket(stream) = self;
        let mut buf = [0u8; 1];
        let _ = (&*stream).read(&mut buf);
    }

    fn as_raw_fd(&self) -> RawFd {
        match self {
            #[cfg(target_os = "linux")]
            Self::EventFd(fd) => fd.as_raw_fd(),
            #[cfg(not(target_os = "linux"))]
            Self::Socket(stream) => stream.as_raw_fd(),
        }
    }
}
