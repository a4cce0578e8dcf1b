use std::fs::File;
use std::io::{Read, Write};

use crate::error::Result;

/// An open accessory handle, readable and writable.
///
/// This is the one I/O object a duplex channel is built around. On a real
/// accessory it wraps the raw-protocol device node; an emulated accessory
/// exposes the same byte stream over a Unix domain socket.
pub struct DeviceHandle {
    inner: DeviceHandleInner,
}

enum DeviceHandleInner {
    Device(File),
    #[cfg(unix)]
    Socket(std::os::unix::net::UnixStream),
}

impl Read for DeviceHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceHandleInner::Device(file) => file.read(buf),
            #[cfg(unix)]
            DeviceHandleInner::Socket(stream) => stream.read(buf),
        }
    }
}

impl Write for DeviceHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceHandleInner::Device(file) => file.write(buf),
            #[cfg(unix)]
            DeviceHandleInner::Socket(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            DeviceHandleInner::Device(file) => file.flush(),
            #[cfg(unix)]
            DeviceHandleInner::Socket(stream) => stream.flush(),
        }
    }
}

impl DeviceHandle {
    /// Wrap an already-opened device node.
    pub fn from_file(file: File) -> Self {
        Self {
            inner: DeviceHandleInner::Device(file),
        }
    }

    /// Wrap a connected Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: DeviceHandleInner::Socket(stream),
        }
    }

    /// Try to clone this handle (creates a new file descriptor on the same
    /// open file description).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            DeviceHandleInner::Device(file) => Ok(Self::from_file(file.try_clone()?)),
            #[cfg(unix)]
            DeviceHandleInner::Socket(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Switch the handle between blocking and non-blocking mode.
    ///
    /// The flag lives on the open file description, so every clone made
    /// with [`DeviceHandle::try_clone`] sees the change.
    #[cfg(unix)]
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            DeviceHandleInner::Device(file) => set_fd_nonblocking(file, nonblocking),
            DeviceHandleInner::Socket(stream) => Ok(stream.set_nonblocking(nonblocking)?),
        }
    }

    /// Handle kind for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            DeviceHandleInner::Device(_) => "device",
            #[cfg(unix)]
            DeviceHandleInner::Socket(_) => "unix-socket",
        }
    }
}

#[cfg(unix)]
impl std::os::fd::AsRawFd for DeviceHandle {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        match &self.inner {
            DeviceHandleInner::Device(file) => file.as_raw_fd(),
            DeviceHandleInner::Socket(stream) => stream.as_raw_fd(),
        }
    }
}

#[cfg(unix)]
fn set_fd_nonblocking(fd: &impl std::os::fd::AsRawFd, nonblocking: bool) -> Result<()> {
    let fd = fd.as_raw_fd();
    // SAFETY: F_GETFL takes no pointer arguments and `fd` is owned by a live handle.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    // SAFETY: F_SETFL with an integer flag set; no pointers involved.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("type", &self.kind())
            .finish()
    }
}
