use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::handle::DeviceHandle;

/// The acquire/release boundary owned by the accessory manager.
///
/// Discovery and permission checks happen before a provider is handed to a
/// channel; by the time `acquire` runs the caller has already decided which
/// accessory to talk to.
pub trait HandleProvider {
    /// Obtain a read/write handle to the accessory.
    ///
    /// Any failure here is reported as [`TransportError::HandleUnavailable`].
    fn acquire(&mut self) -> Result<DeviceHandle>;

    /// Give the handle back once both channel workers have stopped.
    fn release(&mut self, handle: DeviceHandle) {
        drop(handle);
    }

    /// Human-readable name of the accessory for logs.
    fn describe(&self) -> String {
        "accessory".to_string()
    }
}

impl<F> HandleProvider for F
where
    F: FnMut() -> Result<DeviceHandle>,
{
    fn acquire(&mut self) -> Result<DeviceHandle> {
        self()
    }
}

/// Opens a raw-protocol device node read/write.
#[derive(Debug, Clone)]
pub struct DevicePath {
    path: PathBuf,
}

impl DevicePath {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HandleProvider for DevicePath {
    fn acquire(&mut self) -> Result<DeviceHandle> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|source| TransportError::HandleUnavailable {
                device: self.describe(),
                source,
            })?;
        debug!(path = ?self.path, "opened accessory device node");
        Ok(DeviceHandle::from_file(file))
    }

    fn release(&mut self, handle: DeviceHandle) {
        debug!(path = ?self.path, "releasing accessory device node");
        drop(handle);
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Connects to an accessory emulator listening on a Unix domain socket.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct SocketPath {
    path: PathBuf,
}

#[cfg(unix)]
impl SocketPath {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[cfg(unix)]
impl HandleProvider for SocketPath {
    fn acquire(&mut self) -> Result<DeviceHandle> {
        let stream = std::os::unix::net::UnixStream::connect(&self.path).map_err(|source| {
            TransportError::HandleUnavailable {
                device: self.describe(),
                source,
            }
        })?;
        debug!(path = ?self.path, "connected to accessory socket");
        Ok(DeviceHandle::from_unix(stream))
    }

    fn describe(&self) -> String {
        format!("unix:{}", self.path.display())
    }
}
