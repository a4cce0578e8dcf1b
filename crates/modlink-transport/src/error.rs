use std::path::PathBuf;

/// Errors that can occur while acquiring or waiting on an accessory device handle.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The accessory's device handle could not be obtained.
    #[error("device handle unavailable for {device}: {source}")]
    HandleUnavailable {
        device: String,
        source: std::io::Error,
    },

    /// Failed to bind an emulator socket.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming host connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The cancellation signal could not be created or fired.
    #[error("cancellation signal error: {0}")]
    Signal(std::io::Error),

    /// The multiplexed readiness wait failed.
    #[error("readiness wait failed: {0}")]
    Poll(std::io::Error),

    /// An I/O error occurred on the device handle.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// The underlying I/O error kind, when there is one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            TransportError::HandleUnavailable { source, .. }
            | TransportError::Bind { source, .. } => Some(source.kind()),
            TransportError::Accept(err)
            | TransportError::Signal(err)
            | TransportError::Poll(err)
            | TransportError::Io(err) => Some(err.kind()),
            TransportError::PathTooLong { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn io_kind_reports_the_source_kind() {
        let unavailable = TransportError::HandleUnavailable {
            device: "/dev/raw".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let poll = TransportError::Poll(io::Error::from(io::ErrorKind::Interrupted));
        let too_long = TransportError::PathTooLong {
            path: PathBuf::from("/tmp/x"),
            len: 200,
            max: 107,
        };

        assert_eq!(unavailable.io_kind(), Some(io::ErrorKind::NotFound));
        assert_eq!(poll.io_kind(), Some(io::ErrorKind::Interrupted));
        assert_eq!(too_long.io_kind(), None);
    }
}
