use std::path::PathBuf;

/// Errors that can occur while opening or driving a link transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The device opened but rejected the line settings.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested baud rate has no termios equivalent.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaudRate(u32),

    /// Failed to bind a bridge socket.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to a bridge socket.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// Port discovery found no attached controller.
    #[error("no controller found (looked for USB vendor {vendor_id:04x})")]
    NoControllerFound { vendor_id: u16 },
}

impl TransportError {
    /// The underlying I/O error, if there is one.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            Self::Open { source, .. }
            | Self::Configure { source, .. }
            | Self::Bind { source, .. }
            | Self::Connect { source, .. } => Some(source),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
