/// Errors that can occur in link transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the endpoint (device node or socket address).
    #[error("failed to open {identifier}: {source}")]
    Open {
        identifier: String,
        source: std::io::Error,
    },

    /// The endpoint opened but could not be configured (line settings, timeouts).
    #[error("failed to configure {identifier}: {source}")]
    Configure {
        identifier: String,
        source: std::io::Error,
    },

    /// The requested baud rate has no termios equivalent on this platform.
    #[error("unsupported baud rate: {0}")]
    UnsupportedBaudRate(u32),

    /// Failed to accept the single peer of a listening transport.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// The operation requires an open transport.
    #[error("transport is not open")]
    NotOpen,

    /// An I/O error occurred on the open byte stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// The underlying I/O error, if this failure carries one.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            TransportError::Open { source, .. } | TransportError::Configure { source, .. } => {
                Some(source)
            }
            TransportError::Accept(err) | TransportError::Io(err) => Some(err),
            TransportError::UnsupportedBaudRate(_) | TransportError::NotOpen => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
