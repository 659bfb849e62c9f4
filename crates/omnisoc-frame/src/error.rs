/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// More values than a frame can carry, on either the send or receive side.
    #[error("too many values ({count}, max {max})")]
    TooManyValues { count: usize, max: usize },

    /// The stream went quiet (or ended) before the frame was complete.
    #[error("incomplete frame ({received} of {expected} bytes)")]
    Incomplete { expected: usize, received: usize },

    /// The trailing XOR checksum does not match the frame contents.
    #[error("checksum mismatch (computed {computed:#04x}, received {received:#04x})")]
    ChecksumMismatch { computed: u8, received: u8 },

    /// The transport accepted fewer bytes than the encoded frame.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether the inbound stream must be discarded before the next decode.
    ///
    /// An oversized count or a bad checksum means frame boundaries can no
    /// longer be trusted. A short read only means data has not arrived yet.
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            FrameError::TooManyValues { .. } | FrameError::ChecksumMismatch { .. }
        )
    }

    /// Whether this failure came from the byte stream rather than frame
    /// contents.
    pub fn is_connection(&self) -> bool {
        matches!(self, FrameError::ShortWrite { .. } | FrameError::Io(_))
    }

    /// Short, stable name for logs and structured events.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FrameError::TooManyValues { .. } => "too_many_values",
            FrameError::Incomplete { .. } => "incomplete",
            FrameError::ChecksumMismatch { .. } => "checksum_mismatch",
            FrameError::ShortWrite { .. } => "short_write",
            FrameError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
