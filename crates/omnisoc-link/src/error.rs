use omnisoc_frame::FrameError;
use omnisoc_transport::TransportError;

/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error (open, configure, accept, discard).
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

impl LinkError {
    /// Whether the byte stream itself failed, as opposed to the data on it.
    ///
    /// Transport open failures, I/O failures and short writes are connection
    /// errors. Malformed or incomplete frames are not.
    pub fn is_connection(&self) -> bool {
        match self {
            LinkError::Connection(_) => true,
            LinkError::Frame(err) => err.is_connection(),
        }
    }

    /// The frame error, if this is one.
    pub fn as_frame(&self) -> Option<&FrameError> {
        match self {
            LinkError::Frame(err) => Some(err),
            LinkError::Connection(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_classification() {
        assert!(LinkError::from(TransportError::NotOpen).is_connection());
        assert!(LinkError::from(FrameError::ShortWrite {
            written: 1,
            expected: 8
        })
        .is_connection());
        assert!(LinkError::from(FrameError::Io(std::io::Error::other("gone"))).is_connection());

        assert!(!LinkError::from(FrameError::ChecksumMismatch {
            computed: 1,
            received: 2
        })
        .is_connection());
        assert!(!LinkError::from(FrameError::Incomplete {
            expected: 3,
            received: 1
        })
        .is_connection());
        assert!(!LinkError::from(FrameError::TooManyValues { count: 12, max: 10 }).is_connection());
    }

    #[test]
    fn as_frame_exposes_inner_error() {
        let err = LinkError::from(FrameError::TooManyValues { count: 11, max: 10 });
        assert!(matches!(
            err.as_frame(),
            Some(FrameError::TooManyValues { count: 11, .. })
        ));
        assert!(LinkError::from(TransportError::NotOpen).as_frame().is_none());
    }
}
