use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A blocking byte stream with a bounded read wait.
///
/// This is the capability the framing layer consumes. Implementations own
/// the endpoint (device node or socket) and expose it through the standard
/// [`Read`] and [`Write`] traits:
///
/// - `read` blocks for at most [`read_timeout`](Transport::read_timeout) and
///   returns whatever arrived. An expired wait with nothing available is
///   reported as `ErrorKind::TimedOut`. A peer hang-up is reported as
///   `ErrorKind::UnexpectedEof`, so `Ok(0)` only answers an empty buffer.
/// - `write` returns the number of bytes accepted; callers treat a short
///   count as a failed send.
/// - both fail with `ErrorKind::NotConnected` while the transport is closed.
pub trait Transport: Read + Write {
    /// Open the endpoint described by the transport's configuration.
    ///
    /// Opening an already open transport closes it first.
    fn open(&mut self) -> Result<()>;

    /// Close the endpoint. Closing a closed transport is a no-op.
    fn close(&mut self);

    /// Whether the endpoint is currently open.
    fn is_open(&self) -> bool;

    /// Drop every inbound byte that is buffered or still arriving.
    fn discard_input(&mut self) -> Result<()>;

    /// Maximum time a single read waits for data.
    fn read_timeout(&self) -> Duration;

    /// Update the read wait for subsequent reads.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Human-readable endpoint name for diagnostics.
    fn identifier(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }

    fn read_timeout(&self) -> Duration {
        (**self).read_timeout()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }

    fn read_timeout(&self) -> Duration {
        (**self).read_timeout()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

/// Returns true if the error means "no data before the read wait expired".
///
/// Socket timeouts surface as `WouldBlock` on Unix and `TimedOut` elsewhere;
/// both are treated the same.
pub fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

pub(crate) fn not_open() -> std::io::Error {
    std::io::Error::new(ErrorKind::NotConnected, "transport is not open")
}

pub(crate) fn timed_out(what: &str) -> std::io::Error {
    std::io::Error::new(ErrorKind::TimedOut, format!("{what} timed out"))
}

pub(crate) fn hung_up(what: &str) -> std::io::Error {
    std::io::Error::new(ErrorKind::UnexpectedEof, format!("{what}: peer hung up"))
}

/// Whether `err` reports that the far end went away.
pub fn is_hangup(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::UnexpectedEof
}
