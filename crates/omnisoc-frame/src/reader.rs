use omnisoc_transport::{Transport, TransportError};
use tracing::{trace, warn};

use crate::codec::{decode_frame, Frame};
use crate::error::{FrameError, Result};

/// Running decode counters for one reader.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStats {
    /// Frames decoded successfully.
    pub frames: u64,
    /// Attempts that ended before a full frame arrived.
    pub incomplete: u64,
    /// Times buffered input was discarded after framing corruption.
    pub resyncs: u64,
}

/// Reads validated frames from a [`Transport`].
///
/// Resynchronization is handled here: when a decode fails in a way that
/// means frame boundaries are lost, buffered input is discarded before the
/// error is returned, so the next call starts on a clean boundary.
pub struct FrameReader<T> {
    inner: T,
    stats: ReaderStats,
}

impl<T: Transport> FrameReader<T> {
    /// Create a frame reader over `inner`.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            stats: ReaderStats::default(),
        }
    }

    /// Read the next frame, blocking for at most the transport's read wait
    /// per underlying read.
    pub fn read_frame(&mut self) -> Result<Frame> {
        match decode_frame(&mut self.inner) {
            Ok(frame) => {
                self.stats.frames += 1;
                trace!(
                    header = frame.header,
                    count = frame.values.len(),
                    "decoded frame"
                );
                Ok(frame)
            }
            Err(err) if err.requires_resync() => {
                warn!(
                    transport = self.inner.identifier(),
                    error = %err,
                    "framing lost; discarding buffered input"
                );
                self.resync()?;
                Err(err)
            }
            Err(err) => {
                if matches!(err, FrameError::Incomplete { .. }) {
                    self.stats.incomplete += 1;
                }
                Err(err)
            }
        }
    }

    /// Discard all buffered inbound bytes.
    pub fn resync(&mut self) -> Result<()> {
        self.inner.discard_input().map_err(transport_to_frame_error)?;
        self.stats.resyncs += 1;
        Ok(())
    }

    /// Decode counters since creation.
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

pub(crate) fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Open { source, .. } | TransportError::Configure { source, .. } => {
            FrameError::Io(source)
        }
        TransportError::NotOpen => FrameError::Io(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "transport is not open",
        )),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
