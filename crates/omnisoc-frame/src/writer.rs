use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_frame, Frame, MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};

/// Writes complete frames to any `Write` stream.
///
/// Each frame goes out in a single write call. A transport that accepts
/// fewer bytes than the frame length fails the send; the remainder is not
/// retried, since a half-sent frame is already corrupt on the wire.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.header, &frame.values)
    }

    /// Encode and send a header and values.
    pub fn send(&mut self, header: u16, values: &[f32]) -> Result<()> {
        send_buffered(&mut self.inner, &mut self.buf, header, values)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        flush(&mut self.inner)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Encode into `buf` and write the frame to `inner` in one write call.
///
/// `buf` is cleared first, so one buffer can serve every send on a stream.
/// The stream is flushed after a complete write.
pub fn send_buffered<W: Write + ?Sized>(
    inner: &mut W,
    buf: &mut BytesMut,
    header: u16,
    values: &[f32],
) -> Result<()> {
    buf.clear();
    encode_frame(header, values, buf)?;

    let expected = buf.len();
    let written = loop {
        match inner.write(&buf[..]) {
            Ok(n) => break n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    };
    if written != expected {
        return Err(FrameError::ShortWrite { written, expected });
    }

    trace!(header, count = values.len(), bytes = expected, "sent frame");
    flush(inner)
}

fn flush<W: Write + ?Sized>(inner: &mut W) -> Result<()> {
    loop {
        match inner.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}
