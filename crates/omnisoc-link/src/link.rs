use std::time::Instant;

use bytes::BytesMut;
use omnisoc_frame::{
    send_buffered, Frame, FrameError, FrameReader, ReaderStats, MAX_FRAME_SIZE,
};
use omnisoc_transport::Transport;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::event::{EventHook, LinkEvent};
use crate::liveness::LivenessTracker;

/// A framed session over one exclusively owned transport.
///
/// The transport is opened by [`Link::open`] and closed when the link is
/// closed or dropped. All calls block for at most the transport's read wait
/// per underlying read.
pub struct Link<T: Transport> {
    reader: FrameReader<T>,
    write_buf: BytesMut,
    config: LinkConfig,
    liveness: LivenessTracker,
    hook: Option<EventHook>,
}

impl<T: Transport> Link<T> {
    /// Take ownership of `transport`, opening it if needed.
    ///
    /// With [`LinkConfig::resync_on_open`] set, whatever was already
    /// buffered on the line is discarded before the first read.
    pub fn open(mut transport: T, config: LinkConfig) -> Result<Self> {
        if !transport.is_open() {
            transport.open()?;
        }
        debug!(
            transport = transport.identifier(),
            timeout_period = ?config.timeout_period,
            "link open"
        );

        let mut link = Self {
            reader: FrameReader::new(transport),
            write_buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
            config,
            liveness: LivenessTracker::new(),
            hook: None,
        };
        if link.config.resync_on_open {
            link.reader.resync()?;
        }
        Ok(link)
    }

    /// Install a callback for [`LinkEvent`]s, replacing any previous one.
    pub fn with_event_hook(mut self, hook: impl FnMut(&LinkEvent) + Send + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Encode and send one frame. Failures are reported, never retried.
    pub fn send(&mut self, header: u16, values: &[f32]) -> Result<()> {
        let result = send_buffered(self.reader.get_mut(), &mut self.write_buf, header, values);
        if let Err(err) = &result {
            warn!(header, error = %err, "send failed");
            self.emit(LinkEvent::SendFailed {
                header,
                kind: err.kind_name(),
            });
        }
        result.map_err(LinkError::from)
    }

    /// Send an already built frame.
    pub fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.header, &frame.values)
    }

    /// Receive the next frame.
    ///
    /// An idle line is reported as [`FrameError::Incomplete`] with nothing
    /// received. Framing corruption discards buffered input before the error
    /// is returned.
    pub fn recv(&mut self) -> Result<Frame> {
        match self.receive(false)? {
            Some(frame) => Ok(frame),
            None => Err(FrameError::Incomplete {
                expected: omnisoc_frame::HEADER_SIZE,
                received: 0,
            }
            .into()),
        }
    }

    /// Like [`recv`](Self::recv), but an idle line yields `Ok(None)`.
    pub fn poll(&mut self) -> Result<Option<Frame>> {
        self.receive(true)
    }

    fn receive(&mut self, idle_is_none: bool) -> Result<Option<Frame>> {
        match self.reader.read_frame() {
            Ok(frame) => {
                self.on_frame(&frame);
                Ok(Some(frame))
            }
            Err(FrameError::Incomplete { received: 0, .. }) if idle_is_none => Ok(None),
            Err(err) => {
                let resynced = err.requires_resync();
                match &err {
                    FrameError::Incomplete { .. } => debug!(error = %err, "receive incomplete"),
                    FrameError::Io(_) => warn!(error = %err, "receive failed"),
                    _ => {}
                }
                self.emit(LinkEvent::DecodeFailed {
                    kind: err.kind_name(),
                    resynced,
                });
                Err(err.into())
            }
        }
    }

    fn on_frame(&mut self, frame: &Frame) {
        let restored = self.liveness.is_timed_out();
        self.liveness.on_frame_decoded();
        self.emit(LinkEvent::FrameDecoded {
            header: frame.header,
            count: frame.values.len(),
        });
        if restored {
            info!(transport = self.reader.get_ref().identifier(), "link live");
            self.emit(LinkEvent::LivenessRestored);
        }
    }

    /// Whether the transport is open and a frame arrived within the
    /// configured liveness window.
    pub fn is_live(&self) -> bool {
        self.reader.get_ref().is_open()
            && self
                .liveness
                .is_live(Instant::now(), self.config.timeout_period)
    }

    /// Mark the link timed out if the liveness window has passed.
    ///
    /// Returns `true` only on the transition.
    pub fn expire_if_stale(&mut self) -> bool {
        let now = Instant::now();
        if !self
            .liveness
            .expire_if_stale(now, self.config.timeout_period)
        {
            return false;
        }
        let since_last_live = self.liveness.since_last_live(now);
        warn!(
            transport = self.reader.get_ref().identifier(),
            ?since_last_live,
            "link timed out"
        );
        self.emit(LinkEvent::LivenessExpired { since_last_live });
        true
    }

    /// The liveness tracker.
    pub fn liveness(&self) -> &LivenessTracker {
        &self.liveness
    }

    /// Mutable access to the liveness tracker.
    pub fn liveness_mut(&mut self) -> &mut LivenessTracker {
        &mut self.liveness
    }

    /// Decode counters for this session.
    pub fn stats(&self) -> ReaderStats {
        self.reader.stats()
    }

    /// The session configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        self.reader.get_ref()
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        self.reader.get_mut()
    }

    /// Close the transport and end the session.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let transport = self.reader.get_mut();
        if transport.is_open() {
            transport.close();
            debug!(transport = transport.identifier(), "link closed");
        }
    }

    fn emit(&mut self, event: LinkEvent) {
        if let Some(hook) = self.hook.as_mut() {
            hook(&event);
        }
    }
}

impl<T: Transport> Drop for Link<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
