use std::time::Duration;

/// Structured notifications emitted by a [`Link`](crate::Link).
///
/// Events describe what already happened. A hook receiving them cannot change
/// the outcome of the call that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A valid frame was decoded.
    FrameDecoded { header: u16, count: usize },
    /// A receive attempt failed. `kind` is [`FrameError::kind_name`].
    ///
    /// [`FrameError::kind_name`]: omnisoc_frame::FrameError::kind_name
    DecodeFailed { kind: &'static str, resynced: bool },
    /// A send failed and was not retried.
    SendFailed { header: u16, kind: &'static str },
    /// A frame arrived while the link was timed out.
    LivenessRestored,
    /// No frame arrived within the liveness window.
    LivenessExpired { since_last_live: Duration },
}

/// Boxed event callback installed with [`Link::with_event_hook`](crate::Link::with_event_hook).
pub type EventHook = Box<dyn FnMut(&LinkEvent) + Send + 'static>;
