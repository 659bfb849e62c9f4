//! Session layer for the OmniSoc serial link.
//!
//! A [`Link`] owns one [`Transport`](omnisoc_transport::Transport), sends and
//! receives frames over it, resynchronizes after framing corruption, and
//! tracks liveness from the arrival of valid frames.

pub mod config;
pub mod error;
pub mod event;
pub mod link;
pub mod liveness;

pub use config::{LinkConfig, DEFAULT_TIMEOUT_PERIOD};
pub use error::{LinkError, Result};
pub use event::{EventHook, LinkEvent};
pub use link::Link;
pub use liveness::LivenessTracker;
