//! Blocking byte-stream transports for the OmniSoc link.
//!
//! Provides the capability the framing layer consumes ([`Transport`]) and
//! two implementations of it:
//! - Serial TTY devices (Unix, raw 8N1 via termios)
//! - TCP streams standing in for a serial line
//!
//! This is the lowest layer of omnisoc. It knows nothing about frames.

use std::time::Duration;

pub mod error;
#[cfg(unix)]
pub mod serial;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
#[cfg(unix)]
pub use serial::{SerialConfig, SerialPort};
pub use tcp::{TcpConfig, TcpRole, TcpStreamTransport};
pub use traits::{is_hangup, is_timeout, Transport};

/// Default line rate, matching the microcontroller firmware.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Default per-read wait.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(20);
