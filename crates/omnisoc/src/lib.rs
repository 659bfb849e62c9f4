//! Checksummed float-vector framing over serial lines.
//!
//! omnisoc carries small messages (a 16-bit header and up to ten `f32`
//! values) between a host and a microcontroller over a UART, or over TCP
//! standing in for one. Corrupted frames are detected by an XOR checksum and
//! the stream is resynchronized by discarding buffered input.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-stream transports (serial TTY, TCP)
//! - [`frame`]: Frame codec, reader and writer
//! - [`link`]: Session with resync and liveness (behind `link` feature)

/// Re-export transport types.
pub mod transport {
    pub use omnisoc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use omnisoc_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use omnisoc_link::*;
}
