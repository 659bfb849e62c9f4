//! Checksummed frame codec for the OmniSoc serial link.
//!
//! Every frame on the wire is:
//! - A 2-byte big-endian header (message type)
//! - A 1-byte value count (0 to 10)
//! - `count` little-endian IEEE-754 `f32` values
//! - A 1-byte XOR checksum over everything before it
//!
//! There is no start-of-frame marker. When framing is lost the reader
//! discards buffered input and starts again on the next arrival.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    checksum, decode_frame, encode_frame, wire_size, Frame, CHECKSUM_SIZE, HEADER_SIZE,
    MAX_FRAME_SIZE, MAX_VALUES, VALUE_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, ReaderStats};
pub use writer::{send_buffered, FrameWriter};
