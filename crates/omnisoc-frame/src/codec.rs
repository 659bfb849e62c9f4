use std::io::{ErrorKind, Read};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use omnisoc_transport::is_timeout;

use crate::error::{FrameError, Result};

/// Frame prefix: header (2) + value count (1) = 3 bytes.
pub const HEADER_SIZE: usize = 3;

/// Size of one encoded value (`f32`).
pub const VALUE_SIZE: usize = 4;

/// Size of the trailing checksum.
pub const CHECKSUM_SIZE: usize = 1;

/// Most values a single frame may carry.
pub const MAX_VALUES: usize = 10;

/// Largest possible encoded frame.
pub const MAX_FRAME_SIZE: usize = wire_size(MAX_VALUES);

/// One message: a message-type header and up to [`MAX_VALUES`] floats.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Application-defined message type/id.
    pub header: u16,
    /// Values in wire order.
    pub values: Vec<f32>,
}

impl Frame {
    /// Create a frame, rejecting more than [`MAX_VALUES`] values.
    pub fn new(header: u16, values: impl Into<Vec<f32>>) -> Result<Self> {
        let values = values.into();
        if values.len() > MAX_VALUES {
            return Err(FrameError::TooManyValues {
                count: values.len(),
                max: MAX_VALUES,
            });
        }
        Ok(Self { header, values })
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        wire_size(self.values.len())
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_frame(self.header, &self.values, &mut buf)?;
        Ok(buf.freeze())
    }
}

/// Encoded length of a frame carrying `count` values.
pub const fn wire_size(count: usize) -> usize {
    HEADER_SIZE + count * VALUE_SIZE + CHECKSUM_SIZE
}

/// XOR of every byte in `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────┬──────────────────────┬──────────┐
/// │ Header (2B)  │ Count   │ Values               │ Checksum │
/// │ big-endian   │ (1B)    │ (Count x 4B f32 LE)  │ (1B XOR) │
/// └──────────────┴─────────┴──────────────────────┴──────────┘
/// ```
///
/// The checksum is the XOR of every preceding byte. Nothing is appended to
/// `dst` if `values` is too long.
pub fn encode_frame(header: u16, values: &[f32], dst: &mut BytesMut) -> Result<()> {
    if values.len() > MAX_VALUES {
        return Err(FrameError::TooManyValues {
            count: values.len(),
            max: MAX_VALUES,
        });
    }

    let start = dst.len();
    dst.reserve(wire_size(values.len()));
    dst.put_u16(header);
    dst.put_u8(values.len() as u8);
    for value in values {
        dst.put_f32_le(*value);
    }
    let sum = checksum(&dst[start..]);
    dst.put_u8(sum);
    Ok(())
}

/// Decode one frame from a blocking byte source.
///
/// Each decode is self-contained: bytes consumed by a failed attempt are not
/// given back. A short read (`Incomplete`) leaves the stream alone; the two
/// corruption cases report [`FrameError::requires_resync`] and the caller is
/// expected to discard buffered input before trying again.
pub fn decode_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Frame> {
    let mut head = [0u8; HEADER_SIZE];
    let received = read_up_to(reader, &mut head)?;
    if received < HEADER_SIZE {
        return Err(FrameError::Incomplete {
            expected: HEADER_SIZE,
            received,
        });
    }

    let count = head[2] as usize;
    if count > MAX_VALUES {
        return Err(FrameError::TooManyValues {
            count,
            max: MAX_VALUES,
        });
    }

    let body_len = count * VALUE_SIZE + CHECKSUM_SIZE;
    let mut body = [0u8; MAX_FRAME_SIZE - HEADER_SIZE];
    let body = &mut body[..body_len];
    let received = read_up_to(reader, body)?;
    if received < body_len {
        return Err(FrameError::Incomplete {
            expected: HEADER_SIZE + body_len,
            received: HEADER_SIZE + received,
        });
    }

    let (mut payload, trailer) = body.split_at(count * VALUE_SIZE);
    let computed = checksum(&head) ^ checksum(payload);
    if computed != trailer[0] {
        return Err(FrameError::ChecksumMismatch {
            computed,
            received: trailer[0],
        });
    }

    let values = (0..count).map(|_| payload.get_f32_le()).collect();
    Ok(Frame {
        header: u16::from_be_bytes([head[0], head[1]]),
        values,
    })
}

/// Fill `buf` from `reader`, stopping early only at end of stream or when a
/// read wait expires. Returns the number of bytes filled.
pub fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if is_timeout(&err) => break,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const SCENARIO_A: [u8; 8] = [0x00, 0x01, 0x01, 0x00, 0x00, 0x80, 0x3F, 0xBF];

    fn encode(header: u16, values: &[f32]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(header, values, &mut buf).unwrap();
        buf.to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Frame> {
        decode_frame(&mut Cursor::new(bytes))
    }

    #[test]
    fn encodes_single_value_frame() {
        assert_eq!(encode(1, &[1.0]), SCENARIO_A);
    }

    #[test]
    fn decodes_single_value_frame() {
        let frame = decode(&SCENARIO_A).unwrap();
        assert_eq!(frame.header, 1);
        assert_eq!(frame.values, vec![1.0]);
    }

    #[test]
    fn oversized_count_requests_resync() {
        let err = decode(&[0x00, 0x01, 0x0B, 0x00, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::TooManyValues { count: 11, max: 10 }
        ));
        assert!(err.requires_resync());
    }

    #[test]
    fn wrong_checksum_requests_resync() {
        let mut bytes = SCENARIO_A;
        bytes[7] = 0xBE;
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ChecksumMismatch {
                computed: 0xBF,
                received: 0xBE
            }
        ));
        assert!(err.requires_resync());
    }

    #[test]
    fn header_is_big_endian_values_little_endian() {
        let bytes = encode(0x1234, &[f32::from_bits(0x0A0B_0C0D)]);
        assert_eq!(&bytes[..3], &[0x12, 0x34, 0x01]);
        assert_eq!(&bytes[3..7], &[0x0D, 0x0C, 0x0B, 0x0A]);
        assert_eq!(bytes[7], checksum(&bytes[..7]));
    }

    #[test]
    fn roundtrip_is_bit_exact_for_every_length() {
        let pool = [
            0.0f32,
            -0.0,
            1.0,
            -1.5,
            f32::MIN_POSITIVE,
            f32::MAX,
            f32::MIN,
            f32::INFINITY,
            f32::NEG_INFINITY,
            f32::from_bits(0x7FC0_0001),
        ];
        for header in [0u16, 1, 0x00FF, 0xFF00, u16::MAX] {
            for count in 0..=MAX_VALUES {
                let values = &pool[..count];
                let bytes = encode(header, values);
                assert_eq!(bytes.len(), wire_size(count));

                let frame = decode(&bytes).unwrap();
                assert_eq!(frame.header, header);
                let sent: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
                let got: Vec<u32> = frame.values.iter().map(|v| v.to_bits()).collect();
                assert_eq!(sent, got);
            }
        }
    }

    #[test]
    fn encode_rejects_eleven_values_without_writing() {
        let mut buf = BytesMut::from(&b"prefix"[..]);
        let err = encode_frame(7, &[0.5; 11], &mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::TooManyValues { count: 11, max: 10 }
        ));
        assert_eq!(buf.as_ref(), b"prefix");
    }

    #[test]
    fn encode_appends_after_existing_bytes() {
        let mut buf = BytesMut::new();
        encode_frame(1, &[1.0], &mut buf).unwrap();
        encode_frame(2, &[], &mut buf).unwrap();
        assert_eq!(&buf[..8], &SCENARIO_A);
        // Checksum covers only the second frame.
        assert_eq!(&buf[8..], &[0x00, 0x02, 0x00, 0x02]);
    }

    #[test]
    fn every_truncation_is_incomplete() {
        let bytes = encode(0xBEEF, &[1.0, 2.0, 3.0]);
        for k in 0..bytes.len() {
            let err = decode(&bytes[..k]).unwrap_err();
            assert!(
                matches!(err, FrameError::Incomplete { received, .. } if received == k),
                "prefix of {k} bytes gave {err:?}"
            );
            assert!(!err.requires_resync());
        }
    }

    #[test]
    fn single_bit_flips_are_detected() {
        let bytes = encode(0x0102, &[3.25, -7.0]);
        for index in 0..bytes.len() {
            for bit in 0..8 {
                let mut corrupted = bytes.clone();
                corrupted[index] ^= 1 << bit;
                let result = decode(&corrupted);
                if index == 2 {
                    // A flipped count changes where the checksum is looked for.
                    assert!(result.is_err(), "count flip {bit} decoded");
                } else {
                    assert!(
                        matches!(result, Err(FrameError::ChecksumMismatch { .. })),
                        "flip of byte {index} bit {bit} gave {result:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn empty_frame_roundtrip() {
        let bytes = encode(0, &[]);
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x00]);
        let frame = decode(&bytes).unwrap();
        assert_eq!(frame, Frame::new(0, Vec::new()).unwrap());
    }

    #[test]
    fn frame_new_enforces_limit() {
        assert!(Frame::new(1, vec![0.0; MAX_VALUES]).is_ok());
        assert!(matches!(
            Frame::new(1, vec![0.0; MAX_VALUES + 1]),
            Err(FrameError::TooManyValues { .. })
        ));
    }

    #[test]
    fn frame_encode_matches_free_function() {
        let frame = Frame::new(1, vec![1.0]).unwrap();
        assert_eq!(frame.wire_size(), 8);
        assert_eq!(frame.encode().unwrap().as_ref(), &SCENARIO_A);
    }

    #[test]
    fn decodes_back_to_back_frames() {
        let mut wire = encode(1, &[1.0]);
        wire.extend(encode(2, &[2.0, 4.0]));
        let mut cursor = Cursor::new(wire);

        let f1 = decode_frame(&mut cursor).unwrap();
        let f2 = decode_frame(&mut cursor).unwrap();
        assert_eq!((f1.header, f1.values), (1, vec![1.0]));
        assert_eq!((f2.header, f2.values), (2, vec![2.0, 4.0]));
        assert!(matches!(
            decode_frame(&mut cursor),
            Err(FrameError::Incomplete { received: 0, .. })
        ));
    }

    #[test]
    fn timeout_ends_read_early() {
        struct Trickle {
            bytes: Vec<u8>,
            pos: usize,
        }

        impl Read for Trickle {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.pos >= self.bytes.len() {
                    return Err(std::io::Error::from(ErrorKind::TimedOut));
                }
                buf[0] = self.bytes[self.pos];
                self.pos += 1;
                Ok(1)
            }
        }

        let mut src = Trickle {
            bytes: SCENARIO_A[..5].to_vec(),
            pos: 0,
        };
        let err = decode_frame(&mut src).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Incomplete {
                expected: 8,
                received: 5
            }
        ));
    }

    #[test]
    fn hard_io_error_propagates() {
        struct Broken;

        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(ErrorKind::BrokenPipe))
            }
        }

        let err = decode_frame(&mut Broken).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn checksum_is_xor_fold() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&SCENARIO_A[..7]), 0xBF);
        assert_eq!(checksum(&SCENARIO_A), 0);
    }
}
