//! QUIC variable-length integers (RFC 9000 Section 16) and packet number
//! truncation/expansion (RFC 9000 Appendix A.2, A.3).
//!
//! | 2MSB | Length | Usable bits | Range                 |
//! |------|--------|-------------|-----------------------|
//! | 00   | 1      | 6           | 0-63                  |
//! | 01   | 2      | 14          | 0-16383               |
//! | 10   | 4      | 30          | 0-1073741823          |
//! | 11   | 8      | 62          | 0-4611686018427387903 |

use nom::error::{Error as NomError, ErrorKind};
use nom::{Err as NomErr, IResult};

use crate::buffer::Buf;
use crate::Error;

/// Largest value a varint can hold (2^62 - 1).
pub const MAX_VARINT: u64 = (1 << 62) - 1;

/// Largest packet number (RFC 9000 Section 12.3).
pub const MAX_PACKET_NUMBER: u64 = MAX_VARINT;

/// Bytes needed to encode `value`. Values above [`MAX_VARINT`] report 8 and
/// are rejected when written.
pub const fn varint_len(value: u64) -> usize {
    if value <= 63 {
        1
    } else if value <= 16383 {
        2
    } else if value <= 1_073_741_823 {
        4
    } else {
        8
    }
}

/// Read a varint at `*pos`, advancing `pos` past it.
///
/// `pos` is left untouched on error.
pub fn read_varint(bytes: &[u8], pos: &mut usize) -> Result<u64, Error> {
    let input = bytes.get(*pos..).ok_or(Error::MalformedVarint)?;
    let (rest, value) = parse_varint(input).map_err(|_| Error::MalformedVarint)?;
    *pos += input.len() - rest.len();
    Ok(value)
}

/// nom parser for one varint.
pub fn parse_varint(input: &[u8]) -> IResult<&[u8], u64> {
    let Some(&first) = input.first() else {
        return Err(NomErr::Error(NomError::new(input, ErrorKind::Eof)));
    };
    let len = 1usize << (first >> 6);
    if input.len() < len {
        return Err(NomErr::Error(NomError::new(input, ErrorKind::Eof)));
    }

    let value = input[1..len]
        .iter()
        .fold(u64::from(first & 0x3f), |acc, b| (acc << 8) | u64::from(*b));

    Ok((&input[len..], value))
}

/// Append `value` in its shortest encoding. Returns the encoded length.
pub fn write_varint(value: u64, out: &mut Buf) -> Result<usize, Error> {
    if value > MAX_VARINT {
        return Err(Error::MalformedVarint);
    }
    let len = varint_len(value);
    let start = out.len();
    out.resize(start + len, 0);
    encode_varint_with_len(value, len, &mut out[start..])?;
    Ok(len)
}

/// Encode `value` using exactly `len` bytes (1, 2, 4 or 8) into the front of `out`.
///
/// Non-minimal encodings are legal and are how a Length field is reserved
/// before its value is known.
pub fn encode_varint_with_len(value: u64, len: usize, out: &mut [u8]) -> Result<(), Error> {
    let prefix: u8 = match len {
        1 => 0b00,
        2 => 0b01,
        4 => 0b10,
        8 => 0b11,
        _ => return Err(Error::MalformedVarint),
    };
    if value > MAX_VARINT || varint_len(value) > len || out.len() < len {
        return Err(Error::MalformedVarint);
    }

    let bytes = value.to_be_bytes();
    out[..len].copy_from_slice(&bytes[8 - len..]);
    out[0] |= prefix << 6;
    Ok(())
}

/// Truncate a packet number for the wire.
///
/// Returns the low bits of `full_pn` and how many bytes (1-4) carry them. The
/// length is the smallest whose range exceeds twice the number of
/// unacknowledged packets. With nothing acknowledged yet the whole space up to
/// `full_pn` counts as unacknowledged.
pub fn encode_packet_number(full_pn: u64, largest_acked: Option<u64>) -> Result<(u32, usize), Error> {
    if full_pn > MAX_PACKET_NUMBER {
        return Err(Error::MalformedVarint);
    }
    let num_unacked = match largest_acked {
        Some(acked) if acked < full_pn => full_pn - acked,
        Some(_) => return Err(Error::MalformedHeader("packet number not above largest acked")),
        None => full_pn + 1,
    };

    let twice = num_unacked.saturating_mul(2);
    let len = (1..=4usize)
        .find(|len| (1u64 << (8 * len)) > twice)
        .ok_or(Error::MalformedHeader("too many unacknowledged packets"))?;

    let mask = (1u64 << (8 * len)) - 1;
    Ok(((full_pn & mask) as u32, len))
}

/// Expand a truncated packet number to the candidate closest to
/// `largest + 1`.
///
/// `len` is the number of bytes the packet number was sent in (1-4). Without
/// any packet received yet the expected packet number is 0.
pub fn decode_packet_number(truncated: u64, len: usize, largest: Option<u64>) -> u64 {
    let bits = 8 * len.clamp(1, 4) as u32;
    let win = 1u64 << bits;
    let hwin = win / 2;
    let mask = win - 1;

    let expected = largest.map(|l| l.saturating_add(1)).unwrap_or(0);
    let candidate = (expected & !mask) | (truncated & mask);

    // Bounds kept as additions so nothing underflows near 0 or overflows near 2^62.
    if candidate.saturating_add(hwin) <= expected && candidate < (1u64 << 62) - win {
        candidate + win
    } else if candidate > expected.saturating_add(hwin) && candidate >= win {
        candidate - win
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn rfc9000_a1_vectors() {
        let mut pos = 0;
        let bytes = hex!("c2197c5eff14e88c");
        assert_eq!(read_varint(&bytes, &mut pos).unwrap(), 151_288_809_941_952_652);
        assert_eq!(pos, 8);

        let mut pos = 0;
        assert_eq!(read_varint(&hex!("9d7f3e7d"), &mut pos).unwrap(), 494_878_333);
        assert_eq!(pos, 4);

        let mut pos = 0;
        assert_eq!(read_varint(&hex!("7bbd"), &mut pos).unwrap(), 15293);
        assert_eq!(pos, 2);

        let mut pos = 0;
        assert_eq!(read_varint(&hex!("25"), &mut pos).unwrap(), 37);

        // Non-minimal two byte encoding of 37.
        let mut pos = 0;
        assert_eq!(read_varint(&hex!("4025"), &mut pos).unwrap(), 37);
        assert_eq!(pos, 2);
    }

    #[test]
    fn boundary_values_round_trip() {
        let cases = [
            (0, 1),
            (63, 1),
            (64, 2),
            (16383, 2),
            (16384, 4),
            (1_073_741_823, 4),
            (1_073_741_824, 8),
            (MAX_VARINT, 8),
        ];
        for (value, len) in cases {
            let mut out = Buf::new();
            assert_eq!(write_varint(value, &mut out).unwrap(), len, "{}", value);
            assert_eq!(varint_len(value), len);
            let mut pos = 0;
            assert_eq!(read_varint(&out, &mut pos).unwrap(), value);
            assert_eq!(pos, len);
        }
    }

    #[test]
    fn write_appends() {
        let mut out = Buf::from_slice(&[0xaa]);
        write_varint(15293, &mut out).unwrap();
        assert_eq!(&*out, &hex!("aa7bbd"));
    }

    #[test]
    fn rejects_too_large() {
        let mut out = Buf::new();
        assert_eq!(
            write_varint(MAX_VARINT + 1, &mut out),
            Err(Error::MalformedVarint)
        );
    }

    #[test]
    fn truncated_input() {
        let mut pos = 0;
        assert_eq!(read_varint(&[], &mut pos), Err(Error::MalformedVarint));
        assert_eq!(read_varint(&hex!("40"), &mut pos), Err(Error::MalformedVarint));
        assert_eq!(read_varint(&hex!("c2197c"), &mut pos), Err(Error::MalformedVarint));
        assert_eq!(pos, 0);

        let mut pos = 5;
        assert_eq!(read_varint(&hex!("00"), &mut pos), Err(Error::MalformedVarint));
    }

    #[test]
    fn read_advances_through_sequence() {
        let bytes = hex!("257bbd9d7f3e7d");
        let mut pos = 0;
        assert_eq!(read_varint(&bytes, &mut pos).unwrap(), 37);
        assert_eq!(read_varint(&bytes, &mut pos).unwrap(), 15293);
        assert_eq!(read_varint(&bytes, &mut pos).unwrap(), 494_878_333);
        assert_eq!(pos, bytes.len());
    }

    #[test]
    fn fixed_length_encoding() {
        let mut out = [0u8; 2];
        encode_varint_with_len(37, 2, &mut out).unwrap();
        assert_eq!(out, hex!("4025"));

        assert!(encode_varint_with_len(16384, 2, &mut out).is_err());
        assert!(encode_varint_with_len(1, 3, &mut out).is_err());
        assert!(encode_varint_with_len(1, 4, &mut out).is_err());
    }

    #[test]
    fn rfc9000_a2_encode() {
        // 0xac5c02 with 0xabe8b3 acknowledged needs 16 bits.
        assert_eq!(
            encode_packet_number(0xac5c02, Some(0xabe8b3)).unwrap(),
            (0x5c02, 2)
        );
        // 0xace8fe needs 24 bits.
        assert_eq!(
            encode_packet_number(0xace8fe, Some(0xabe8b3)).unwrap(),
            (0xace8fe, 3)
        );
    }

    #[test]
    fn encode_length_boundaries() {
        // 2 * num_unacked must stay below 2^(8*len).
        assert_eq!(encode_packet_number(127, Some(0)).unwrap().1, 1);
        assert_eq!(encode_packet_number(128, Some(0)).unwrap().1, 2);
        assert_eq!(encode_packet_number(32_767, Some(0)).unwrap().1, 2);
        assert_eq!(encode_packet_number(32_768, Some(0)).unwrap().1, 3);
        assert_eq!(encode_packet_number((1 << 23) - 1, Some(0)).unwrap().1, 3);
        assert_eq!(encode_packet_number(1 << 23, Some(0)).unwrap().1, 4);
        assert!(encode_packet_number(1 << 31, Some(0)).is_err());

        // Nothing acknowledged.
        assert_eq!(encode_packet_number(0, None).unwrap(), (0, 1));
        assert_eq!(encode_packet_number(126, None).unwrap(), (126, 1));
        assert_eq!(encode_packet_number(127, None).unwrap(), (127, 2));

        assert!(encode_packet_number(5, Some(5)).is_err());
        assert!(encode_packet_number(MAX_PACKET_NUMBER + 1, None).is_err());
    }

    #[test]
    fn rfc9000_a3_decode() {
        assert_eq!(decode_packet_number(0x9b32, 2, Some(0xa82f30ea)), 0xa82f9b32);
    }

    #[test]
    fn decode_wraps_forward_and_backward() {
        // Expected 0x100, truncated 0x01 is closer as 0x101.
        assert_eq!(decode_packet_number(0x01, 1, Some(0xff)), 0x101);
        // Expected 0x101, truncated 0xff is closer as 0xff (behind).
        assert_eq!(decode_packet_number(0xff, 1, Some(0x100)), 0xff);
        // Window edge: exactly half a window ahead stays put.
        assert_eq!(decode_packet_number(0x80, 1, Some(0xff)), 0x180);
        assert_eq!(decode_packet_number(0x81, 1, Some(0xff)), 0x81);
    }

    #[test]
    fn decode_near_zero_and_top() {
        assert_eq!(decode_packet_number(0, 1, None), 0);
        assert_eq!(decode_packet_number(0xff, 1, None), 0xff);
        assert_eq!(decode_packet_number(0xfe, 1, Some(0)), 0xfe);

        // Never expands beyond the packet number space.
        let largest = MAX_PACKET_NUMBER - 1;
        let pn = decode_packet_number(0x00, 1, Some(largest));
        assert!(pn <= MAX_PACKET_NUMBER);
    }

    #[test]
    fn encode_decode_agree_across_lengths() {
        for (full, acked) in [
            (10u64, Some(2u64)),
            (300, Some(250)),
            (0x1_0000_0005, Some(0x1_0000_0001)),
            (0xace8fe, Some(0xabe8b3)),
            (70_000, Some(10)),
        ] {
            let (truncated, len) = encode_packet_number(full, acked).unwrap();
            // The peer has seen at least the acknowledged packet.
            assert_eq!(decode_packet_number(truncated as u64, len, acked), full);
        }
    }
}
