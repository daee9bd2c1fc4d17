//! Record header codecs.
//!
//! ## TLS (RFC 8446 Section 5.1)
//! ```text
//! struct {
//!     ContentType type;
//!     ProtocolVersion legacy_record_version;
//!     uint16 length;
//! } TLSPlaintext / TLSCiphertext header
//! ```
//!
//! ## DTLS 1.2 (RFC 6347 Section 4.1)
//! ```text
//! struct {
//!     ContentType type;
//!     ProtocolVersion version;
//!     uint16 epoch;
//!     uint48 sequence_number;
//!     uint16 length;
//! } DTLSPlaintext / DTLSCiphertext header
//! ```
//!
//! ## DTLS 1.3 unified header (RFC 9147 Section 4)
//! ```text
//!  0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+
//! |0|0|1|C|S|L|E E|
//! +-+-+-+-+-+-+-+-+
//! | Connection ID |   Legend:
//! | (if any,      |
//! /  length as    /   C   - Connection ID (CID) present
//! |  negotiated)  |   S   - Sequence number length
//! +-+-+-+-+-+-+-+-+   L   - Length present
//! |  8 or 16 bit  |   E   - Epoch
//! |Sequence Number|
//! +-+-+-+-+-+-+-+-+
//! | 16 bit Length |
//! | (if present)  |
//! +-+-+-+-+-+-+-+-+
//! ```

use nom::bytes::complete::take;
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err as NomErr, IResult};

use crate::buffer::Buf;
use crate::types::ContentType;
use crate::Error;

/// Unified header flag bits.
pub mod flags {
    pub const FIXED_BITS: u8 = 0b0010_0000;
    pub const FIXED_MASK: u8 = 0b1110_0000;
    pub const CID_BIT: u8 = 0b0001_0000;
    pub const SEQ_16BIT: u8 = 0b0000_1000;
    pub const LENGTH_BIT: u8 = 0b0000_0100;
    pub const EPOCH_MASK: u8 = 0b0000_0011;
}

fn tag_failure(input: &[u8]) -> NomErr<NomError<&[u8]>> {
    NomErr::Failure(NomError::new(input, ErrorKind::Tag))
}

/// Five byte TLS record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsRecordHeader {
    pub content_type: ContentType,
    pub version: [u8; 2],
    pub length: u16,
}

impl TlsRecordHeader {
    pub const LEN: usize = 5;

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, major) = be_u8(input)?;
        let (input, minor) = be_u8(input)?;
        let (input, length) = be_u16(input)?;
        Ok((
            input,
            TlsRecordHeader {
                content_type,
                version: [major, minor],
                length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.content_type.as_u8());
        output.extend_from_slice(&self.version);
        output.extend_from_slice(&self.length.to_be_bytes());
    }

    /// `type || version`, the part of the TLS 1.2 additional data the record carries.
    pub fn associated_data(&self) -> [u8; 3] {
        [self.content_type.as_u8(), self.version[0], self.version[1]]
    }
}

/// Thirteen byte DTLS 1.2 record header (also used by DTLS 1.3 plaintext records).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dtls12RecordHeader {
    pub content_type: ContentType,
    pub version: [u8; 2],
    pub epoch: u16,
    /// 48 bit sequence number.
    pub sequence: u64,
    pub length: u16,
}

impl Dtls12RecordHeader {
    pub const LEN: usize = 13;

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, major) = be_u8(input)?;
        let (input, minor) = be_u8(input)?;
        let (input, epoch) = be_u16(input)?;
        let (input, seq) = take(6usize)(input)?;
        let (input, length) = be_u16(input)?;

        let sequence = seq.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

        Ok((
            input,
            Dtls12RecordHeader {
                content_type,
                version: [major, minor],
                epoch,
                sequence,
                length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.content_type.as_u8());
        output.extend_from_slice(&self.version);
        output.extend_from_slice(&self.epoch.to_be_bytes());
        output.extend_from_slice(&self.sequence.to_be_bytes()[2..]);
        output.extend_from_slice(&self.length.to_be_bytes());
    }

    /// Epoch and sequence as the single 64 bit value used in the additional data.
    pub fn aad_sequence(&self) -> u64 {
        (u64::from(self.epoch) << 48) | (self.sequence & 0xffff_ffff_ffff)
    }

    pub fn associated_data(&self) -> [u8; 3] {
        [self.content_type.as_u8(), self.version[0], self.version[1]]
    }
}

/// DTLS 1.3 unified header.
///
/// `sequence` holds the on-wire (possibly still masked) low bits of the
/// record number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedHeader {
    pub epoch_bits: u8,
    pub connection_id: Vec<u8>,
    pub sequence: u16,
    pub seq_16bit: bool,
    pub length: Option<u16>,
}

impl UnifiedHeader {
    /// Header for an outgoing record: 16 bit sequence and explicit length.
    pub fn new(epoch: u64, sequence: u64, connection_id: &[u8], length: u16) -> Self {
        UnifiedHeader {
            epoch_bits: (epoch & u64::from(flags::EPOCH_MASK)) as u8,
            connection_id: connection_id.to_vec(),
            sequence: (sequence & 0xffff) as u16,
            seq_16bit: true,
            length: Some(length),
        }
    }

    /// Whether the first byte of a record starts a unified header.
    pub fn is_unified(first: u8) -> bool {
        first & flags::FIXED_MASK == flags::FIXED_BITS
    }

    /// Parse a unified header. `cid_len` is the negotiated length of
    /// connection IDs this endpoint receives.
    pub fn parse(input: &[u8], cid_len: usize) -> IResult<&[u8], Self> {
        let (rest, first) = be_u8(input)?;
        if !Self::is_unified(first) {
            return Err(tag_failure(input));
        }

        let (rest, connection_id) = if first & flags::CID_BIT != 0 {
            if cid_len == 0 {
                return Err(tag_failure(input));
            }
            take(cid_len)(rest)?
        } else {
            (rest, &[][..])
        };

        let seq_16bit = first & flags::SEQ_16BIT != 0;
        let (rest, sequence) = if seq_16bit {
            be_u16(rest)?
        } else {
            let (rest, seq) = be_u8(rest)?;
            (rest, u16::from(seq))
        };

        let (rest, length) = if first & flags::LENGTH_BIT != 0 {
            let (rest, len) = be_u16(rest)?;
            (rest, Some(len))
        } else {
            (rest, None)
        };

        Ok((
            rest,
            UnifiedHeader {
                epoch_bits: first & flags::EPOCH_MASK,
                connection_id: connection_id.to_vec(),
                sequence,
                seq_16bit,
                length,
            },
        ))
    }

    pub fn first_byte(&self) -> u8 {
        let mut first = flags::FIXED_BITS | (self.epoch_bits & flags::EPOCH_MASK);
        if !self.connection_id.is_empty() {
            first |= flags::CID_BIT;
        }
        if self.seq_16bit {
            first |= flags::SEQ_16BIT;
        }
        if self.length.is_some() {
            first |= flags::LENGTH_BIT;
        }
        first
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.first_byte());
        output.extend_from_slice(&self.connection_id);
        if self.seq_16bit {
            output.extend_from_slice(&self.sequence.to_be_bytes());
        } else {
            output.push(self.sequence as u8);
        }
        if let Some(length) = self.length {
            output.extend_from_slice(&length.to_be_bytes());
        }
    }

    /// Bytes of the record number on the wire.
    pub fn sequence_len(&self) -> usize {
        if self.seq_16bit {
            2
        } else {
            1
        }
    }

    /// Offset of the record number within the serialized header.
    pub fn sequence_offset(&self) -> usize {
        1 + self.connection_id.len()
    }

    pub fn header_len(&self) -> usize {
        let length = if self.length.is_some() { 2 } else { 0 };
        self.sequence_offset() + self.sequence_len() + length
    }
}

/// Convert a nom failure on a header into the crate error.
pub(crate) fn malformed<E>(_: NomErr<E>) -> Error {
    Error::MalformedHeader("truncated or invalid record header")
}
