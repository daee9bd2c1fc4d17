//! QUIC packet protection (RFC 9001 Section 5).
//!
//! ```text
//! Long Header Packet {
//!   Header Form (1) = 1,
//!   Fixed Bit (1) = 1,
//!   Long Packet Type (2),
//!   Reserved Bits (2),          protected
//!   Packet Number Length (2),   protected
//!   Version (32),
//!   Destination Connection ID Length (8),
//!   Destination Connection ID (0..160),
//!   Source Connection ID Length (8),
//!   Source Connection ID (0..160),
//!   [Token Length (i), Token (..)]   Initial only
//!   Length (i),
//!   Packet Number (8..32),      protected
//!   Packet Payload (..),        AEAD
//! }
//!
//! 1-RTT Packet {
//!   Header Form (1) = 0,
//!   Fixed Bit (1) = 1,
//!   Spin Bit (1),
//!   Reserved Bits (2),          protected
//!   Key Phase (1),              protected
//!   Packet Number Length (2),   protected
//!   Destination Connection ID (0..160),
//!   Packet Number (8..32),      protected
//!   Packet Payload (..),        AEAD
//! }
//! ```
//!
//! Sealing writes the header, AEAD-seals the payload with the header as
//! associated data and then applies header protection. Opening goes the other
//! way in two steps, so a receiver can pick keys by key phase between them.

use std::ops::Range;

use nom::bytes::complete::take;
use nom::error::Error as NomError;
use nom::number::complete::{be_u32, be_u8};
use nom::{Err as NomErr, IResult};
use subtle::ConstantTimeEq;

use crate::buffer::Buf;
use crate::crypto::{AeadAlgorithm, CryptoProvider, Nonce};
use crate::header_protection::{HeaderProtector, MAX_PN_LEN, SAMPLE_LEN};
use crate::record::RecordProtector;
use crate::types::{Epoch, QuicVersion};
use crate::varint::{
    decode_packet_number, encode_packet_number, read_varint, write_varint, MAX_PACKET_NUMBER,
};
use crate::Error;

/// Longest connection ID in QUIC v1 and v2.
pub const MAX_CID_LEN: usize = 20;

/// Length of the Retry integrity tag.
pub const RETRY_TAG_LEN: usize = 16;

const LONG_FORM_BIT: u8 = 0x80;
const FIXED_BIT: u8 = 0x40;
const SPIN_BIT: u8 = 0x20;
const KEY_PHASE_BIT: u8 = 0x04;
const LONG_RESERVED_BITS: u8 = 0x0c;
const SHORT_RESERVED_BITS: u8 = 0x18;
const PN_LEN_BITS: u8 = 0x03;

/// Long header packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongPacketType {
    Initial,
    ZeroRtt,
    Handshake,
    Retry,
}

impl LongPacketType {
    /// The two type bits for `version` (QUIC v2 rotates them, RFC 9369 Section 3.2).
    pub fn to_bits(self, version: QuicVersion) -> u8 {
        let v1 = match self {
            LongPacketType::Initial => 0,
            LongPacketType::ZeroRtt => 1,
            LongPacketType::Handshake => 2,
            LongPacketType::Retry => 3,
        };
        match version {
            QuicVersion::V1 => v1,
            QuicVersion::V2 => (v1 + 1) & 0x03,
        }
    }

    pub fn from_bits(bits: u8, version: QuicVersion) -> Self {
        let v1 = match version {
            QuicVersion::V1 => bits & 0x03,
            QuicVersion::V2 => bits.wrapping_sub(1) & 0x03,
        };
        match v1 {
            0 => LongPacketType::Initial,
            1 => LongPacketType::ZeroRtt,
            2 => LongPacketType::Handshake,
            _ => LongPacketType::Retry,
        }
    }

    /// Epoch whose keys protect this packet type. Retry packets are not protected.
    pub fn epoch(self) -> Option<Epoch> {
        match self {
            LongPacketType::Initial => Some(Epoch::Initial),
            LongPacketType::ZeroRtt => Some(Epoch::Early),
            LongPacketType::Handshake => Some(Epoch::Handshake),
            LongPacketType::Retry => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongHeader {
    pub packet_type: LongPacketType,
    pub version: QuicVersion,
    pub dcid: Vec<u8>,
    pub scid: Vec<u8>,
    /// Initial packets only.
    pub token: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortHeader {
    pub dcid: Vec<u8>,
    pub spin: bool,
    pub key_phase: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketHeader {
    Long(LongHeader),
    Short(ShortHeader),
}

impl PacketHeader {
    pub fn epoch(&self) -> Option<Epoch> {
        match self {
            PacketHeader::Long(long) => long.packet_type.epoch(),
            PacketHeader::Short(_) => Some(Epoch::Application),
        }
    }

    pub fn dcid(&self) -> &[u8] {
        match self {
            PacketHeader::Long(long) => &long.dcid,
            PacketHeader::Short(short) => &short.dcid,
        }
    }

    fn first_byte(&self, pn_len: usize) -> u8 {
        let pn_bits = (pn_len as u8 - 1) & PN_LEN_BITS;
        match self {
            PacketHeader::Long(long) => {
                LONG_FORM_BIT | FIXED_BIT | (long.packet_type.to_bits(long.version) << 4) | pn_bits
            }
            PacketHeader::Short(short) => {
                let mut first = FIXED_BIT | pn_bits;
                if short.spin {
                    first |= SPIN_BIT;
                }
                if short.key_phase {
                    first |= KEY_PHASE_BIT;
                }
                first
            }
        }
    }
}

/// A packet header whose protection has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnprotectedHeader {
    pub header: PacketHeader,
    pub packet_number: u64,
    pub pn_len: usize,
    /// Header bytes including the packet number; the AEAD associated data.
    pub header_len: usize,
    /// Bytes of the datagram this packet occupies. Coalesced packets follow.
    pub packet_len: usize,
    first: u8,
}

impl UnprotectedHeader {
    /// Key phase bit of a 1-RTT packet, `false` for long headers.
    pub fn key_phase(&self) -> bool {
        match &self.header {
            PacketHeader::Short(short) => short.key_phase,
            PacketHeader::Long(_) => false,
        }
    }
}

/// A protected packet whose public header fields have been parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPacket {
    pub header: PacketHeader,
    pub pn_offset: usize,
    pub packet_len: usize,
}

impl ProtectedPacket {
    /// Parse the parts of a header that header protection leaves readable.
    ///
    /// `short_dcid_len` is the length of the connection IDs this endpoint
    /// issued; short headers do not carry it.
    pub fn parse(packet: &[u8], short_dcid_len: usize) -> Result<Self, Error> {
        let first = *packet.first().ok_or(Error::MalformedHeader("empty packet"))?;
        if first & FIXED_BIT == 0 {
            return Err(Error::MalformedHeader("fixed bit is not set"));
        }

        if first & LONG_FORM_BIT == 0 {
            let pn_offset = 1 + short_dcid_len;
            let dcid = packet
                .get(1..pn_offset)
                .ok_or(Error::MalformedHeader("truncated short header"))?;
            return Ok(ProtectedPacket {
                header: PacketHeader::Short(ShortHeader {
                    dcid: dcid.to_vec(),
                    spin: first & SPIN_BIT != 0,
                    key_phase: false,
                }),
                pn_offset,
                packet_len: packet.len(),
            });
        }

        let (rest, (version, dcid, scid)) =
            parse_long_prefix(&packet[1..]).map_err(truncated_long_header)?;
        let version = QuicVersion::from_u32(version)
            .ok_or(Error::MalformedHeader("unsupported QUIC version"))?;
        let packet_type = LongPacketType::from_bits(first >> 4, version);

        let mut pos = packet.len() - rest.len();
        let token = match packet_type {
            LongPacketType::Initial => {
                let token_len = read_varint(packet, &mut pos)? as usize;
                let token = packet
                    .get(pos..pos.saturating_add(token_len))
                    .ok_or(Error::MalformedHeader("truncated token"))?;
                pos += token_len;
                token.to_vec()
            }
            LongPacketType::Retry => {
                return Err(Error::MalformedHeader("Retry packets carry no packet protection"));
            }
            _ => Vec::new(),
        };

        let length = read_varint(packet, &mut pos)? as usize;
        let packet_len = pos
            .checked_add(length)
            .filter(|end| *end <= packet.len())
            .ok_or(Error::MalformedHeader("Length exceeds datagram"))?;

        Ok(ProtectedPacket {
            header: PacketHeader::Long(LongHeader {
                packet_type,
                version,
                dcid: dcid.to_vec(),
                scid: scid.to_vec(),
                token,
            }),
            pn_offset: pos,
            packet_len,
        })
    }

    /// Remove header protection and recover the full packet number.
    ///
    /// `largest_received` is the largest packet number successfully opened
    /// in this packet number space so far.
    pub fn unprotect(
        self,
        packet: &mut [u8],
        hp: &HeaderProtector,
        largest_received: Option<u64>,
    ) -> Result<UnprotectedHeader, Error> {
        let packet = packet
            .get_mut(..self.packet_len)
            .ok_or(Error::MalformedHeader("packet shorter than its header"))?;
        let pn_len = hp.unprotect_quic(packet, self.pn_offset)?;

        let truncated = packet[self.pn_offset..self.pn_offset + pn_len]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        let packet_number = decode_packet_number(truncated, pn_len, largest_received);
        if packet_number > MAX_PACKET_NUMBER {
            return Err(Error::MalformedHeader("packet number out of range"));
        }

        let first = packet[0];
        let mut header = self.header;
        if let PacketHeader::Short(short) = &mut header {
            short.key_phase = first & KEY_PHASE_BIT != 0;
        }

        trace!(
            "Unprotected {:?} packet {} ({} byte packet number)",
            header.epoch(),
            packet_number,
            pn_len
        );

        Ok(UnprotectedHeader {
            header,
            packet_number,
            pn_len,
            header_len: self.pn_offset + pn_len,
            packet_len: self.packet_len,
            first,
        })
    }
}

fn parse_long_prefix(input: &[u8]) -> IResult<&[u8], (u32, &[u8], &[u8])> {
    let (input, version) = be_u32(input)?;
    let (input, dcid_len) = be_u8(input)?;
    let (input, dcid) = take(dcid_len)(input)?;
    let (input, scid_len) = be_u8(input)?;
    let (input, scid) = take(scid_len)(input)?;
    Ok((input, (version, dcid, scid)))
}

fn truncated_long_header(_: NomErr<NomError<&[u8]>>) -> Error {
    Error::MalformedHeader("truncated long header")
}

/// Protect one packet and append it to `out`.
///
/// The payload is padded with PADDING frames when it is too short to sample.
/// Returns the length of the packet written.
pub fn seal_packet(
    header: &PacketHeader,
    packet_number: u64,
    largest_acked: Option<u64>,
    payload: &[u8],
    record: &mut RecordProtector,
    hp: &HeaderProtector,
    out: &mut Buf,
) -> Result<usize, Error> {
    match header {
        PacketHeader::Long(long) => {
            if long.packet_type == LongPacketType::Retry {
                return Err(Error::MalformedHeader("Retry packets carry no packet protection"));
            }
            check_cid(&long.dcid)?;
            check_cid(&long.scid)?;
        }
        PacketHeader::Short(short) => check_cid(&short.dcid)?,
    }
    let (truncated, pn_len) = encode_packet_number(packet_number, largest_acked)?;

    let mut body = Buf::from_slice(payload);
    let min_body = (MAX_PN_LEN + SAMPLE_LEN).saturating_sub(pn_len + record.suite().tag_len);
    if body.len() < min_body {
        body.resize(min_body, 0);
    }

    let start = out.len();
    out.push(header.first_byte(pn_len));
    match header {
        PacketHeader::Long(long) => {
            out.extend_from_slice(&long.version.as_u32().to_be_bytes());
            out.push(long.dcid.len() as u8);
            out.extend_from_slice(&long.dcid);
            out.push(long.scid.len() as u8);
            out.extend_from_slice(&long.scid);
            if long.packet_type == LongPacketType::Initial {
                write_varint(long.token.len() as u64, out)?;
                out.extend_from_slice(&long.token);
            }
            let length = pn_len + record.sealed_len(body.len());
            if let Err(e) = write_varint(length as u64, out) {
                out.truncate(start);
                return Err(e);
            }
        }
        PacketHeader::Short(short) => out.extend_from_slice(&short.dcid),
    }

    let pn_offset = out.len() - start;
    out.extend_from_slice(&truncated.to_be_bytes()[4 - pn_len..]);

    let aad = out[start..].to_vec();
    if let Err(e) = record.seal(packet_number, &aad, &mut body) {
        out.truncate(start);
        return Err(e);
    }
    out.extend_from_slice(&body);

    hp.protect_quic(&mut out[start..], pn_offset, pn_len)?;

    trace!(
        "Sealed {:?} packet {} ({} bytes)",
        header.epoch(),
        packet_number,
        out.len() - start
    );
    Ok(out.len() - start)
}

fn check_cid(cid: &[u8]) -> Result<(), Error> {
    if cid.len() > MAX_CID_LEN {
        return Err(Error::MalformedHeader("connection ID longer than 20 bytes"));
    }
    Ok(())
}

/// Open the payload of a packet whose header was unprotected.
///
/// Returns the range of `packet` holding the frames. Reserved bits are only
/// checked once the packet authenticated (RFC 9000 Section 17.2).
pub fn open_payload(
    packet: &mut [u8],
    header: &UnprotectedHeader,
    record: &mut RecordProtector,
) -> Result<Range<usize>, Error> {
    let packet = packet
        .get_mut(..header.packet_len)
        .ok_or(Error::MalformedHeader("packet shorter than its header"))?;
    let (aad, body) = packet.split_at_mut(header.header_len);

    let range = record.open(header.packet_number, aad, body)?;

    let reserved = match header.header {
        PacketHeader::Long(_) => LONG_RESERVED_BITS,
        PacketHeader::Short(_) => SHORT_RESERVED_BITS,
    };
    if header.first & reserved != 0 {
        return Err(Error::MalformedHeader("reserved bits are set"));
    }
    if range.is_empty() {
        return Err(Error::MalformedHeader("packet carries no frames"));
    }

    Ok(header.header_len + range.start..header.header_len + range.end)
}

/// Remove header protection and open the payload in one step.
pub fn open_packet(
    packet: &mut [u8],
    short_dcid_len: usize,
    hp: &HeaderProtector,
    record: &mut RecordProtector,
    largest_received: Option<u64>,
) -> Result<(UnprotectedHeader, Range<usize>), Error> {
    let header =
        ProtectedPacket::parse(packet, short_dcid_len)?.unprotect(packet, hp, largest_received)?;
    let range = open_payload(packet, &header, record)?;
    Ok((header, range))
}

/// Retry integrity tag (RFC 9001 Section 5.8).
///
/// AES-128-GCM with a fixed key over an empty plaintext; the associated data
/// is the Retry pseudo-packet `odcid_len || odcid || retry_without_tag`.
pub fn retry_integrity_tag(
    provider: &CryptoProvider,
    version: QuicVersion,
    original_dcid: &[u8],
    retry_without_tag: &[u8],
) -> Result<[u8; RETRY_TAG_LEN], Error> {
    check_cid(original_dcid)?;
    let (key, nonce) = version.retry_integrity_key();

    let mut pseudo = Vec::with_capacity(1 + original_dcid.len() + retry_without_tag.len());
    pseudo.push(original_dcid.len() as u8);
    pseudo.extend_from_slice(original_dcid);
    pseudo.extend_from_slice(retry_without_tag);

    let mut cipher = provider
        .find_aead(AeadAlgorithm::Aes128Gcm)
        .ok_or_else(|| Error::ConfigError("Retry needs AES-128-GCM in the provider".to_string()))?
        .create_cipher(key)
        .map_err(Error::CryptoError)?;

    let mut tag = Buf::new();
    cipher
        .encrypt(&mut tag, &pseudo, Nonce(*nonce))
        .map_err(Error::CryptoError)?;

    tag[..]
        .try_into()
        .map_err(|_| Error::CryptoError(format!("Retry tag has {} bytes", tag.len())))
}

/// Build a Retry packet, integrity tag included.
pub fn build_retry(
    provider: &CryptoProvider,
    version: QuicVersion,
    dcid: &[u8],
    scid: &[u8],
    token: &[u8],
    original_dcid: &[u8],
) -> Result<Buf, Error> {
    check_cid(dcid)?;
    check_cid(scid)?;

    let mut unused = [0u8; 1];
    provider
        .secure_random
        .fill(&mut unused)
        .map_err(Error::CryptoError)?;

    let mut out = Buf::new();
    out.push(
        LONG_FORM_BIT
            | FIXED_BIT
            | (LongPacketType::Retry.to_bits(version) << 4)
            | (unused[0] & 0x0f),
    );
    out.extend_from_slice(&version.as_u32().to_be_bytes());
    out.push(dcid.len() as u8);
    out.extend_from_slice(dcid);
    out.push(scid.len() as u8);
    out.extend_from_slice(scid);
    out.extend_from_slice(token);

    let tag = retry_integrity_tag(provider, version, original_dcid, &out)?;
    out.extend_from_slice(&tag);
    Ok(out)
}

/// Check the integrity tag of a received Retry packet.
pub fn verify_retry(
    provider: &CryptoProvider,
    version: QuicVersion,
    original_dcid: &[u8],
    retry: &[u8],
) -> Result<(), Error> {
    if retry.len() < 1 + 4 + 2 + RETRY_TAG_LEN {
        return Err(Error::MalformedHeader("truncated Retry packet"));
    }
    let (without_tag, received) = retry.split_at(retry.len() - RETRY_TAG_LEN);
    let expected = retry_integrity_tag(provider, version, original_dcid, without_tag)?;
    if !bool::from(expected[..].ct_eq(received)) {
        return Err(Error::AuthenticationFailed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{rust_crypto, CipherSuite, HeaderProtectionAlgorithm};
    use crate::key_schedule::KeySchedule;
    use crate::secret::SecretStore;
    use crate::types::{ProtocolVersion, Purpose, Role, SecretId};
    use hex_literal::hex;

    const RFC9001_RETRY: [u8; 36] =
        hex!("ff000000010008f067a5502a4262b5746f6b656e04a265ba2eff4d829058fb3f0f2496ba");
    const ODCID: [u8; 8] = hex!("8394c8f03e515708");

    fn initial_keys(
        version: QuicVersion,
        role: Role,
    ) -> (RecordProtector, HeaderProtector) {
        let provider = rust_crypto::default_provider();
        let mut ks = KeySchedule::new(
            provider.clone(),
            CipherSuite::TLS_AES_128_GCM_SHA256,
            ProtocolVersion::Quic(version),
        )
        .unwrap();
        let mut store = SecretStore::new();
        ks.derive(&mut store, role, Epoch::Initial, &ODCID).unwrap();

        let suite = ks.suite_for_epoch(Epoch::Initial).unwrap();
        let record = RecordProtector::from_store(
            &provider,
            suite,
            &store,
            role,
            Epoch::Initial,
            crate::config::DEFAULT_MAX_CIPHERTEXT_LEN,
        )
        .unwrap();
        let hp_key = store
            .get(SecretId::new(role, Epoch::Initial, Purpose::HeaderProtection))
            .unwrap();
        let hp = HeaderProtector::new(
            &provider,
            HeaderProtectionAlgorithm::Aes128Ecb,
            hp_key.as_bytes(),
        )
        .unwrap();
        (record, hp)
    }

    #[test]
    fn long_packet_type_bits() {
        assert_eq!(LongPacketType::Initial.to_bits(QuicVersion::V1), 0);
        assert_eq!(LongPacketType::Retry.to_bits(QuicVersion::V1), 3);
        assert_eq!(LongPacketType::Initial.to_bits(QuicVersion::V2), 1);
        assert_eq!(LongPacketType::ZeroRtt.to_bits(QuicVersion::V2), 2);
        assert_eq!(LongPacketType::Handshake.to_bits(QuicVersion::V2), 3);
        assert_eq!(LongPacketType::Retry.to_bits(QuicVersion::V2), 0);

        for version in [QuicVersion::V1, QuicVersion::V2] {
            for t in [
                LongPacketType::Initial,
                LongPacketType::ZeroRtt,
                LongPacketType::Handshake,
                LongPacketType::Retry,
            ] {
                assert_eq!(LongPacketType::from_bits(t.to_bits(version), version), t);
            }
        }
    }

    #[test]
    fn rfc9001_retry_tag() {
        let provider = rust_crypto::default_provider();
        let (without_tag, tag) = RFC9001_RETRY.split_at(RFC9001_RETRY.len() - RETRY_TAG_LEN);

        let computed = retry_integrity_tag(&provider, QuicVersion::V1, &ODCID, without_tag).unwrap();
        assert_eq!(&computed[..], tag);
        verify_retry(&provider, QuicVersion::V1, &ODCID, &RFC9001_RETRY).unwrap();

        let mut tampered = RFC9001_RETRY;
        tampered[20] ^= 1;
        assert_eq!(
            verify_retry(&provider, QuicVersion::V1, &ODCID, &tampered),
            Err(Error::AuthenticationFailed)
        );
        // Tag is bound to the original destination connection ID.
        assert_eq!(
            verify_retry(&provider, QuicVersion::V1, &ODCID[..7], &RFC9001_RETRY),
            Err(Error::AuthenticationFailed)
        );
        // v2 uses different keys.
        assert_eq!(
            verify_retry(&provider, QuicVersion::V2, &ODCID, &RFC9001_RETRY),
            Err(Error::AuthenticationFailed)
        );
    }

    #[test]
    fn built_retry_verifies() {
        let provider = rust_crypto::default_provider();
        for version in [QuicVersion::V1, QuicVersion::V2] {
            let retry = build_retry(
                &provider,
                version,
                &[],
                &hex!("f067a5502a4262b5"),
                b"token",
                &ODCID,
            )
            .unwrap();
            assert_eq!(retry[0] & 0xf0, 0xc0 | (LongPacketType::Retry.to_bits(version) << 4));
            assert_eq!(&retry[1..5], &version.as_u32().to_be_bytes());
            verify_retry(&provider, version, &ODCID, &retry).unwrap();
        }
        assert!(verify_retry(&provider, QuicVersion::V1, &ODCID, &[0xff; 20]).is_err());
    }

    #[test]
    fn rfc9001_chacha20_short_packet() {
        // RFC 9001 A.5
        let provider = rust_crypto::default_provider();
        let suite = CipherSuite::TLS_CHACHA20_POLY1305_SHA256
            .descriptor()
            .unwrap();
        let mut record = RecordProtector::new(
            &provider,
            suite,
            &hex!("c6d98ff3441c3fe1b2182094f69caa2ed4b716b65488960a7a984979fb23e1c8"),
            &hex!("e0459b3474bdd0e44a41c144"),
            None,
            crate::config::DEFAULT_MAX_CIPHERTEXT_LEN,
        )
        .unwrap();
        let hp = HeaderProtector::new(
            &provider,
            HeaderProtectionAlgorithm::ChaCha20,
            &hex!("25a282b9e82f06f21f488917a4fc8f1b73573685608597d0efcb076b0ab7a7a4"),
        )
        .unwrap();

        let pn = 654_360_564;
        let header = PacketHeader::Short(ShortHeader {
            dcid: Vec::new(),
            spin: false,
            key_phase: false,
        });
        let mut out = Buf::new();
        let len = seal_packet(
            &header,
            pn,
            Some(pn - 40_000),
            &[0x01],
            &mut record,
            &hp,
            &mut out,
        )
        .unwrap();
        assert_eq!(len, 21);
        assert_eq!(&*out, &hex!("4cfe4189655e5cd55c41f69080575d7999c25a5bfb"));

        let mut packet = out.to_vec();
        let (opened, range) =
            open_packet(&mut packet, 0, &hp, &mut record, Some(pn - 1)).unwrap();
        assert_eq!(opened.packet_number, pn);
        assert_eq!(opened.pn_len, 3);
        assert_eq!(opened.header_len, 4);
        assert!(!opened.key_phase());
        assert_eq!(&packet[range], &[0x01]);
    }

    #[test]
    fn initial_round_trip_both_versions() {
        for version in [QuicVersion::V1, QuicVersion::V2] {
            let (mut sender, hp) = initial_keys(version, Role::Client);
            let (mut receiver, _) = initial_keys(version, Role::Client);

            let header = PacketHeader::Long(LongHeader {
                packet_type: LongPacketType::Initial,
                version,
                dcid: ODCID.to_vec(),
                scid: Vec::new(),
                token: b"tok".to_vec(),
            });
            let crypto_frame = hex!("060040f1010000ed0303ebf8fa56f12939b9584a3896472ec40bb863cfd3e868");

            let mut datagram = Buf::new();
            let first = seal_packet(&header, 2, None, &crypto_frame, &mut sender, &hp, &mut datagram)
                .unwrap();
            // A second, coalesced packet.
            seal_packet(&header, 3, None, &[0x01], &mut sender, &hp, &mut datagram).unwrap();
            assert_eq!(datagram[1..5], version.as_u32().to_be_bytes());

            let mut bytes = datagram.to_vec();
            let (opened, range) = open_packet(&mut bytes, 0, &hp, &mut receiver, None).unwrap();
            assert_eq!(opened.packet_len, first);
            assert_eq!(opened.packet_number, 2);
            assert_eq!(opened.header, header);
            assert_eq!(&bytes[range], &crypto_frame);

            let rest = &mut bytes[first..];
            let (opened, range) = open_packet(rest, 0, &hp, &mut receiver, Some(2)).unwrap();
            assert_eq!(opened.packet_number, 3);
            // Padded so the header protection sample fits.
            assert_eq!(rest[range][0], 0x01);
        }
    }

    #[test]
    fn version_mismatch_fails() {
        let (mut sender, hp) = initial_keys(QuicVersion::V1, Role::Server);
        let (mut receiver, hp_v2) = initial_keys(QuicVersion::V2, Role::Server);
        let header = PacketHeader::Long(LongHeader {
            packet_type: LongPacketType::Handshake,
            version: QuicVersion::V1,
            dcid: Vec::new(),
            scid: ODCID.to_vec(),
            token: Vec::new(),
        });
        let mut out = Buf::new();
        seal_packet(&header, 0, None, &[0x01; 30], &mut sender, &hp, &mut out).unwrap();

        let mut bytes = out.to_vec();
        assert!(open_packet(&mut bytes, 0, &hp_v2, &mut receiver, None).is_err());
    }

    #[test]
    fn tampered_packet_fails_authentication() {
        let (mut sender, hp) = initial_keys(QuicVersion::V1, Role::Client);
        let header = PacketHeader::Long(LongHeader {
            packet_type: LongPacketType::Initial,
            version: QuicVersion::V1,
            dcid: ODCID.to_vec(),
            scid: Vec::new(),
            token: Vec::new(),
        });
        let mut out = Buf::new();
        seal_packet(&header, 0, None, &[0x01; 40], &mut sender, &hp, &mut out).unwrap();

        let last = out.len() - 1;
        let mut bytes = out.to_vec();
        bytes[last] ^= 0x10;
        let (mut receiver, _) = initial_keys(QuicVersion::V1, Role::Client);
        assert_eq!(
            open_packet(&mut bytes, 0, &hp, &mut receiver, None).map(|_| ()),
            Err(Error::AuthenticationFailed)
        );
    }

    #[test]
    fn malformed_headers() {
        // Fixed bit clear.
        assert!(ProtectedPacket::parse(&[0x80, 0, 0, 0, 1], 0).is_err());
        // Unknown version.
        assert_eq!(
            ProtectedPacket::parse(&hex!("c0ff00001d0000"), 0),
            Err(Error::MalformedHeader("unsupported QUIC version"))
        );
        // Truncated connection ID.
        assert!(ProtectedPacket::parse(&hex!("c00000000108aabb"), 0).is_err());
        // Length beyond the datagram.
        assert_eq!(
            ProtectedPacket::parse(&hex!("e00000000100004005aabb"), 0),
            Err(Error::MalformedHeader("Length exceeds datagram"))
        );
        // Short header shorter than the connection ID.
        assert!(ProtectedPacket::parse(&[0x40, 1, 2], 8).is_err());
        assert!(ProtectedPacket::parse(&[], 0).is_err());
        // Retry has no protected payload.
        assert!(ProtectedPacket::parse(&RFC9001_RETRY, 0).is_err());
    }

    #[test]
    fn reserved_bits_rejected_after_authentication() {
        let provider = rust_crypto::default_provider();
        let suite = CipherSuite::TLS_AES_128_GCM_SHA256.descriptor().unwrap();
        let max = crate::config::DEFAULT_MAX_CIPHERTEXT_LEN;
        let mut sender = RecordProtector::new(&provider, suite, &[1; 16], &[2; 12], None, max).unwrap();
        let mut receiver =
            RecordProtector::new(&provider, suite, &[1; 16], &[2; 12], None, max).unwrap();
        let hp = HeaderProtector::new(&provider, HeaderProtectionAlgorithm::Aes128Ecb, &[3; 16])
            .unwrap();

        // Hand-build a short packet with a reserved bit set and seal it
        // the way seal_packet does.
        let first = FIXED_BIT | 0x08;
        let mut packet = vec![first, 0x00];
        let mut body = Buf::from_slice(&[0x01; 20]);
        sender.seal(0, &packet, &mut body).unwrap();
        packet.extend_from_slice(&body);
        hp.protect_quic(&mut packet, 1, 1).unwrap();

        assert_eq!(
            open_packet(&mut packet, 0, &hp, &mut receiver, None).map(|_| ()),
            Err(Error::MalformedHeader("reserved bits are set"))
        );
    }

    #[test]
    fn key_phase_survives_protection() {
        let provider = rust_crypto::default_provider();
        let suite = CipherSuite::TLS_AES_256_GCM_SHA384.descriptor().unwrap();
        let max = crate::config::DEFAULT_MAX_CIPHERTEXT_LEN;
        let mut sender = RecordProtector::new(&provider, suite, &[1; 32], &[2; 12], None, max).unwrap();
        let mut receiver =
            RecordProtector::new(&provider, suite, &[1; 32], &[2; 12], None, max).unwrap();
        let hp = HeaderProtector::new(&provider, HeaderProtectionAlgorithm::Aes256Ecb, &[3; 32])
            .unwrap();

        let header = PacketHeader::Short(ShortHeader {
            dcid: vec![9; 8],
            spin: true,
            key_phase: true,
        });
        let mut out = Buf::new();
        seal_packet(&header, 70_000, Some(69_990), b"frames", &mut sender, &hp, &mut out).unwrap();

        let mut bytes = out.to_vec();
        let protected = ProtectedPacket::parse(&bytes, 8).unwrap();
        assert_eq!(protected.pn_offset, 9);
        let unprotected = protected.unprotect(&mut bytes, &hp, Some(69_999)).unwrap();
        assert!(unprotected.key_phase());
        assert_eq!(unprotected.header, header);
        assert_eq!(unprotected.packet_number, 70_000);

        let range = open_payload(&mut bytes, &unprotected, &mut receiver).unwrap();
        assert_eq!(&bytes[range], b"frames");
    }
}
