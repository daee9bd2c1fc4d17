//! Identifiers shared by the key schedule, the secret store and the record engine.

use std::fmt;

use nom::number::complete::be_u8;
use nom::IResult;

/// Which end of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// The other end.
    pub fn peer(self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

/// Direction of travel for records/packets.
///
/// TLS, DTLS and QUIC keep independent secrets and counters per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    /// The role whose secrets protect this direction.
    pub fn sender(self) -> Role {
        match self {
            Direction::ClientToServer => Role::Client,
            Direction::ServerToClient => Role::Server,
        }
    }

    /// Direction written by `role`.
    pub fn sent_by(role: Role) -> Direction {
        match role {
            Role::Client => Direction::ClientToServer,
            Role::Server => Direction::ServerToClient,
        }
    }

    /// Direction read by `role`.
    pub fn received_by(role: Role) -> Direction {
        Self::sent_by(role.peer())
    }
}

/// Handshake phase owning its own secret set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Epoch {
    /// QUIC Initial (secrets from the client's Destination Connection ID).
    Initial,
    /// 0-RTT early data.
    Early,
    Handshake,
    Application,
}

/// What a secret is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Purpose {
    /// The traffic secret that key, IV and header protection key expand from.
    TrafficSecret,
    Key,
    Iv,
    HeaderProtection,
    /// TLS 1.2 CBC suites only.
    MacKey,
}

/// `(role, epoch, purpose)` triple naming one secret in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecretId {
    pub role: Role,
    pub epoch: Epoch,
    pub purpose: Purpose,
}

impl SecretId {
    pub const fn new(role: Role, epoch: Epoch, purpose: Purpose) -> Self {
        SecretId {
            role,
            epoch,
            purpose,
        }
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            Role::Client => "client",
            Role::Server => "server",
        };
        let epoch = match self.epoch {
            Epoch::Initial => "initial",
            Epoch::Early => "early",
            Epoch::Handshake => "handshake",
            Epoch::Application => "application",
        };
        let purpose = match self.purpose {
            Purpose::TrafficSecret => "traffic secret",
            Purpose::Key => "key",
            Purpose::Iv => "iv",
            Purpose::HeaderProtection => "header-protection key",
            Purpose::MacKey => "mac key",
        };
        write!(f, "{} {} {}", role, epoch, purpose)
    }
}

/// Handshake progress of one direction.
///
/// Ordered: a direction only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakeStatus {
    /// Before ClientHello/ServerHello. Plaintext for TLS/DTLS, Initial keys for QUIC.
    Initial,
    /// ClientHello sent, ServerHello not yet received (client only).
    EarlyData,
    /// ServerHello sent/received, Finished not yet.
    Handshake,
    /// Finished sent/received.
    Application,
}

impl HandshakeStatus {
    /// The epoch whose secrets protect records in this status, if any.
    pub fn epoch(self, version: ProtocolVersion) -> Option<Epoch> {
        if !version.is_tls13_family() {
            // TLS/DTLS 1.2 only protect after ChangeCipherSpec.
            return match self {
                HandshakeStatus::Application => Some(Epoch::Application),
                _ => None,
            };
        }

        match self {
            HandshakeStatus::Initial if version.is_quic() => Some(Epoch::Initial),
            HandshakeStatus::Initial => None,
            HandshakeStatus::EarlyData => Some(Epoch::Early),
            HandshakeStatus::Handshake => Some(Epoch::Handshake),
            HandshakeStatus::Application => Some(Epoch::Application),
        }
    }
}

/// Hash algorithms used for HKDF, the PRF, HMAC and the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum HashAlgorithm {
    SHA1,
    SHA256,
    SHA384,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub const fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::SHA1 => 20,
            HashAlgorithm::SHA256 => 32,
            HashAlgorithm::SHA384 => 48,
        }
    }
}

/// TLS record content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Ack,
    Unknown(u8),
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            26 => ContentType::Ack,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Ack => 26,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// QUIC version, selecting salts, labels and Retry keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuicVersion {
    /// RFC 9000 / RFC 9001.
    V1,
    /// RFC 9369.
    V2,
}

impl QuicVersion {
    pub const fn as_u32(&self) -> u32 {
        match self {
            QuicVersion::V1 => 0x0000_0001,
            QuicVersion::V2 => 0x6b33_43cf,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x0000_0001 => Some(QuicVersion::V1),
            0x6b33_43cf => Some(QuicVersion::V2),
            _ => None,
        }
    }

    /// Salt for HKDF-Extract of the Initial secret.
    pub const fn initial_salt(&self) -> &'static [u8; 20] {
        match self {
            QuicVersion::V1 => &[
                0x38, 0x76, 0x2c, 0xf7, 0xf5, 0x59, 0x34, 0xb3, 0x4d, 0x17, 0x9a, 0xe6, 0xa4,
                0xc8, 0x0c, 0xad, 0xcc, 0xbb, 0x7f, 0x0a,
            ],
            QuicVersion::V2 => &[
                0x0d, 0xed, 0xe3, 0xde, 0xf7, 0x00, 0xa6, 0xdb, 0x81, 0x93, 0x81, 0xbe, 0x6e,
                0x26, 0x9d, 0xcb, 0xf9, 0xbd, 0x2e, 0xd9,
            ],
        }
    }

    /// Label for the next-generation secret on key update.
    pub const fn key_update_label(&self) -> &'static [u8] {
        match self {
            QuicVersion::V1 => b"quic ku",
            QuicVersion::V2 => b"quicv2 ku",
        }
    }

    /// AES-128-GCM key and nonce of the Retry integrity tag
    /// (RFC 9001 Section 5.8, RFC 9369 Section 3.3.3).
    pub const fn retry_integrity_key(&self) -> (&'static [u8; 16], &'static [u8; 12]) {
        match self {
            QuicVersion::V1 => (
                &[
                    0xbe, 0x0c, 0x69, 0x0b, 0x9f, 0x66, 0x57, 0x5a, 0x1d, 0x76, 0x6b, 0x54, 0xe3,
                    0x68, 0xc8, 0x4e,
                ],
                &[
                    0x46, 0x15, 0x99, 0xd3, 0x5d, 0x63, 0x2b, 0xf2, 0x23, 0x98, 0x25, 0xbb,
                ],
            ),
            QuicVersion::V2 => (
                &[
                    0x8f, 0xb4, 0xb0, 0x1b, 0x56, 0xac, 0x48, 0xe2, 0x60, 0xfb, 0xcb, 0xce, 0xad,
                    0x7c, 0xcc, 0x92,
                ],
                &[
                    0xd8, 0x69, 0x69, 0xbc, 0x2d, 0x7c, 0x6d, 0x99, 0x90, 0xef, 0xb0, 0x4a,
                ],
            ),
        }
    }
}

/// HKDF-Expand-Label labels for the material of one traffic secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionLabels {
    pub key: &'static [u8],
    pub iv: &'static [u8],
    pub hp: Option<&'static [u8]>,
}

/// Negotiated protocol and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    Tls12,
    Tls13,
    Dtls12,
    Dtls13,
    Quic(QuicVersion),
}

impl ProtocolVersion {
    /// TLS 1.3, DTLS 1.3 and QUIC share the HKDF key schedule.
    pub fn is_tls13_family(&self) -> bool {
        !matches!(self, ProtocolVersion::Tls12 | ProtocolVersion::Dtls12)
    }

    pub fn is_datagram(&self) -> bool {
        matches!(
            self,
            ProtocolVersion::Dtls12 | ProtocolVersion::Dtls13 | ProtocolVersion::Quic(_)
        )
    }

    pub fn is_quic(&self) -> bool {
        matches!(self, ProtocolVersion::Quic(_))
    }

    pub fn quic_version(&self) -> Option<QuicVersion> {
        match self {
            ProtocolVersion::Quic(v) => Some(*v),
            _ => None,
        }
    }

    /// Prefix prepended to every HKDF-Expand-Label label.
    ///
    /// QUIC uses the TLS 1.3 prefix (RFC 9001 Section 5.1), DTLS 1.3 its own (RFC 9147).
    pub fn label_prefix(&self) -> &'static [u8] {
        match self {
            ProtocolVersion::Dtls12 | ProtocolVersion::Dtls13 => b"dtls13",
            _ => b"tls13 ",
        }
    }

    /// Labels expanding a traffic secret into key, IV and header protection key.
    ///
    /// TLS 1.3 has no header protection. DTLS 1.3 calls it the record number
    /// key (`"sn"`, RFC 9147 Section 4.2.3).
    pub fn protection_labels(&self) -> ProtectionLabels {
        match self {
            ProtocolVersion::Quic(QuicVersion::V1) => ProtectionLabels {
                key: b"quic key",
                iv: b"quic iv",
                hp: Some(b"quic hp"),
            },
            ProtocolVersion::Quic(QuicVersion::V2) => ProtectionLabels {
                key: b"quicv2 key",
                iv: b"quicv2 iv",
                hp: Some(b"quicv2 hp"),
            },
            ProtocolVersion::Dtls13 => ProtectionLabels {
                key: b"key",
                iv: b"iv",
                hp: Some(b"sn"),
            },
            _ => ProtectionLabels {
                key: b"key",
                iv: b"iv",
                hp: None,
            },
        }
    }

    /// `legacy_record_version` written into record headers.
    pub fn legacy_record_version(&self) -> [u8; 2] {
        match self {
            ProtocolVersion::Dtls12 | ProtocolVersion::Dtls13 => [0xfe, 0xfd],
            _ => [0x03, 0x03],
        }
    }

    /// Largest sequence/packet number usable in one epoch.
    pub fn max_sequence(&self) -> u64 {
        match self {
            ProtocolVersion::Tls12 | ProtocolVersion::Tls13 => u64::MAX,
            ProtocolVersion::Dtls12 | ProtocolVersion::Dtls13 => (1 << 48) - 1,
            ProtocolVersion::Quic(_) => (1 << 62) - 1,
        }
    }
}
