//! Statically tabulated cipher suite descriptors.

use crate::types::{HashAlgorithm, ProtocolVersion};

/// Cipher suite identifiers (IANA TLS Cipher Suite registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    // TLS 1.3 / DTLS 1.3 / QUIC
    TLS_AES_128_GCM_SHA256,
    TLS_AES_256_GCM_SHA384,
    TLS_CHACHA20_POLY1305_SHA256,
    TLS_AES_128_CCM_SHA256,
    TLS_AES_128_CCM_8_SHA256,

    // TLS 1.2 / DTLS 1.2 AEAD
    ECDHE_ECDSA_AES128_GCM_SHA256,
    ECDHE_ECDSA_AES256_GCM_SHA384,
    ECDHE_RSA_AES128_GCM_SHA256,
    ECDHE_RSA_AES256_GCM_SHA384,
    ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
    ECDHE_RSA_CHACHA20_POLY1305_SHA256,

    // TLS 1.2 / DTLS 1.2 CBC with encrypt-then-MAC
    ECDHE_ECDSA_AES128_CBC_SHA,
    ECDHE_ECDSA_AES256_CBC_SHA,
    ECDHE_RSA_AES128_CBC_SHA,
    ECDHE_RSA_AES256_CBC_SHA,
    ECDHE_ECDSA_AES128_CBC_SHA256,
    ECDHE_ECDSA_AES256_CBC_SHA384,
    ECDHE_RSA_AES128_CBC_SHA256,
    ECDHE_RSA_AES256_CBC_SHA384,

    Unknown(u16),
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x1301 => CipherSuite::TLS_AES_128_GCM_SHA256,
            0x1302 => CipherSuite::TLS_AES_256_GCM_SHA384,
            0x1303 => CipherSuite::TLS_CHACHA20_POLY1305_SHA256,
            0x1304 => CipherSuite::TLS_AES_128_CCM_SHA256,
            0x1305 => CipherSuite::TLS_AES_128_CCM_8_SHA256,
            0xC02B => CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
            0xC02C => CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
            0xC02F => CipherSuite::ECDHE_RSA_AES128_GCM_SHA256,
            0xC030 => CipherSuite::ECDHE_RSA_AES256_GCM_SHA384,
            0xCCA9 => CipherSuite::ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
            0xCCA8 => CipherSuite::ECDHE_RSA_CHACHA20_POLY1305_SHA256,
            0xC009 => CipherSuite::ECDHE_ECDSA_AES128_CBC_SHA,
            0xC00A => CipherSuite::ECDHE_ECDSA_AES256_CBC_SHA,
            0xC013 => CipherSuite::ECDHE_RSA_AES128_CBC_SHA,
            0xC014 => CipherSuite::ECDHE_RSA_AES256_CBC_SHA,
            0xC023 => CipherSuite::ECDHE_ECDSA_AES128_CBC_SHA256,
            0xC024 => CipherSuite::ECDHE_ECDSA_AES256_CBC_SHA384,
            0xC027 => CipherSuite::ECDHE_RSA_AES128_CBC_SHA256,
            0xC028 => CipherSuite::ECDHE_RSA_AES256_CBC_SHA384,
            _ => CipherSuite::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CipherSuite::TLS_AES_128_GCM_SHA256 => 0x1301,
            CipherSuite::TLS_AES_256_GCM_SHA384 => 0x1302,
            CipherSuite::TLS_CHACHA20_POLY1305_SHA256 => 0x1303,
            CipherSuite::TLS_AES_128_CCM_SHA256 => 0x1304,
            CipherSuite::TLS_AES_128_CCM_8_SHA256 => 0x1305,
            CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256 => 0xC02B,
            CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384 => 0xC02C,
            CipherSuite::ECDHE_RSA_AES128_GCM_SHA256 => 0xC02F,
            CipherSuite::ECDHE_RSA_AES256_GCM_SHA384 => 0xC030,
            CipherSuite::ECDHE_ECDSA_CHACHA20_POLY1305_SHA256 => 0xCCA9,
            CipherSuite::ECDHE_RSA_CHACHA20_POLY1305_SHA256 => 0xCCA8,
            CipherSuite::ECDHE_ECDSA_AES128_CBC_SHA => 0xC009,
            CipherSuite::ECDHE_ECDSA_AES256_CBC_SHA => 0xC00A,
            CipherSuite::ECDHE_RSA_AES128_CBC_SHA => 0xC013,
            CipherSuite::ECDHE_RSA_AES256_CBC_SHA => 0xC014,
            CipherSuite::ECDHE_ECDSA_AES128_CBC_SHA256 => 0xC023,
            CipherSuite::ECDHE_ECDSA_AES256_CBC_SHA384 => 0xC024,
            CipherSuite::ECDHE_RSA_AES128_CBC_SHA256 => 0xC027,
            CipherSuite::ECDHE_RSA_AES256_CBC_SHA384 => 0xC028,
            CipherSuite::Unknown(value) => *value,
        }
    }

    /// Descriptor for this suite, `None` for unknown identifiers.
    pub fn descriptor(&self) -> Option<&'static SuiteDescriptor> {
        ALL_SUITES.iter().find(|d| d.suite == *self)
    }

    /// All suites with a descriptor.
    pub fn all() -> impl Iterator<Item = CipherSuite> {
        ALL_SUITES.iter().map(|d| d.suite)
    }
}

/// AEAD algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadAlgorithm {
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
    Aes128Ccm,
    /// AES-128-CCM with an 8 byte tag.
    Aes128Ccm8,
}

impl AeadAlgorithm {
    pub const fn key_len(&self) -> usize {
        match self {
            AeadAlgorithm::Aes256Gcm | AeadAlgorithm::ChaCha20Poly1305 => 32,
            _ => 16,
        }
    }

    pub const fn tag_len(&self) -> usize {
        match self {
            AeadAlgorithm::Aes128Ccm8 => 8,
            _ => 16,
        }
    }

    /// Header protection algorithm paired with this AEAD (RFC 9001 Section 5.4).
    pub const fn header_protection(&self) -> HeaderProtectionAlgorithm {
        match self {
            AeadAlgorithm::Aes256Gcm => HeaderProtectionAlgorithm::Aes256Ecb,
            AeadAlgorithm::ChaCha20Poly1305 => HeaderProtectionAlgorithm::ChaCha20,
            _ => HeaderProtectionAlgorithm::Aes128Ecb,
        }
    }
}

/// Block cipher used in CBC mode by TLS 1.2 suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockAlgorithm {
    Aes128Cbc,
    Aes256Cbc,
}

impl BlockAlgorithm {
    pub const BLOCK_LEN: usize = 16;

    pub const fn key_len(&self) -> usize {
        match self {
            BlockAlgorithm::Aes128Cbc => 16,
            BlockAlgorithm::Aes256Cbc => 32,
        }
    }
}

/// HMAC algorithm used by the CBC suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacAlgorithm {
    HmacSha1,
    HmacSha256,
    HmacSha384,
}

impl MacAlgorithm {
    pub const fn hash(&self) -> HashAlgorithm {
        match self {
            MacAlgorithm::HmacSha1 => HashAlgorithm::SHA1,
            MacAlgorithm::HmacSha256 => HashAlgorithm::SHA256,
            MacAlgorithm::HmacSha384 => HashAlgorithm::SHA384,
        }
    }

    /// MAC key and tag length.
    pub const fn output_len(&self) -> usize {
        self.hash().output_len()
    }
}

/// Block cipher used to derive header protection masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderProtectionAlgorithm {
    Aes128Ecb,
    Aes256Ecb,
    ChaCha20,
}

impl HeaderProtectionAlgorithm {
    pub const fn key_len(&self) -> usize {
        match self {
            HeaderProtectionAlgorithm::Aes128Ecb => 16,
            HeaderProtectionAlgorithm::Aes256Ecb | HeaderProtectionAlgorithm::ChaCha20 => 32,
        }
    }
}

/// How records are protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Aead(AeadAlgorithm),
    /// Encrypt-then-MAC (RFC 7366).
    CbcHmac {
        cipher: BlockAlgorithm,
        mac: MacAlgorithm,
    },
}

/// Which key schedule a suite belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFamily {
    /// HKDF schedule; usable with TLS 1.3, DTLS 1.3 and QUIC.
    Tls13,
    /// PRF key block; usable with TLS 1.2 and DTLS 1.2.
    Tls12,
}

/// Immutable description of one cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuiteDescriptor {
    pub suite: CipherSuite,
    pub family: SuiteFamily,
    pub mode: CipherMode,
    /// Hash for HKDF / PRF and the transcript.
    pub hash: HashAlgorithm,
    pub key_len: usize,
    /// Per-direction IV. 12 for TLS 1.3 and ChaCha20 in TLS 1.2, the
    /// 4 byte implicit part for TLS 1.2 GCM and 0 for CBC.
    pub iv_len: usize,
    /// AEAD tag or MAC length.
    pub tag_len: usize,
    pub mac_key_len: usize,
}

impl SuiteDescriptor {
    /// Whether the suite may protect records for `version`.
    pub fn supports(&self, version: ProtocolVersion) -> bool {
        match self.family {
            SuiteFamily::Tls12 => !version.is_tls13_family(),
            // CCM_8 is excluded from QUIC (RFC 9001 Section 5.3).
            SuiteFamily::Tls13 => {
                version.is_tls13_family()
                    && !(version.is_quic()
                        && self.mode == CipherMode::Aead(AeadAlgorithm::Aes128Ccm8))
            }
        }
    }

    /// AEAD algorithm, if this is an AEAD suite.
    pub fn aead(&self) -> Option<AeadAlgorithm> {
        match self.mode {
            CipherMode::Aead(alg) => Some(alg),
            CipherMode::CbcHmac { .. } => None,
        }
    }

    /// TLS 1.2 GCM suites carry an 8 byte explicit nonce on the wire.
    pub fn explicit_nonce_len(&self) -> usize {
        match (self.family, self.mode) {
            (SuiteFamily::Tls12, CipherMode::Aead(AeadAlgorithm::Aes128Gcm))
            | (SuiteFamily::Tls12, CipherMode::Aead(AeadAlgorithm::Aes256Gcm)) => 8,
            _ => 0,
        }
    }
}

const fn tls13(suite: CipherSuite, alg: AeadAlgorithm, hash: HashAlgorithm) -> SuiteDescriptor {
    SuiteDescriptor {
        suite,
        family: SuiteFamily::Tls13,
        mode: CipherMode::Aead(alg),
        hash,
        key_len: alg.key_len(),
        iv_len: 12,
        tag_len: alg.tag_len(),
        mac_key_len: 0,
    }
}

const fn tls12_aead(
    suite: CipherSuite,
    alg: AeadAlgorithm,
    hash: HashAlgorithm,
) -> SuiteDescriptor {
    let iv_len = match alg {
        AeadAlgorithm::ChaCha20Poly1305 => 12,
        _ => 4,
    };
    SuiteDescriptor {
        suite,
        family: SuiteFamily::Tls12,
        mode: CipherMode::Aead(alg),
        hash,
        key_len: alg.key_len(),
        iv_len,
        tag_len: alg.tag_len(),
        mac_key_len: 0,
    }
}

const fn tls12_cbc(
    suite: CipherSuite,
    cipher: BlockAlgorithm,
    mac: MacAlgorithm,
    prf_hash: HashAlgorithm,
) -> SuiteDescriptor {
    SuiteDescriptor {
        suite,
        family: SuiteFamily::Tls12,
        mode: CipherMode::CbcHmac { cipher, mac },
        hash: prf_hash,
        key_len: cipher.key_len(),
        iv_len: 0,
        tag_len: mac.output_len(),
        mac_key_len: mac.output_len(),
    }
}

use AeadAlgorithm::*;
use BlockAlgorithm::*;
use HashAlgorithm::*;
use MacAlgorithm::*;

static ALL_SUITES: &[SuiteDescriptor] = &[
    tls13(CipherSuite::TLS_AES_128_GCM_SHA256, Aes128Gcm, SHA256),
    tls13(CipherSuite::TLS_AES_256_GCM_SHA384, Aes256Gcm, SHA384),
    tls13(CipherSuite::TLS_CHACHA20_POLY1305_SHA256, ChaCha20Poly1305, SHA256),
    tls13(CipherSuite::TLS_AES_128_CCM_SHA256, Aes128Ccm, SHA256),
    tls13(CipherSuite::TLS_AES_128_CCM_8_SHA256, Aes128Ccm8, SHA256),
    tls12_aead(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256, Aes128Gcm, SHA256),
    tls12_aead(CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384, Aes256Gcm, SHA384),
    tls12_aead(CipherSuite::ECDHE_RSA_AES128_GCM_SHA256, Aes128Gcm, SHA256),
    tls12_aead(CipherSuite::ECDHE_RSA_AES256_GCM_SHA384, Aes256Gcm, SHA384),
    tls12_aead(CipherSuite::ECDHE_ECDSA_CHACHA20_POLY1305_SHA256, ChaCha20Poly1305, SHA256),
    tls12_aead(CipherSuite::ECDHE_RSA_CHACHA20_POLY1305_SHA256, ChaCha20Poly1305, SHA256),
    tls12_cbc(CipherSuite::ECDHE_ECDSA_AES128_CBC_SHA, Aes128Cbc, HmacSha1, SHA256),
    tls12_cbc(CipherSuite::ECDHE_ECDSA_AES256_CBC_SHA, Aes256Cbc, HmacSha1, SHA256),
    tls12_cbc(CipherSuite::ECDHE_RSA_AES128_CBC_SHA, Aes128Cbc, HmacSha1, SHA256),
    tls12_cbc(CipherSuite::ECDHE_RSA_AES256_CBC_SHA, Aes256Cbc, HmacSha1, SHA256),
    tls12_cbc(CipherSuite::ECDHE_ECDSA_AES128_CBC_SHA256, Aes128Cbc, HmacSha256, SHA256),
    tls12_cbc(CipherSuite::ECDHE_ECDSA_AES256_CBC_SHA384, Aes256Cbc, HmacSha384, SHA384),
    tls12_cbc(CipherSuite::ECDHE_RSA_AES128_CBC_SHA256, Aes128Cbc, HmacSha256, SHA256),
    tls12_cbc(CipherSuite::ECDHE_RSA_AES256_CBC_SHA384, Aes256Cbc, HmacSha384, SHA384),
];
