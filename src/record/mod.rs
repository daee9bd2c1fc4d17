//! Record protection engine.
//!
//! A [`RecordProtector`] holds the keys of one direction and epoch and seals
//! or opens record bodies. The suite's cipher mode is resolved once, when the
//! protector is built, into a single tagged state that
//! [`RecordProtector::seal`] and [`RecordProtector::open`] match on.
//!
//! Associated data conventions:
//!
//! - TLS 1.3 family (TLS 1.3, DTLS 1.3, QUIC): the caller passes the complete
//!   additional data (record header or packet header) and it is used verbatim.
//! - TLS 1.2 family: the caller passes `type || version` (3 bytes); the engine
//!   prepends the 64 bit sequence and appends the plaintext length
//!   (RFC 5246 Section 6.2.3.3) or, for CBC, the ciphertext length
//!   (RFC 7366 Section 3).
//!
//! Wire layout of the sealed body:
//!
//! | mode                     | body                                   |
//! |--------------------------|----------------------------------------|
//! | TLS 1.3 family AEAD      | `ciphertext || tag`                    |
//! | TLS 1.2 GCM              | `explicit_nonce(8) || ciphertext || tag` |
//! | TLS 1.2 ChaCha20         | `ciphertext || tag`                    |
//! | TLS 1.2 CBC (EtM)        | `IV(16) || ciphertext || MAC`           |

mod header;

pub use header::{flags, Dtls12RecordHeader, TlsRecordHeader, UnifiedHeader};
pub(crate) use header::malformed;

use std::fmt;
use std::ops::Range;

use subtle::{ConstantTimeEq, ConstantTimeGreater};
use zeroize::Zeroizing;

use crate::buffer::{Buf, TmpBuf};
use crate::crypto::{Aad, BlockAlgorithm, CbcCipher, Cipher, CipherMode, CryptoProvider};
use crate::crypto::{HmacProvider, MacAlgorithm, Nonce, SecureRandom, SuiteDescriptor};
use crate::crypto::{SuiteFamily, EXPLICIT_NONCE_LEN, NONCE_LEN};
use crate::secret::SecretStore;
use crate::types::{ContentType, Epoch, Purpose, Role, SecretId};
use crate::Error;

/// Length of the caller supplied associated data for TLS 1.2 family records.
pub const TLS12_AAD_PREFIX_LEN: usize = 3;

/// Largest TLSInnerPlaintext padding block.
const MAX_PADDING_BLOCK: usize = 256;

/// Keys and primitives for one cipher mode.
enum ProtectionState {
    Aead {
        cipher: Box<dyn Cipher>,
        iv: [u8; NONCE_LEN],
        /// TLS 1.2 GCM: the IV is a 4 byte salt and the rest of the nonce
        /// travels in the record.
        explicit_nonce: bool,
    },
    CbcHmac {
        cipher: Box<dyn CbcCipher>,
        mac: MacAlgorithm,
        mac_key: Zeroizing<Vec<u8>>,
        hmac: &'static dyn HmacProvider,
        random: &'static dyn SecureRandom,
    },
}

/// Record protection for one direction and epoch.
pub struct RecordProtector {
    suite: &'static SuiteDescriptor,
    state: ProtectionState,
    max_ciphertext_len: usize,
}

impl RecordProtector {
    /// Build a protector from raw keys.
    ///
    /// `iv` is the full 12 byte IV for the TLS 1.3 family and TLS 1.2
    /// ChaCha20, the 4 byte salt for TLS 1.2 GCM and empty for CBC.
    /// `mac_key` is required for CBC suites only.
    pub fn new(
        provider: &CryptoProvider,
        suite: &'static SuiteDescriptor,
        key: &[u8],
        iv: &[u8],
        mac_key: Option<&[u8]>,
        max_ciphertext_len: usize,
    ) -> Result<Self, Error> {
        if key.len() != suite.key_len {
            return Err(Error::CryptoError(format!(
                "Key length {} does not match {:?}",
                key.len(),
                suite.suite
            )));
        }

        let state = match suite.mode {
            CipherMode::Aead(alg) => {
                let factory = provider.find_aead(alg).ok_or_else(|| {
                    Error::ConfigError(format!("No {:?} in crypto provider", alg))
                })?;
                let cipher = factory.create_cipher(key).map_err(Error::CryptoError)?;

                let explicit_nonce = suite.explicit_nonce_len() > 0;
                let mut full_iv = [0u8; NONCE_LEN];
                let expected = if explicit_nonce { 4 } else { NONCE_LEN };
                if iv.len() != expected {
                    return Err(Error::CryptoError(format!(
                        "IV length {} does not match {:?}",
                        iv.len(),
                        suite.suite
                    )));
                }
                full_iv[..expected].copy_from_slice(iv);

                ProtectionState::Aead {
                    cipher,
                    iv: full_iv,
                    explicit_nonce,
                }
            }
            CipherMode::CbcHmac { cipher, mac } => {
                let factory = provider.find_block_cipher(cipher).ok_or_else(|| {
                    Error::ConfigError(format!("No {:?} in crypto provider", cipher))
                })?;
                let mac_key = mac_key
                    .filter(|k| k.len() == suite.mac_key_len)
                    .ok_or_else(|| Error::CryptoError("CBC suite needs a MAC key".to_string()))?;
                ProtectionState::CbcHmac {
                    cipher: factory.create_cbc(key).map_err(Error::CryptoError)?,
                    mac,
                    mac_key: Zeroizing::new(mac_key.to_vec()),
                    hmac: provider.hmac_provider,
                    random: provider.secure_random,
                }
            }
        };

        Ok(RecordProtector {
            suite,
            state,
            max_ciphertext_len,
        })
    }

    /// Build a protector for `(role, epoch)` from the keys currently in `store`.
    ///
    /// Called on every epoch transition so superseded keys are never reused.
    pub fn from_store(
        provider: &CryptoProvider,
        suite: &'static SuiteDescriptor,
        store: &SecretStore,
        role: Role,
        epoch: Epoch,
        max_ciphertext_len: usize,
    ) -> Result<Self, Error> {
        let id = |purpose| SecretId::new(role, epoch, purpose);
        let key = store.get(id(Purpose::Key))?;
        let iv = if suite.iv_len > 0 {
            Some(store.get(id(Purpose::Iv))?)
        } else {
            None
        };
        let mac_key = if suite.mac_key_len > 0 {
            Some(store.get(id(Purpose::MacKey))?)
        } else {
            None
        };

        Self::new(
            provider,
            suite,
            key.as_bytes(),
            iv.as_ref().map(|s| s.as_bytes()).unwrap_or(&[]),
            mac_key.as_ref().map(|s| s.as_bytes()),
            max_ciphertext_len,
        )
    }

    pub fn suite(&self) -> &'static SuiteDescriptor {
        self.suite
    }

    /// AEAD nonce used for `seq`, `None` for CBC suites.
    pub fn nonce(&self, seq: u64) -> Option<Nonce> {
        match &self.state {
            ProtectionState::Aead {
                iv, explicit_nonce, ..
            } => Some(aead_nonce(iv, *explicit_nonce, seq)),
            ProtectionState::CbcHmac { .. } => None,
        }
    }

    /// Length of the body [`RecordProtector::seal`] produces for `len` plaintext bytes.
    pub fn sealed_len(&self, len: usize) -> usize {
        match &self.state {
            ProtectionState::Aead { explicit_nonce, .. } => {
                let explicit = if *explicit_nonce { EXPLICIT_NONCE_LEN } else { 0 };
                explicit + len + self.suite.tag_len
            }
            ProtectionState::CbcHmac { mac, .. } => {
                let padded = (len / BlockAlgorithm::BLOCK_LEN + 1) * BlockAlgorithm::BLOCK_LEN;
                BlockAlgorithm::BLOCK_LEN + padded + mac.output_len()
            }
        }
    }

    /// Seal `payload` in place for record number `seq`.
    ///
    /// Fails with `RecordTooLarge` if the sealed body would exceed the
    /// ciphertext bound; `payload` is left untouched in that case.
    pub fn seal(&mut self, seq: u64, aad: &[u8], payload: &mut Buf) -> Result<(), Error> {
        let sealed_len = self.sealed_len(payload.len());
        if sealed_len > self.max_ciphertext_len {
            return Err(Error::RecordTooLarge(sealed_len, self.max_ciphertext_len));
        }
        let tls12 = self.suite.family == SuiteFamily::Tls12;

        match &mut self.state {
            ProtectionState::Aead {
                cipher,
                iv,
                explicit_nonce,
            } => {
                let nonce = aead_nonce(iv, *explicit_nonce, seq);
                let full_aad;
                let aad = if tls12 {
                    full_aad = tls12_aad(seq, aad, payload.len())?;
                    &full_aad[..]
                } else {
                    aad
                };

                cipher
                    .encrypt(payload, aad, nonce)
                    .map_err(Error::CryptoError)?;

                if *explicit_nonce {
                    let sealed = payload.len();
                    payload.resize(EXPLICIT_NONCE_LEN + sealed, 0);
                    payload.copy_within(0..sealed, EXPLICIT_NONCE_LEN);
                    payload[..EXPLICIT_NONCE_LEN].copy_from_slice(&seq.to_be_bytes());
                }
            }
            ProtectionState::CbcHmac {
                cipher,
                mac,
                mac_key,
                hmac,
                random,
            } => {
                let block = BlockAlgorithm::BLOCK_LEN;

                // content || padding || padding_length, each padding byte = padding_length
                let pad = block - 1 - payload.len() % block;
                for _ in 0..=pad {
                    payload.push(pad as u8);
                }

                let mut record_iv = [0u8; 16];
                random.fill(&mut record_iv).map_err(Error::CryptoError)?;
                cipher
                    .encrypt(&record_iv, payload)
                    .map_err(Error::CryptoError)?;

                let encrypted = payload.len();
                payload.resize(block + encrypted, 0);
                payload.copy_within(0..encrypted, block);
                payload[..block].copy_from_slice(&record_iv);

                let mac_input = tls12_mac_input(seq, aad, payload)?;
                let mut tag = Buf::new();
                hmac.hmac(mac.hash(), mac_key.as_slice(), &mac_input, &mut tag)
                    .map_err(Error::CryptoError)?;
                payload.extend_from_slice(&tag);
            }
        }

        trace!(
            "Sealed record seq {} ({} bytes) with {:?}",
            seq,
            payload.len(),
            self.suite.suite
        );
        Ok(())
    }

    /// Open a sealed body in place for record number `seq`.
    ///
    /// Returns the range of `body` holding the plaintext. Any failed check
    /// (tag, MAC, padding, framing) is reported as `AuthenticationFailed`.
    pub fn open(&mut self, seq: u64, aad: &[u8], body: &mut [u8]) -> Result<Range<usize>, Error> {
        if body.len() > self.max_ciphertext_len {
            return Err(Error::RecordTooLarge(body.len(), self.max_ciphertext_len));
        }
        let tls12 = self.suite.family == SuiteFamily::Tls12;
        let tag_len = self.suite.tag_len;

        let range = match &mut self.state {
            ProtectionState::Aead {
                cipher,
                iv,
                explicit_nonce,
            } => {
                let (start, nonce) = if *explicit_nonce {
                    if body.len() < EXPLICIT_NONCE_LEN + tag_len {
                        return Err(Error::AuthenticationFailed);
                    }
                    let mut explicit = [0u8; EXPLICIT_NONCE_LEN];
                    explicit.copy_from_slice(&body[..EXPLICIT_NONCE_LEN]);
                    let mut salt = [0u8; 4];
                    salt.copy_from_slice(&iv[..4]);
                    (EXPLICIT_NONCE_LEN, Nonce::new(&salt, &explicit))
                } else {
                    if body.len() < tag_len {
                        return Err(Error::AuthenticationFailed);
                    }
                    (0, aead_nonce(iv, false, seq))
                };

                let plaintext_len = body.len() - start - tag_len;
                let full_aad;
                let aad = if tls12 {
                    full_aad = tls12_aad(seq, aad, plaintext_len)?;
                    &full_aad[..]
                } else {
                    aad
                };

                let mut tmp = TmpBuf::new(&mut body[start..]);
                cipher
                    .decrypt(&mut tmp, aad, nonce)
                    .map_err(|_| Error::AuthenticationFailed)?;
                start..start + tmp.len()
            }
            ProtectionState::CbcHmac {
                cipher,
                mac,
                mac_key,
                hmac,
                ..
            } => {
                let block = BlockAlgorithm::BLOCK_LEN;
                let mac_len = mac.output_len();
                if body.len() < block + block + mac_len
                    || (body.len() - mac_len - block) % block != 0
                {
                    return Err(Error::AuthenticationFailed);
                }

                let (protected, received_tag) = body.split_at_mut(body.len() - mac_len);
                let mac_input = tls12_mac_input(seq, aad, protected)?;
                let mut expected = Buf::new();
                hmac.hmac(mac.hash(), mac_key.as_slice(), &mac_input, &mut expected)
                    .map_err(Error::CryptoError)?;
                if !bool::from(expected[..].ct_eq(&received_tag[..])) {
                    return Err(Error::AuthenticationFailed);
                }

                let (record_iv, data) = protected.split_at_mut(block);
                cipher
                    .decrypt(record_iv, data)
                    .map_err(|_| Error::AuthenticationFailed)?;

                let (valid, pad_total) = check_cbc_padding(data);
                if !valid {
                    return Err(Error::AuthenticationFailed);
                }
                block..block + data.len() - pad_total
            }
        };

        trace!(
            "Opened record seq {} ({} bytes) with {:?}",
            seq,
            range.len(),
            self.suite.suite
        );
        Ok(range)
    }
}

impl fmt::Debug for RecordProtector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.state {
            ProtectionState::Aead { .. } => "aead",
            ProtectionState::CbcHmac { .. } => "cbc-hmac",
        };
        f.debug_struct("RecordProtector")
            .field("suite", &self.suite.suite)
            .field("mode", &mode)
            .field("max_ciphertext_len", &self.max_ciphertext_len)
            .finish()
    }
}

fn aead_nonce(iv: &[u8; NONCE_LEN], explicit_nonce: bool, seq: u64) -> Nonce {
    if explicit_nonce {
        let mut salt = [0u8; 4];
        salt.copy_from_slice(&iv[..4]);
        Nonce::new(&salt, &seq.to_be_bytes())
    } else {
        Nonce::xor(iv, seq)
    }
}

fn split_prefix(prefix: &[u8]) -> Result<(u8, [u8; 2]), Error> {
    match prefix {
        [content_type, major, minor] => Ok((*content_type, [*major, *minor])),
        _ => Err(Error::CryptoError(format!(
            "TLS 1.2 associated data must be {} bytes, got {}",
            TLS12_AAD_PREFIX_LEN,
            prefix.len()
        ))),
    }
}

/// `seq || type || version || length` for TLS 1.2 family AEAD records.
fn tls12_aad(seq: u64, prefix: &[u8], len: usize) -> Result<Aad, Error> {
    let (content_type, version) = split_prefix(prefix)?;
    let len = u16::try_from(len).map_err(|_| Error::RecordTooLarge(len, u16::MAX as usize))?;
    Ok(Aad::new_tls12(seq, content_type, version, len))
}

/// `seq || type || version || length || IV || ciphertext` (RFC 7366).
fn tls12_mac_input(seq: u64, prefix: &[u8], protected: &[u8]) -> Result<Vec<u8>, Error> {
    let aad = tls12_aad(seq, prefix, protected.len())?;
    let mut input = Vec::with_capacity(aad.len() + protected.len());
    input.extend_from_slice(&aad);
    input.extend_from_slice(protected);
    Ok(input)
}

/// Validate TLS CBC padding without branching on secret bytes.
///
/// Returns whether the padding is well formed and how many bytes it
/// occupies, padding length byte included.
fn check_cbc_padding(data: &[u8]) -> (bool, usize) {
    let len = data.len();
    if len == 0 {
        return (false, 0);
    }
    let pad = data[len - 1];

    // pad + 1 <= len
    let mut good = !u32::from(pad).ct_gt(&(len as u32 - 1));

    let start = len.saturating_sub(MAX_PADDING_BLOCK);
    for (i, b) in data[start..len - 1].iter().enumerate() {
        let distance = (len - 1 - (start + i)) as u32;
        let in_padding = !distance.ct_gt(&u32::from(pad));
        good &= !in_padding | b.ct_eq(&pad);
    }

    let valid: bool = good.into();
    (valid, usize::from(pad) + 1)
}

/// Build `TLSInnerPlaintext` in place: `content || type || zeros`.
///
/// With `padding_block > 0` the result is padded to a multiple of it.
pub fn encode_inner_plaintext(payload: &mut Buf, content_type: ContentType, padding_block: usize) {
    payload.push(content_type.as_u8());
    if padding_block > 1 {
        let rem = payload.len() % padding_block;
        if rem != 0 {
            let padded = payload.len() + padding_block - rem;
            payload.resize(padded, 0);
        }
    }
}

/// Recover the content type of a `TLSInnerPlaintext`.
///
/// Returns the type and the content length.
pub fn decode_inner_plaintext(plaintext: &[u8]) -> Result<(ContentType, usize), Error> {
    let end = plaintext
        .iter()
        .rposition(|b| *b != 0)
        .ok_or(Error::MalformedHeader("inner plaintext has no content type"))?;
    Ok((ContentType::from_u8(plaintext[end]), end))
}
