//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The record engine and key schedule never call a primitive directly. They
//! go through a [`CryptoProvider`], a struct of static references to trait
//! objects, one per capability:
//!
//! - **AEAD** ([`SupportedAead`]): factory for [`Cipher`] and header protection masks
//! - **Block ciphers** ([`SupportedBlockCipher`]): factory for [`CbcCipher`] (TLS 1.2 CBC suites)
//! - **Hash** ([`HashProvider`]): factory for incremental [`HashContext`]s
//! - **HMAC** ([`HmacProvider`])
//! - **HKDF** ([`HkdfProvider`]): extract, expand and expand-label
//! - **PRF** ([`PrfProvider`]): TLS 1.2 PRF for the key block
//! - **Secure random** ([`SecureRandom`]): CBC record IVs
//!
//! All methods return `Result<_, String>`; the engine wraps failures in
//! [`Error::CryptoError`](crate::Error::CryptoError), except AEAD open and MAC
//! verification which surface as
//! [`Error::AuthenticationFailed`](crate::Error::AuthenticationFailed).
//!
//! # Using a Custom Provider
//!
//! ```
//! use transec::crypto::{rust_crypto, CryptoProvider};
//! use transec::{CipherSuite, Config, ProtocolVersion};
//!
//! let base = rust_crypto::default_provider();
//! let custom = CryptoProvider {
//!     hash_provider: base.hash_provider,
//!     ..base
//! };
//!
//! let config = Config::builder()
//!     .cipher_suite(CipherSuite::TLS_AES_128_GCM_SHA256)
//!     .protocol_version(ProtocolVersion::Tls13)
//!     .with_crypto_provider(custom)
//!     .build()
//!     .unwrap();
//! # let _ = config;
//! ```
//!
//! # Thread Safety
//!
//! All provider traits require `Send + Sync + UnwindSafe + RefUnwindSafe`.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::sync::OnceLock;

use crate::buffer::{Buf, TmpBuf};
use crate::crypto::aead::Nonce;
use crate::crypto::suite::{AeadAlgorithm, BlockAlgorithm, HeaderProtectionAlgorithm};
use crate::types::HashAlgorithm;

/// Marker trait for types that are safe to use in crypto provider components.
///
/// Automatically implemented for all types that satisfy the bounds.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits
// ============================================================================

/// AEAD cipher for in-place encryption/decryption.
pub trait Cipher: CryptoSafe {
    /// Encrypt plaintext in-place, appending authentication tag.
    fn encrypt(&mut self, plaintext: &mut Buf, aad: &[u8], nonce: Nonce) -> Result<(), String>;

    /// Decrypt ciphertext in-place, verifying and removing authentication tag.
    fn decrypt(&mut self, ciphertext: &mut TmpBuf, aad: &[u8], nonce: Nonce)
        -> Result<(), String>;
}

/// Keyed mask generator for header and record number protection.
pub trait HeaderProtectionCipher: CryptoSafe {
    /// Produce the mask for a 16 byte ciphertext sample.
    ///
    /// AES: the sample encrypted as one ECB block. ChaCha20: the keystream
    /// with counter and nonce taken from the sample (RFC 9001 Section 5.4.4).
    fn mask(&self, sample: &[u8; 16]) -> [u8; 16];
}

/// Raw AES in CBC mode, without padding. Buffers must be block aligned.
pub trait CbcCipher: CryptoSafe {
    fn encrypt(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String>;

    fn decrypt(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String>;
}

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Clone the context and finalize it, writing the hash to `out`.
    /// The original context can continue to be updated.
    fn clone_and_finalize(&self, out: &mut Buf);
}

// ============================================================================
// Factory Traits
// ============================================================================

/// AEAD algorithm support.
pub trait SupportedAead: CryptoSafe {
    fn algorithm(&self) -> AeadAlgorithm;

    /// Create a cipher instance with the given key.
    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String>;
}

/// Header protection algorithm support.
pub trait SupportedHeaderProtection: CryptoSafe {
    fn algorithm(&self) -> HeaderProtectionAlgorithm;

    fn create_mask_cipher(&self, key: &[u8]) -> Result<Box<dyn HeaderProtectionCipher>, String>;
}

/// Block cipher support for CBC suites.
pub trait SupportedBlockCipher: CryptoSafe {
    fn algorithm(&self) -> BlockAlgorithm;

    fn create_cbc(&self, key: &[u8]) -> Result<Box<dyn CbcCipher>, String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// Hash provider (factory for HashContext).
pub trait HashProvider: CryptoSafe {
    /// Create a new hash context for the specified algorithm.
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext>;
}

/// HMAC provider.
pub trait HmacProvider: CryptoSafe {
    /// Compute HMAC(key, data) with the given hash, replacing the content of `out`.
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        data: &[u8],
        out: &mut Buf,
    ) -> Result<(), String>;
}

/// PRF (Pseudo-Random Function) for TLS 1.2 key derivation.
pub trait PrfProvider: CryptoSafe {
    /// TLS 1.2 PRF: PRF(secret, label, seed) writing output to `out`.
    /// Uses `scratch` for temporary concatenation of label+seed.
    #[allow(clippy::too_many_arguments)]
    fn prf_tls12(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
        scratch: &mut Buf,
        hash: HashAlgorithm,
    ) -> Result<(), String>;
}

/// HKDF provider (RFC 5869) with the TLS 1.3 label construction.
pub trait HkdfProvider: CryptoSafe {
    /// HKDF-Extract: PRK = HKDF-Extract(salt, IKM)
    fn hkdf_extract(
        &self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        out: &mut Buf,
    ) -> Result<(), String>;

    /// HKDF-Expand: OKM = HKDF-Expand(PRK, info, L)
    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String>;

    /// HKDF-Expand-Label (RFC 8446 Section 7.1).
    ///
    /// ```text
    /// HkdfLabel = struct {
    ///     uint16 length;
    ///     opaque label<7..255> = prefix + Label;
    ///     opaque context<0..255> = Context;
    /// }
    /// ```
    ///
    /// `prefix` is `"tls13 "` for TLS 1.3 and QUIC, `"dtls13"` for DTLS 1.3.
    #[allow(clippy::too_many_arguments)]
    fn hkdf_expand_label(
        &self,
        hash: HashAlgorithm,
        secret: &[u8],
        prefix: &[u8],
        label: &[u8],
        context: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String> {
        let full_label_len = prefix.len() + label.len();

        if full_label_len > 255 {
            return Err("Label too long for HKDF-Expand-Label".to_string());
        }
        if context.len() > 255 {
            return Err("Context too long for HKDF-Expand-Label".to_string());
        }
        if output_len > 65535 {
            return Err("Output length too large for HKDF-Expand-Label".to_string());
        }

        let mut info = Vec::with_capacity(2 + 1 + full_label_len + 1 + context.len());
        info.extend_from_slice(&(output_len as u16).to_be_bytes());
        info.push(full_label_len as u8);
        info.extend_from_slice(prefix);
        info.extend_from_slice(label);
        info.push(context.len() as u8);
        info.extend_from_slice(context);

        self.hkdf_expand(hash, secret, &info, out, output_len)
    }
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for the record engine and key schedule.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported AEAD algorithms.
    pub aead_ciphers: &'static [&'static dyn SupportedAead],

    /// Supported header protection algorithms.
    pub header_protection: &'static [&'static dyn SupportedHeaderProtection],

    /// Supported CBC block ciphers (TLS 1.2 only).
    pub block_ciphers: &'static [&'static dyn SupportedBlockCipher],

    /// Secure random number generator.
    pub secure_random: &'static dyn SecureRandom,

    /// Hash provider for the transcript.
    pub hash_provider: &'static dyn HashProvider,

    /// HMAC for Finished and CBC record MACs.
    pub hmac_provider: &'static dyn HmacProvider,

    /// HKDF for the TLS 1.3 family key schedule.
    pub hkdf_provider: &'static dyn HkdfProvider,

    /// PRF for the TLS 1.2 key block.
    pub prf_provider: &'static dyn PrfProvider,
}

/// Static storage for the default crypto provider.
static DEFAULT: OnceLock<CryptoProvider> = OnceLock::new();

impl CryptoProvider {
    /// Install a default crypto provider for the process.
    ///
    /// Used by [`Config::builder()`](crate::Config::builder) when no explicit
    /// provider is given.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn install_default(provider: CryptoProvider) {
        DEFAULT
            .set(provider)
            .expect("CryptoProvider::install_default() called more than once");
    }

    /// Get the default crypto provider, if one has been installed.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }

    pub fn find_aead(&self, algorithm: AeadAlgorithm) -> Option<&'static dyn SupportedAead> {
        self.aead_ciphers
            .iter()
            .find(|a| a.algorithm() == algorithm)
            .copied()
    }

    pub fn find_header_protection(
        &self,
        algorithm: HeaderProtectionAlgorithm,
    ) -> Option<&'static dyn SupportedHeaderProtection> {
        self.header_protection
            .iter()
            .find(|h| h.algorithm() == algorithm)
            .copied()
    }

    pub fn find_block_cipher(
        &self,
        algorithm: BlockAlgorithm,
    ) -> Option<&'static dyn SupportedBlockCipher> {
        self.block_ciphers
            .iter()
            .find(|b| b.algorithm() == algorithm)
            .copied()
    }

    /// Digest of `data` in one shot.
    pub fn hash(&self, algorithm: HashAlgorithm, data: &[u8]) -> Buf {
        let mut ctx = self.hash_provider.create_hash(algorithm);
        ctx.update(data);
        let mut out = Buf::new();
        ctx.clone_and_finalize(&mut out);
        out
    }
}
