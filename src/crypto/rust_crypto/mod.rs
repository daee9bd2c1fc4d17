//! RustCrypto cryptographic provider.
//!
//! Pure Rust backend built from crates of the
//! [RustCrypto](https://github.com/RustCrypto) organization. This is the
//! provider [`Config`](crate::Config) falls back to when neither an explicit
//! provider nor a process default is installed.
//!
//! ```
//! use std::sync::Arc;
//! use transec::crypto::rust_crypto;
//! use transec::{CipherSuite, Config, ProtocolVersion};
//!
//! let config = Arc::new(
//!     Config::builder()
//!         .cipher_suite(CipherSuite::TLS_AES_128_GCM_SHA256)
//!         .protocol_version(ProtocolVersion::Tls13)
//!         .with_crypto_provider(rust_crypto::default_provider())
//!         .build()
//!         .unwrap(),
//! );
//! # let _ = config;
//! ```

mod aead;
mod block;
mod hash;
mod hkdf;
mod hmac;
mod random;
mod tls12;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # Supported AEADs
///
/// - AES-128-GCM, AES-256-GCM (`aes-gcm`)
/// - ChaCha20-Poly1305 (`chacha20poly1305`)
/// - AES-128-CCM and AES-128-CCM-8 (`ccm`)
///
/// # Header protection
///
/// - AES-128-ECB, AES-256-ECB (`aes`)
/// - ChaCha20 (`chacha20`)
///
/// # CBC suites
///
/// - AES-128-CBC, AES-256-CBC (`cbc`) with HMAC-SHA1/SHA256/SHA384 (`hmac`)
///
/// # Key derivation
///
/// HKDF-SHA256/SHA384 (`hkdf`) and the TLS 1.2 PRF.
///
/// # Random Number Generation
///
/// Uses `OsRng` from the `rand` crate.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        aead_ciphers: aead::ALL_AEADS,
        header_protection: block::ALL_HEADER_PROTECTION,
        block_ciphers: block::ALL_BLOCK_CIPHERS,
        secure_random: &random::SECURE_RANDOM,
        hash_provider: &hash::HASH_PROVIDER,
        hmac_provider: &hmac::HMAC_PROVIDER,
        hkdf_provider: &hkdf::HKDF_PROVIDER,
        prf_provider: &tls12::PRF_PROVIDER,
    }
}
