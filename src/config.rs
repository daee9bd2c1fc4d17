use std::fmt;
use std::sync::Arc;

use crate::crypto::{rust_crypto, CipherMode, CipherSuite, CryptoProvider, SuiteDescriptor};
use crate::keylog::KeyLog;
use crate::types::ProtocolVersion;
use crate::Error;

/// Bound on protected record size for the TLS family (RFC 5246 Section 6.2.3).
pub const DEFAULT_MAX_CIPHERTEXT_LEN: usize = (1 << 15) + 2048;

/// Session configuration.
///
/// Carries what the handshake negotiated (suite and version) plus local policy.
#[derive(Clone)]
pub struct Config {
    cipher_suite: CipherSuite,
    protocol_version: ProtocolVersion,
    descriptor: &'static SuiteDescriptor,
    crypto_provider: CryptoProvider,
    key_log: Option<Arc<dyn KeyLog>>,
    max_ciphertext_len: usize,
    replay_protection: bool,
    record_padding: usize,
    with_extended_master_secret: bool,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            cipher_suite: CipherSuite::TLS_AES_128_GCM_SHA256,
            protocol_version: ProtocolVersion::Tls13,
            crypto_provider: None,
            key_log: None,
            max_ciphertext_len: DEFAULT_MAX_CIPHERTEXT_LEN,
            replay_protection: true,
            record_padding: 0,
            with_extended_master_secret: true,
        }
    }

    /// Negotiated cipher suite.
    #[inline(always)]
    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    /// Descriptor of the negotiated suite, looked up once at build time.
    #[inline(always)]
    pub fn suite(&self) -> &'static SuiteDescriptor {
        self.descriptor
    }

    /// Negotiated protocol version.
    #[inline(always)]
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    /// Cryptographic provider.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Diagnostic key log hook, if explicitly enabled.
    #[inline(always)]
    pub fn key_log(&self) -> Option<&Arc<dyn KeyLog>> {
        self.key_log.as_ref()
    }

    /// Largest protected record body accepted or produced (TLS/DTLS).
    #[inline(always)]
    pub fn max_ciphertext_len(&self) -> usize {
        self.max_ciphertext_len
    }

    /// Whether DTLS records are checked against a sliding anti-replay window.
    #[inline(always)]
    pub fn replay_protection(&self) -> bool {
        self.replay_protection
    }

    /// Pad TLS 1.3 / DTLS 1.3 inner plaintexts to a multiple of this many bytes.
    ///
    /// 0 disables padding.
    #[inline(always)]
    pub fn record_padding(&self) -> usize {
        self.record_padding
    }

    /// Whether the TLS 1.2 master secret uses the session hash (rfc7627).
    #[inline(always)]
    pub fn with_extended_master_secret(&self) -> bool {
        self.with_extended_master_secret
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("cipher_suite", &self.cipher_suite)
            .field("protocol_version", &self.protocol_version)
            .field("key_log", &self.key_log.is_some())
            .field("max_ciphertext_len", &self.max_ciphertext_len)
            .field("replay_protection", &self.replay_protection)
            .field("record_padding", &self.record_padding)
            .finish()
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    cipher_suite: CipherSuite,
    protocol_version: ProtocolVersion,
    crypto_provider: Option<CryptoProvider>,
    key_log: Option<Arc<dyn KeyLog>>,
    max_ciphertext_len: usize,
    replay_protection: bool,
    record_padding: usize,
    with_extended_master_secret: bool,
}

impl ConfigBuilder {
    /// Set the negotiated cipher suite.
    ///
    /// Defaults to `TLS_AES_128_GCM_SHA256`.
    pub fn cipher_suite(mut self, suite: CipherSuite) -> Self {
        self.cipher_suite = suite;
        self
    }

    /// Set the negotiated protocol version.
    ///
    /// Defaults to TLS 1.3.
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Set a custom crypto provider.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Expose derived secrets to a diagnostic hook.
    ///
    /// Off by default. Anything logged here decrypts the session.
    pub fn with_key_log(mut self, key_log: Arc<dyn KeyLog>) -> Self {
        self.key_log = Some(key_log);
        self
    }

    /// Set the ciphertext bound for TLS/DTLS records.
    ///
    /// Defaults to 2^15 + 2048.
    pub fn max_ciphertext_len(mut self, len: usize) -> Self {
        self.max_ciphertext_len = len;
        self
    }

    /// Set whether DTLS records go through the anti-replay window.
    ///
    /// Defaults to true.
    pub fn replay_protection(mut self, enabled: bool) -> Self {
        self.replay_protection = enabled;
        self
    }

    /// Pad TLS 1.3 / DTLS 1.3 inner plaintexts to a multiple of `block` bytes.
    ///
    /// Defaults to 0 (no padding).
    pub fn record_padding(mut self, block: usize) -> Self {
        self.record_padding = block;
        self
    }

    /// Set whether to use Extended Master Secret (rfc7627) for TLS 1.2.
    ///
    /// Defaults to true.
    pub fn with_extended_master_secret(mut self, enabled: bool) -> Self {
        self.with_extended_master_secret = enabled;
        self
    }

    /// Build the configuration.
    ///
    /// The crypto provider is selected in the following priority order:
    /// 1. Explicit provider set via `with_crypto_provider()`
    /// 2. Default provider installed via `CryptoProvider::install_default()`
    /// 3. The RustCrypto provider
    ///
    /// Fails with `UnsupportedSuite` if the suite is unknown or does not fit
    /// the protocol version, and with `ConfigError` if the provider lacks a
    /// primitive the suite needs.
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .or_else(|| CryptoProvider::get_default().cloned())
            .unwrap_or_else(rust_crypto::default_provider);

        let descriptor = self
            .cipher_suite
            .descriptor()
            .filter(|d| d.supports(self.protocol_version))
            .ok_or(Error::UnsupportedSuite(self.cipher_suite))?;

        validate_provider(&crypto_provider, descriptor)?;

        if self.max_ciphertext_len == 0 || self.max_ciphertext_len > u16::MAX as usize {
            return Err(Error::ConfigError(format!(
                "max_ciphertext_len out of range: {}",
                self.max_ciphertext_len
            )));
        }
        if self.record_padding > 256 {
            return Err(Error::ConfigError(format!(
                "record_padding too large: {}",
                self.record_padding
            )));
        }

        Ok(Config {
            cipher_suite: self.cipher_suite,
            protocol_version: self.protocol_version,
            descriptor,
            crypto_provider,
            key_log: self.key_log,
            max_ciphertext_len: self.max_ciphertext_len,
            replay_protection: self.replay_protection,
            record_padding: self.record_padding,
            with_extended_master_secret: self.with_extended_master_secret,
        })
    }
}

fn validate_provider(provider: &CryptoProvider, suite: &SuiteDescriptor) -> Result<(), Error> {
    match suite.mode {
        CipherMode::Aead(alg) => {
            if provider.find_aead(alg).is_none() {
                return Err(Error::ConfigError(format!(
                    "Crypto provider has no {:?} for {:?}",
                    alg, suite.suite
                )));
            }
            let hp = alg.header_protection();
            if provider.find_header_protection(hp).is_none() {
                return Err(Error::ConfigError(format!(
                    "Crypto provider has no {:?} header protection",
                    hp
                )));
            }
        }
        CipherMode::CbcHmac { cipher, .. } => {
            if provider.find_block_cipher(cipher).is_none() {
                return Err(Error::ConfigError(format!(
                    "Crypto provider has no {:?} for {:?}",
                    cipher, suite.suite
                )));
            }
        }
    }
    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
