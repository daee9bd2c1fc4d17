//! Header protection for QUIC packets (RFC 9001 Section 5.4) and DTLS 1.3
//! record numbers (RFC 9147 Section 4.2.3).
//!
//! A mask is computed from a 16 byte sample of ciphertext under the epoch's
//! header protection key. The mask does not depend on the sequence number.

use std::fmt;

use crate::crypto::{CryptoProvider, HeaderProtectionAlgorithm, HeaderProtectionCipher};
use crate::Error;

/// Bytes of ciphertext fed to the mask cipher.
pub const SAMPLE_LEN: usize = 16;

/// Longest packet number on the wire.
pub const MAX_PN_LEN: usize = 4;

const LONG_HEADER_FORM: u8 = 0x80;
const LONG_HEADER_MASK: u8 = 0x0f;
const SHORT_HEADER_MASK: u8 = 0x1f;

/// Keyed header protection for one direction and epoch.
pub struct HeaderProtector {
    algorithm: HeaderProtectionAlgorithm,
    cipher: Box<dyn HeaderProtectionCipher>,
}

impl HeaderProtector {
    pub fn new(
        provider: &CryptoProvider,
        algorithm: HeaderProtectionAlgorithm,
        key: &[u8],
    ) -> Result<Self, Error> {
        let factory = provider.find_header_protection(algorithm).ok_or_else(|| {
            Error::ConfigError(format!("No {:?} header protection in provider", algorithm))
        })?;
        let cipher = factory
            .create_mask_cipher(key)
            .map_err(Error::CryptoError)?;
        Ok(HeaderProtector { algorithm, cipher })
    }

    pub fn algorithm(&self) -> HeaderProtectionAlgorithm {
        self.algorithm
    }

    /// Mask for the first [`SAMPLE_LEN`] bytes of `sample`.
    pub fn mask(&self, sample: &[u8]) -> Result<[u8; 16], Error> {
        let sample: &[u8; SAMPLE_LEN] = sample
            .get(..SAMPLE_LEN)
            .and_then(|s| s.try_into().ok())
            .ok_or(Error::MalformedHeader("ciphertext too short to sample"))?;
        Ok(self.cipher.mask(sample))
    }

    /// Protect a QUIC packet in place.
    ///
    /// `packet` holds the header, packet number and sealed payload;
    /// `pn_offset` is where the packet number starts. The sample is taken 4
    /// bytes past `pn_offset`, as if the packet number were 4 bytes long.
    pub fn protect_quic(
        &self,
        packet: &mut [u8],
        pn_offset: usize,
        pn_len: usize,
    ) -> Result<(), Error> {
        if !(1..=MAX_PN_LEN).contains(&pn_len) {
            return Err(Error::MalformedHeader("packet number length"));
        }
        let mask = self.quic_mask(packet, pn_offset)?;

        packet[0] ^= mask[0] & first_byte_mask(packet[0]);
        for (b, m) in packet[pn_offset..pn_offset + pn_len].iter_mut().zip(&mask[1..]) {
            *b ^= m;
        }
        Ok(())
    }

    /// Remove QUIC header protection in place and return the packet number length.
    pub fn unprotect_quic(&self, packet: &mut [u8], pn_offset: usize) -> Result<usize, Error> {
        let mask = self.quic_mask(packet, pn_offset)?;

        packet[0] ^= mask[0] & first_byte_mask(packet[0]);
        let pn_len = usize::from(packet[0] & 0x03) + 1;
        for (b, m) in packet[pn_offset..pn_offset + pn_len].iter_mut().zip(&mask[1..]) {
            *b ^= m;
        }
        Ok(pn_len)
    }

    fn quic_mask(&self, packet: &[u8], pn_offset: usize) -> Result<[u8; 16], Error> {
        if pn_offset == 0 {
            return Err(Error::MalformedHeader("packet number overlaps first byte"));
        }
        let sample_offset = pn_offset + MAX_PN_LEN;
        let sample = packet
            .get(sample_offset..)
            .ok_or(Error::MalformedHeader("packet too short to sample"))?;
        self.mask(sample)
    }

    /// XOR the DTLS 1.3 record number (1 or 2 bytes) with the mask derived
    /// from the start of the record's ciphertext.
    ///
    /// The operation is its own inverse.
    pub fn mask_record_number(&self, record_number: &mut [u8], ciphertext: &[u8]) -> Result<(), Error> {
        if record_number.is_empty() || record_number.len() > 2 {
            return Err(Error::MalformedHeader("record number length"));
        }
        let mask = self.mask(ciphertext)?;
        for (b, m) in record_number.iter_mut().zip(&mask) {
            *b ^= m;
        }
        Ok(())
    }
}

fn first_byte_mask(first: u8) -> u8 {
    if first & LONG_HEADER_FORM != 0 {
        LONG_HEADER_MASK
    } else {
        SHORT_HEADER_MASK
    }
}

impl fmt::Debug for HeaderProtector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderProtector")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
