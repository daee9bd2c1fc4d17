//! Per-record AEAD nonce and additional data construction.
//!
//! These are separate from the pluggable provider: a provider only ever sees
//! the finished nonce and AAD bytes.

use std::ops::Deref;

use arrayvec::ArrayVec;

use crate::types::ContentType;

/// Length of every AEAD nonce used by the supported suites.
pub const NONCE_LEN: usize = 12;

/// Explicit nonce carried on the wire by TLS 1.2 GCM records.
pub(crate) const EXPLICIT_NONCE_LEN: usize = 8;

/// Full AEAD nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_LEN]);

impl Nonce {
    /// TLS 1.2 GCM nonce: 4 byte implicit IV followed by the explicit part (RFC 5288).
    pub(crate) fn new(fixed_iv: &[u8; 4], explicit_nonce: &[u8; EXPLICIT_NONCE_LEN]) -> Self {
        let mut nonce = [0u8; NONCE_LEN];
        nonce[..4].copy_from_slice(fixed_iv);
        nonce[4..].copy_from_slice(explicit_nonce);
        Self(nonce)
    }

    /// Nonce as the IV XORed with the left-padded sequence number.
    ///
    /// Used by TLS 1.3 (RFC 8446 Section 5.3), DTLS 1.3, QUIC (packet number in
    /// place of the sequence) and TLS 1.2 ChaCha20-Poly1305 (RFC 7905).
    pub(crate) fn xor(iv: &[u8; NONCE_LEN], seq: u64) -> Self {
        let mut nonce = *iv;
        for (n, s) in nonce[4..].iter_mut().zip(seq.to_be_bytes()) {
            *n ^= s;
        }
        Self(nonce)
    }
}

impl Deref for Nonce {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Additional data for TLS 1.2 family records.
///
/// `seq_num(8) || type(1) || version(2) || length(2)` (RFC 5246 Section 6.2.3.3).
/// For DTLS 1.2 the sequence carries the epoch in its top 16 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aad(pub ArrayVec<u8, 13>);

impl Aad {
    pub(crate) fn new_tls12(seq: u64, content_type: u8, version: [u8; 2], length: u16) -> Self {
        let mut aad = ArrayVec::new();
        aad.extend(seq.to_be_bytes());
        aad.push(content_type);
        aad.extend(version);
        aad.extend(length.to_be_bytes());
        Aad(aad)
    }

    /// Same as [`Aad::new_tls12`] with a typed content type.
    pub fn for_record(seq: u64, content_type: ContentType, version: [u8; 2], length: u16) -> Self {
        Self::new_tls12(seq, content_type.as_u8(), version, length)
    }
}

impl Deref for Aad {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
