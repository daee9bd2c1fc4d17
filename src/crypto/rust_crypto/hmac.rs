//! HMAC utilities using RustCrypto.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha384};

use crate::buffer::Buf;
use crate::crypto::provider::HmacProvider;
use crate::types::HashAlgorithm;

fn hmac_parts<M: Mac + hmac::digest::KeyInit>(
    key: &[u8],
    parts: &[&[u8]],
    out: &mut Buf,
) -> Result<(), String> {
    let mut mac =
        <M as hmac::digest::KeyInit>::new_from_slice(key).map_err(|_| "Invalid HMAC key length")?;
    for part in parts {
        mac.update(part);
    }
    out.extend_from_slice(&mac.finalize().into_bytes());
    Ok(())
}

/// HMAC over the concatenation of `parts`, appended to `out`.
pub(super) fn hmac_concat(
    hash: HashAlgorithm,
    key: &[u8],
    parts: &[&[u8]],
    out: &mut Buf,
) -> Result<(), String> {
    match hash {
        HashAlgorithm::SHA1 => hmac_parts::<Hmac<Sha1>>(key, parts, out),
        HashAlgorithm::SHA256 => hmac_parts::<Hmac<Sha256>>(key, parts, out),
        HashAlgorithm::SHA384 => hmac_parts::<Hmac<Sha384>>(key, parts, out),
    }
}

/// TLS 1.2 P_hash (RFC 5246 Section 5).
pub(super) fn p_hash(
    hash: HashAlgorithm,
    secret: &[u8],
    full_seed: &[u8],
    out: &mut Buf,
    output_len: usize,
) -> Result<(), String> {
    out.clear();

    // A(1) = HMAC_hash(secret, A(0)) where A(0) = seed
    let mut a = Buf::new();
    hmac_concat(hash, secret, &[full_seed], &mut a)?;

    let mut block = Buf::new();
    while out.len() < output_len {
        // HMAC_hash(secret, A(i) + seed)
        block.clear();
        hmac_concat(hash, secret, &[&a, full_seed], &mut block)?;

        let to_copy = (output_len - out.len()).min(block.len());
        out.extend_from_slice(&block[..to_copy]);

        if out.len() < output_len {
            // A(i+1) = HMAC_hash(secret, A(i))
            let mut next = Buf::new();
            hmac_concat(hash, secret, &[&a], &mut next)?;
            a = next;
        }
    }

    Ok(())
}

/// HMAC provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHmacProvider;

impl HmacProvider for RustCryptoHmacProvider {
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        data: &[u8],
        out: &mut Buf,
    ) -> Result<(), String> {
        out.clear();
        hmac_concat(hash, key, &[data], out)
    }
}

/// Static instance of the HMAC provider.
pub(super) static HMAC_PROVIDER: RustCryptoHmacProvider = RustCryptoHmacProvider;
