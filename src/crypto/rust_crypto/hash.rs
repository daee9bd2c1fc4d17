//! Hash implementations using RustCrypto.

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384};

use crate::buffer::Buf;
use crate::crypto::provider::{HashContext, HashProvider};
use crate::types::HashAlgorithm;

/// Hash context implementation using RustCrypto.
#[derive(Debug, Clone)]
enum RustCryptoHashContext {
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
}

impl HashContext for RustCryptoHashContext {
    fn update(&mut self, data: &[u8]) {
        match self {
            RustCryptoHashContext::Sha1(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha256(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha384(ctx) => ctx.update(data),
        }
    }

    fn clone_and_finalize(&self, out: &mut Buf) {
        out.clear();
        match self.clone() {
            RustCryptoHashContext::Sha1(ctx) => out.extend_from_slice(&ctx.finalize()),
            RustCryptoHashContext::Sha256(ctx) => out.extend_from_slice(&ctx.finalize()),
            RustCryptoHashContext::Sha384(ctx) => out.extend_from_slice(&ctx.finalize()),
        }
    }
}

/// Hash provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHashProvider;

impl HashProvider for RustCryptoHashProvider {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext> {
        match algorithm {
            HashAlgorithm::SHA1 => Box::new(RustCryptoHashContext::Sha1(Sha1::new())),
            HashAlgorithm::SHA256 => Box::new(RustCryptoHashContext::Sha256(Sha256::new())),
            HashAlgorithm::SHA384 => Box::new(RustCryptoHashContext::Sha384(Sha384::new())),
        }
    }
}

/// Static instance of the hash provider.
pub(super) static HASH_PROVIDER: RustCryptoHashProvider = RustCryptoHashProvider;

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn finalize_leaves_context_usable() {
        let mut ctx = HASH_PROVIDER.create_hash(HashAlgorithm::SHA256);
        let mut out = Buf::new();
        ctx.clone_and_finalize(&mut out);
        assert_eq!(
            &*out,
            &hex!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );

        ctx.update(b"abc");
        ctx.clone_and_finalize(&mut out);
        assert_eq!(
            &*out,
            &hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn output_lengths() {
        for alg in [HashAlgorithm::SHA1, HashAlgorithm::SHA256, HashAlgorithm::SHA384] {
            let mut out = Buf::new();
            HASH_PROVIDER.create_hash(alg).clone_and_finalize(&mut out);
            assert_eq!(out.len(), alg.output_len());
        }
    }
}
