//! AEAD implementations using RustCrypto.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use ccm::consts::{U12, U16, U8};
use ccm::Ccm;
use chacha20poly1305::ChaCha20Poly1305;

use crate::buffer::{Buf, TmpBuf};
use crate::crypto::aead::Nonce;
use crate::crypto::provider::{Cipher, SupportedAead};
use crate::crypto::suite::AeadAlgorithm;

type Aes128Ccm = Ccm<aes::Aes128, U16, U12>;
type Aes128Ccm8 = Ccm<aes::Aes128, U8, U12>;

/// All AEADs share the 12 byte nonce and the in-place API, so one enum covers them.
enum RustCryptoAead {
    Aes128Gcm(Box<Aes128Gcm>),
    Aes256Gcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
    Aes128Ccm(Box<Aes128Ccm>),
    Aes128Ccm8(Box<Aes128Ccm8>),
}

impl std::fmt::Debug for RustCryptoAead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RustCryptoAead::Aes128Gcm(_) => "RustCryptoAead::Aes128Gcm",
            RustCryptoAead::Aes256Gcm(_) => "RustCryptoAead::Aes256Gcm",
            RustCryptoAead::ChaCha20Poly1305(_) => "RustCryptoAead::ChaCha20Poly1305",
            RustCryptoAead::Aes128Ccm(_) => "RustCryptoAead::Aes128Ccm",
            RustCryptoAead::Aes128Ccm8(_) => "RustCryptoAead::Aes128Ccm8",
        };
        f.debug_tuple(name).finish()
    }
}

fn invalid_key(alg: AeadAlgorithm, len: usize) -> String {
    format!("Invalid key size for {:?}: {}", alg, len)
}

impl RustCryptoAead {
    fn new(alg: AeadAlgorithm, key: &[u8]) -> Result<Self, String> {
        if key.len() != alg.key_len() {
            return Err(invalid_key(alg, key.len()));
        }
        let e = |_| invalid_key(alg, key.len());
        Ok(match alg {
            AeadAlgorithm::Aes128Gcm => {
                RustCryptoAead::Aes128Gcm(Box::new(Aes128Gcm::new_from_slice(key).map_err(e)?))
            }
            AeadAlgorithm::Aes256Gcm => {
                RustCryptoAead::Aes256Gcm(Box::new(Aes256Gcm::new_from_slice(key).map_err(e)?))
            }
            AeadAlgorithm::ChaCha20Poly1305 => RustCryptoAead::ChaCha20Poly1305(Box::new(
                ChaCha20Poly1305::new_from_slice(key).map_err(e)?,
            )),
            AeadAlgorithm::Aes128Ccm => {
                RustCryptoAead::Aes128Ccm(Box::new(Aes128Ccm::new_from_slice(key).map_err(e)?))
            }
            AeadAlgorithm::Aes128Ccm8 => {
                RustCryptoAead::Aes128Ccm8(Box::new(Aes128Ccm8::new_from_slice(key).map_err(e)?))
            }
        })
    }
}

impl Cipher for RustCryptoAead {
    fn encrypt(&mut self, data: &mut Buf, aad: &[u8], nonce: Nonce) -> Result<(), String> {
        let n = GenericArray::<u8, U12>::from_slice(&nonce.0);
        let result = match self {
            RustCryptoAead::Aes128Gcm(c) => c.encrypt_in_place(n, aad, data),
            RustCryptoAead::Aes256Gcm(c) => c.encrypt_in_place(n, aad, data),
            RustCryptoAead::ChaCha20Poly1305(c) => c.encrypt_in_place(n, aad, data),
            RustCryptoAead::Aes128Ccm(c) => c.encrypt_in_place(n, aad, data),
            RustCryptoAead::Aes128Ccm8(c) => c.encrypt_in_place(n, aad, data),
        };
        result.map_err(|_| format!("{:?} encryption failed", self))
    }

    fn decrypt(
        &mut self,
        ciphertext: &mut TmpBuf,
        aad: &[u8],
        nonce: Nonce,
    ) -> Result<(), String> {
        let n = GenericArray::<u8, U12>::from_slice(&nonce.0);
        // decrypt_in_place verifies and strips the tag, shortening the buffer.
        let result = match self {
            RustCryptoAead::Aes128Gcm(c) => c.decrypt_in_place(n, aad, ciphertext),
            RustCryptoAead::Aes256Gcm(c) => c.decrypt_in_place(n, aad, ciphertext),
            RustCryptoAead::ChaCha20Poly1305(c) => c.decrypt_in_place(n, aad, ciphertext),
            RustCryptoAead::Aes128Ccm(c) => c.decrypt_in_place(n, aad, ciphertext),
            RustCryptoAead::Aes128Ccm8(c) => c.decrypt_in_place(n, aad, ciphertext),
        };
        result.map_err(|_| format!("{:?} decryption failed", self))
    }
}

/// Factory for one AEAD algorithm.
#[derive(Debug)]
struct AeadFactory(AeadAlgorithm);

impl SupportedAead for AeadFactory {
    fn algorithm(&self) -> AeadAlgorithm {
        self.0
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        Ok(Box::new(RustCryptoAead::new(self.0, key)?))
    }
}

static AES_128_GCM: AeadFactory = AeadFactory(AeadAlgorithm::Aes128Gcm);
static AES_256_GCM: AeadFactory = AeadFactory(AeadAlgorithm::Aes256Gcm);
static CHACHA20_POLY1305: AeadFactory = AeadFactory(AeadAlgorithm::ChaCha20Poly1305);
static AES_128_CCM: AeadFactory = AeadFactory(AeadAlgorithm::Aes128Ccm);
static AES_128_CCM_8: AeadFactory = AeadFactory(AeadAlgorithm::Aes128Ccm8);

/// All supported AEAD algorithms.
pub(super) static ALL_AEADS: &[&dyn SupportedAead] = &[
    &AES_128_GCM,
    &AES_256_GCM,
    &CHACHA20_POLY1305,
    &AES_128_CCM,
    &AES_128_CCM_8,
];

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn gcm_known_answer() {
        // NIST GCM test case 2: zero key, zero IV, one zero block.
        let mut cipher = RustCryptoAead::new(AeadAlgorithm::Aes128Gcm, &[0u8; 16]).unwrap();
        let mut data = Buf::from_slice(&[0u8; 16]);
        cipher.encrypt(&mut data, &[], Nonce([0u8; 12])).unwrap();
        assert_eq!(
            &*data,
            &hex!("0388dace60b6a392f328c2b971b2fe78 ab6e47d42cec13bdf53a67b21257bddf")
        );
    }

    #[test]
    fn tag_lengths_match_algorithm() {
        for factory in ALL_AEADS {
            let alg = factory.algorithm();
            let mut cipher = factory.create_cipher(&vec![7u8; alg.key_len()]).unwrap();
            let mut data = Buf::from_slice(b"hello");
            cipher.encrypt(&mut data, b"ad", Nonce([1u8; 12])).unwrap();
            assert_eq!(data.len(), 5 + alg.tag_len(), "{:?}", alg);

            let mut backing = data.into_vec();
            let mut tmp = TmpBuf::new(&mut backing);
            cipher.decrypt(&mut tmp, b"ad", Nonce([1u8; 12])).unwrap();
            assert_eq!(tmp.as_ref(), b"hello");
        }
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        assert!(RustCryptoAead::new(AeadAlgorithm::ChaCha20Poly1305, &[0u8; 16]).is_err());
    }
}
