//! Header protection masks and CBC mode using RustCrypto.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncrypt, BlockEncryptMut, InnerIvInit, KeyInit};
use aes::{Aes128, Aes256};
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20::ChaCha20;
use zeroize::Zeroizing;

use crate::crypto::provider::{CbcCipher, HeaderProtectionCipher};
use crate::crypto::provider::{SupportedBlockCipher, SupportedHeaderProtection};
use crate::crypto::suite::{BlockAlgorithm, HeaderProtectionAlgorithm};

/// AES-ECB header protection (RFC 9001 Section 5.4.3).
#[derive(Debug)]
enum AesEcbMask {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl HeaderProtectionCipher for AesEcbMask {
    fn mask(&self, sample: &[u8; 16]) -> [u8; 16] {
        let mut block = GenericArray::clone_from_slice(sample);
        match self {
            AesEcbMask::Aes128(c) => c.encrypt_block(&mut block),
            AesEcbMask::Aes256(c) => c.encrypt_block(&mut block),
        }
        block.into()
    }
}

/// ChaCha20 header protection (RFC 9001 Section 5.4.4).
struct ChaCha20Mask(Zeroizing<[u8; 32]>);

impl std::fmt::Debug for ChaCha20Mask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ChaCha20Mask").finish()
    }
}

impl HeaderProtectionCipher for ChaCha20Mask {
    fn mask(&self, sample: &[u8; 16]) -> [u8; 16] {
        // counter = sample[0..4] little endian, nonce = sample[4..16]
        let counter = u32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]);
        let mut cipher = ChaCha20::new(
            GenericArray::from_slice(&self.0[..]),
            GenericArray::from_slice(&sample[4..]),
        );
        cipher.seek(counter as u64 * 64);
        let mut mask = [0u8; 16];
        cipher.apply_keystream(&mut mask);
        mask
    }
}

#[derive(Debug)]
struct MaskFactory(HeaderProtectionAlgorithm);

impl SupportedHeaderProtection for MaskFactory {
    fn algorithm(&self) -> HeaderProtectionAlgorithm {
        self.0
    }

    fn create_mask_cipher(&self, key: &[u8]) -> Result<Box<dyn HeaderProtectionCipher>, String> {
        if key.len() != self.0.key_len() {
            return Err(format!(
                "Invalid header protection key size for {:?}: {}",
                self.0,
                key.len()
            ));
        }
        let invalid = |_| format!("Invalid header protection key for {:?}", self.0);
        Ok(match self.0 {
            HeaderProtectionAlgorithm::Aes128Ecb => Box::new(AesEcbMask::Aes128(
                Aes128::new_from_slice(key).map_err(invalid)?,
            )),
            HeaderProtectionAlgorithm::Aes256Ecb => Box::new(AesEcbMask::Aes256(
                Aes256::new_from_slice(key).map_err(invalid)?,
            )),
            HeaderProtectionAlgorithm::ChaCha20 => {
                let mut k = Zeroizing::new([0u8; 32]);
                k.copy_from_slice(key);
                Box::new(ChaCha20Mask(k))
            }
        })
    }
}

static AES_128_ECB: MaskFactory = MaskFactory(HeaderProtectionAlgorithm::Aes128Ecb);
static AES_256_ECB: MaskFactory = MaskFactory(HeaderProtectionAlgorithm::Aes256Ecb);
static CHACHA20: MaskFactory = MaskFactory(HeaderProtectionAlgorithm::ChaCha20);

pub(super) static ALL_HEADER_PROTECTION: &[&dyn SupportedHeaderProtection] =
    &[&AES_128_ECB, &AES_256_ECB, &CHACHA20];

/// AES-CBC without padding; the record layer pads.
#[derive(Debug)]
enum AesCbc {
    Aes128(Aes128),
    Aes256(Aes256),
}

fn check_block_aligned(iv: &[u8], data: &[u8]) -> Result<(), String> {
    if iv.len() != 16 {
        return Err(format!("Invalid CBC IV length: {}", iv.len()));
    }
    if data.len() % 16 != 0 {
        return Err(format!("CBC input not block aligned: {}", data.len()));
    }
    Ok(())
}

impl CbcCipher for AesCbc {
    fn encrypt(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String> {
        check_block_aligned(iv, data)?;
        let iv = GenericArray::from_slice(iv);
        match self {
            AesCbc::Aes128(c) => {
                let mut enc = cbc::Encryptor::<Aes128>::inner_iv_init(c.clone(), iv);
                for block in data.chunks_exact_mut(16) {
                    enc.encrypt_block_mut(GenericArray::from_mut_slice(block));
                }
            }
            AesCbc::Aes256(c) => {
                let mut enc = cbc::Encryptor::<Aes256>::inner_iv_init(c.clone(), iv);
                for block in data.chunks_exact_mut(16) {
                    enc.encrypt_block_mut(GenericArray::from_mut_slice(block));
                }
            }
        }
        Ok(())
    }

    fn decrypt(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String> {
        check_block_aligned(iv, data)?;
        let iv = GenericArray::from_slice(iv);
        match self {
            AesCbc::Aes128(c) => {
                let mut dec = cbc::Decryptor::<Aes128>::inner_iv_init(c.clone(), iv);
                for block in data.chunks_exact_mut(16) {
                    dec.decrypt_block_mut(GenericArray::from_mut_slice(block));
                }
            }
            AesCbc::Aes256(c) => {
                let mut dec = cbc::Decryptor::<Aes256>::inner_iv_init(c.clone(), iv);
                for block in data.chunks_exact_mut(16) {
                    dec.decrypt_block_mut(GenericArray::from_mut_slice(block));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct CbcFactory(BlockAlgorithm);

impl SupportedBlockCipher for CbcFactory {
    fn algorithm(&self) -> BlockAlgorithm {
        self.0
    }

    fn create_cbc(&self, key: &[u8]) -> Result<Box<dyn CbcCipher>, String> {
        let invalid = |_| format!("Invalid key size for {:?}: {}", self.0, key.len());
        Ok(match self.0 {
            BlockAlgorithm::Aes128Cbc => {
                Box::new(AesCbc::Aes128(Aes128::new_from_slice(key).map_err(invalid)?))
            }
            BlockAlgorithm::Aes256Cbc => {
                Box::new(AesCbc::Aes256(Aes256::new_from_slice(key).map_err(invalid)?))
            }
        })
    }
}

static AES_128_CBC: CbcFactory = CbcFactory(BlockAlgorithm::Aes128Cbc);
static AES_256_CBC: CbcFactory = CbcFactory(BlockAlgorithm::Aes256Cbc);

pub(super) static ALL_BLOCK_CIPHERS: &[&dyn SupportedBlockCipher] = &[&AES_128_CBC, &AES_256_CBC];
