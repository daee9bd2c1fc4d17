//! Cryptographic primitives collaborator: provider traits, the suite table
//! and per-record nonce/AAD construction.

mod aead;
pub mod provider;
pub mod rust_crypto;
mod suite;

pub use aead::{Aad, Nonce, NONCE_LEN};
pub(crate) use aead::EXPLICIT_NONCE_LEN;

pub use provider::{Cipher, CryptoProvider, CryptoSafe, HashContext, HashProvider};
pub use provider::{CbcCipher, HeaderProtectionCipher, HkdfProvider, HmacProvider};
pub use provider::{PrfProvider, SecureRandom};
pub use provider::{SupportedAead, SupportedBlockCipher, SupportedHeaderProtection};

pub use suite::{AeadAlgorithm, BlockAlgorithm, CipherMode, CipherSuite};
pub use suite::{HeaderProtectionAlgorithm, MacAlgorithm, SuiteDescriptor, SuiteFamily};

pub use crate::buffer::{Buf, TmpBuf};
pub use crate::types::HashAlgorithm;
