//! transec
//!
//! The cryptographic core TLS 1.2, TLS 1.3, DTLS 1.2, DTLS 1.3 and QUIC have in
//! common: the key schedule, record protection with AEAD and CBC suites, QUIC
//! packet and header protection, and DTLS record number encryption.
//!
//! The handshake state machines, message codecs and certificate handling live
//! elsewhere. A caller drives a [`Session`] with the handshake's outcomes
//! (shared secrets, transcript messages, status changes) and uses it to seal
//! and open records or packets.
//!
//! ```
//! use std::sync::Arc;
//! use transec::{Config, ContentType, Direction, HandshakeStatus, Role, Session};
//! use transec::crypto::Buf;
//!
//! let config = Arc::new(Config::default());
//! let mut client = Session::new(config.clone(), Role::Client).unwrap();
//! let mut server = Session::new(config, Role::Server).unwrap();
//!
//! for session in [&mut client, &mut server] {
//!     session.update_transcript(b"ClientHello");
//!     session.update_transcript(b"ServerHello");
//!     session.derive_handshake(&[0x42; 32]).unwrap();
//!     session
//!         .set_status(Direction::ClientToServer, HandshakeStatus::Handshake)
//!         .unwrap();
//! }
//!
//! let mut record = Buf::new();
//! client
//!     .seal_record(Direction::ClientToServer, ContentType::Handshake, b"Finished", &mut record)
//!     .unwrap();
//!
//! let opened = server
//!     .open_record(Direction::ClientToServer, &mut record)
//!     .unwrap();
//! assert_eq!(opened.content_type, ContentType::Handshake);
//! assert_eq!(&record[opened.payload], b"Finished");
//! ```
//!
//! # Cryptography
//!
//! All primitives go through a [`crypto::CryptoProvider`]. The default is
//! backed by the RustCrypto crates; a different provider can be passed with
//! [`ConfigBuilder::with_crypto_provider`] or installed process wide with
//! [`crypto::CryptoProvider::install_default`].
//!
//! Secrets are zeroized when dropped and never appear in `Debug` output. The
//! only way to see them is an explicit [`KeyLog`].
#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

#[macro_use]
extern crate log;

mod buffer;
mod error;
pub use error::Error;

mod config;
pub use config::{Config, ConfigBuilder, DEFAULT_MAX_CIPHERTEXT_LEN};

pub mod crypto;
pub use crypto::CipherSuite;

mod types;
pub use types::{ContentType, Direction, Epoch, HandshakeStatus, HashAlgorithm};
pub use types::{ProtocolVersion, Purpose, QuicVersion, Role, SecretId};

mod keylog;
pub use keylog::{KeyLog, NoKeyLog};

mod secret;
pub use secret::{Secret, SecretStore};

mod transcript;
pub use transcript::Transcript;

mod key_schedule;
pub use key_schedule::{KeySchedule, QUIC_INITIAL_SUITE};

pub mod varint;

mod header_protection;
pub use header_protection::HeaderProtector;

pub mod record;

pub mod packet;

mod window;
pub use window::ReplayWindow;

mod session;
pub use session::{OpenedPacket, OpenedRecord, Session};
