use thiserror::Error;

use crate::crypto::CipherSuite;
use crate::types::{Direction, HandshakeStatus, SecretId};

/// Errors produced by the transport security core.
///
/// All of these are fatal for the operation that produced them. For QUIC and
/// DTLS a `MalformedVarint`, `MalformedHeader`, `AuthenticationFailed` or
/// `Replayed` on receive only means the datagram should be dropped; whether
/// the connection survives is decided by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Unsupported cipher suite {0:?}")]
    UnsupportedSuite(CipherSuite),

    /// Tag, MAC or padding check failed. Deliberately carries no detail.
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Record too large ({0} > {1})")]
    RecordTooLarge(usize, usize),

    #[error("Sequence number space exhausted for {0:?}")]
    SequenceExhausted(Direction),

    #[error("Malformed varint")]
    MalformedVarint,

    #[error("Malformed header: {0}")]
    MalformedHeader(&'static str),

    #[error("No secret installed for {0}")]
    MissingSecret(SecretId),

    #[error("Invalid transition for {0:?}: {1:?} -> {2:?}")]
    InvalidTransition(Direction, HandshakeStatus, HandshakeStatus),

    #[error("Transcript misuse: {0}")]
    TranscriptMisuse(&'static str),

    #[error("Replayed record sequence {0}")]
    Replayed(u64),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Crypto error: {0}")]
    CryptoError(String),
}
