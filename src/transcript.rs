//! Running hash over the handshake messages.

use std::fmt;

use crate::buffer::Buf;
use crate::crypto::{HashContext, HashProvider};
use crate::types::HashAlgorithm;
use crate::Error;

/// Handshake type of the synthetic message replacing ClientHello1 (RFC 8446 Section 4.4.1).
const MESSAGE_HASH: u8 = 254;

/// Transcript hash accumulator.
///
/// Messages are fed in wire order, header included.
pub struct Transcript {
    provider: &'static dyn HashProvider,
    hash: HashAlgorithm,
    ctx: Box<dyn HashContext>,
    messages: usize,
    retried: bool,
}

impl Transcript {
    pub fn new(provider: &'static dyn HashProvider, hash: HashAlgorithm) -> Self {
        Transcript {
            provider,
            hash,
            ctx: provider.create_hash(hash),
            messages: 0,
            retried: false,
        }
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    /// Feed one handshake message.
    pub fn update(&mut self, message: &[u8]) {
        self.ctx.update(message);
        self.messages += 1;
    }

    /// Current digest. Does not disturb the running state.
    pub fn snapshot(&self) -> Buf {
        let mut out = Buf::new();
        self.ctx.clone_and_finalize(&mut out);
        out
    }

    /// Number of messages fed so far (the synthetic message counts as one).
    pub fn message_count(&self) -> usize {
        self.messages
    }

    /// Replace ClientHello1 with `message_hash` after a HelloRetryRequest.
    ///
    /// The transcript must contain exactly `first_client_hello` and nothing
    /// else, and the substitution may only happen once per session.
    pub fn reset_for_retry(&mut self, first_client_hello: &[u8]) -> Result<(), Error> {
        if self.retried {
            return Err(Error::TranscriptMisuse("retry substitution already applied"));
        }
        if self.messages != 1 {
            return Err(Error::TranscriptMisuse(
                "transcript must hold exactly ClientHello1",
            ));
        }

        let mut ch1 = self.provider.create_hash(self.hash);
        ch1.update(first_client_hello);
        let mut ch1_hash = Buf::new();
        ch1.clone_and_finalize(&mut ch1_hash);

        if ch1_hash != self.snapshot() {
            return Err(Error::TranscriptMisuse(
                "ClientHello1 does not match the transcript",
            ));
        }

        let mut ctx = self.provider.create_hash(self.hash);
        ctx.update(&[MESSAGE_HASH, 0, 0, ch1_hash.len() as u8]);
        ctx.update(&ch1_hash);

        self.ctx = ctx;
        self.messages = 1;
        self.retried = true;
        debug!("Transcript reset for HelloRetryRequest");
        Ok(())
    }
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript")
            .field("hash", &self.hash)
            .field("messages", &self.messages)
            .field("retried", &self.retried)
            .finish()
    }
}
