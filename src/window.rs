/// Sliding anti-replay window for DTLS record sequence numbers (RFC 9147 Section 4.5.1).
///
/// Tracks the highest accepted sequence number and a bitmap of the 64 below
/// it. Each epoch owns its own window.
///
/// A record must be checked with [`ReplayWindow::is_fresh`] before it is
/// decrypted and only [marked](ReplayWindow::mark) once it authenticated,
/// so forged records cannot advance the window.
#[derive(Debug, Default, Clone)]
pub struct ReplayWindow {
    max_seq: u64,
    window: u64,
}

const WINDOW_BITS: u64 = 64;

impl ReplayWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `seqno` is neither a duplicate nor too old. Does not update state.
    pub fn is_fresh(&self, seqno: u64) -> bool {
        if seqno > self.max_seq {
            return true;
        }
        let offset = self.max_seq - seqno;
        offset < WINDOW_BITS && self.window & (1u64 << offset) == 0
    }

    /// Record `seqno` as seen.
    pub fn mark(&mut self, seqno: u64) {
        if seqno > self.max_seq {
            let delta = seqno - self.max_seq;
            self.window = if delta >= WINDOW_BITS {
                0
            } else {
                self.window << delta
            };
            self.window |= 1;
            self.max_seq = seqno;
        } else {
            let offset = self.max_seq - seqno;
            if offset < WINDOW_BITS {
                self.window |= 1u64 << offset;
            }
        }
    }

    /// Check and mark in one step. Returns true if `seqno` was fresh.
    pub fn check_and_update(&mut self, seqno: u64) -> bool {
        if !self.is_fresh(seqno) {
            return false;
        }
        self.mark(seqno);
        true
    }

    /// Highest sequence number marked so far.
    pub fn max_seq(&self) -> u64 {
        self.max_seq
    }
}
