//! Secret values and the per-session secret table.
//!
//! Entries are immutable once inserted. An epoch transition or key update
//! replaces the `Arc` under the same [`SecretId`]; readers holding the old
//! `Arc` keep a valid copy until they drop it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::types::{Epoch, Role, SecretId};
use crate::Error;

/// Opaque secret bytes, wiped on drop.
pub struct Secret(Vec<u8>);

impl Secret {
    pub(crate) fn new(bytes: &[u8]) -> Self {
        Secret(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl ConstantTimeEq for Secret {
    fn ct_eq(&self, other: &Self) -> subtle::Choice {
        self.0.as_slice().ct_eq(other.0.as_slice())
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for Secret {}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret").field("len", &self.0.len()).finish()
    }
}

/// Keyed table of the secrets of one session.
#[derive(Debug, Default)]
pub struct SecretStore {
    entries: HashMap<SecretId, Arc<Secret>>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a secret, superseding any previous value under `id`.
    pub(crate) fn insert(&mut self, id: SecretId, bytes: &[u8]) -> Arc<Secret> {
        let secret = Arc::new(Secret::new(bytes));
        if self.entries.insert(id, secret.clone()).is_some() {
            trace!("Superseded {}", id);
        } else {
            trace!("Installed {}", id);
        }
        secret
    }

    /// Fetch a secret.
    ///
    /// Callers must re-fetch after an epoch transition instead of caching.
    pub fn get(&self, id: SecretId) -> Result<Arc<Secret>, Error> {
        self.entries
            .get(&id)
            .cloned()
            .ok_or(Error::MissingSecret(id))
    }

    pub fn contains(&self, id: SecretId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Drop every secret of `(role, epoch)`. Returns how many were removed.
    pub(crate) fn retire(&mut self, role: Role, epoch: Epoch) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|id, _| !(id.role == role && id.epoch == epoch));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Retired {} secrets of {:?} {:?}", removed, role, epoch);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
