//! Key schedule (RFC 8446 Section 7.1) for TLS 1.3, DTLS 1.3 and QUIC, plus
//! the TLS 1.2 PRF key block.
//!
//! ```text
//!              0
//!              |
//!              v
//!    PSK ->  HKDF-Extract = Early Secret
//!              |
//!              +-----> Derive-Secret(., "c e traffic", ClientHello)
//!              |                     = client_early_traffic_secret
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    (EC)DHE -> HKDF-Extract = Handshake Secret
//!              |
//!              +-----> Derive-Secret(., "c hs traffic" / "s hs traffic",
//!              |                     ClientHello...ServerHello)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    0 -> HKDF-Extract = Master Secret
//!              |
//!              +-----> Derive-Secret(., "c ap traffic" / "s ap traffic",
//!              |                     ClientHello...server Finished)
//!              +-----> Derive-Secret(., "exp master", ClientHello...server Finished)
//!              +-----> Derive-Secret(., "res master", ClientHello...client Finished)
//! ```
//!
//! Every traffic secret is expanded into a record key, a record IV and, for
//! DTLS 1.3 and QUIC, a header protection key. All of them land in the
//! [`SecretStore`]; nothing is handed back to the caller.

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::crypto::{CipherSuite, CryptoProvider, SuiteDescriptor, SuiteFamily};
use crate::keylog::{self, KeyLog};
use crate::secret::{Secret, SecretStore};
use crate::types::{Epoch, HashAlgorithm, ProtocolVersion, Purpose, Role, SecretId};
use crate::Error;

/// TLS 1.2 master secret length.
const TLS12_MASTER_LEN: usize = 48;

/// TLS 1.2 Finished verify_data length.
const TLS12_VERIFY_DATA_LEN: usize = 12;

/// Suite protecting QUIC Initial packets, whatever is negotiated later (RFC 9001 Section 5.2).
pub const QUIC_INITIAL_SUITE: CipherSuite = CipherSuite::TLS_AES_128_GCM_SHA256;

/// Key schedule of one session.
pub struct KeySchedule {
    provider: CryptoProvider,
    suite: &'static SuiteDescriptor,
    version: ProtocolVersion,
    early: Option<Secret>,
    handshake: Option<Secret>,
    master: Option<Secret>,
    exporter: Option<Secret>,
    resumption: Option<Secret>,
    tls12_master: Option<Secret>,
    /// Key update count per role (client, server).
    generation: [u64; 2],
    key_log: Option<Arc<dyn KeyLog>>,
    client_random: Vec<u8>,
    server_random: Vec<u8>,
}

fn role_index(role: Role) -> usize {
    match role {
        Role::Client => 0,
        Role::Server => 1,
    }
}

impl KeySchedule {
    /// Create a key schedule for a negotiated suite.
    ///
    /// Fails with `UnsupportedSuite` for an unknown suite or one that does not
    /// belong to `version`.
    pub fn new(
        provider: CryptoProvider,
        suite: CipherSuite,
        version: ProtocolVersion,
    ) -> Result<Self, Error> {
        let descriptor = suite
            .descriptor()
            .filter(|d| d.supports(version))
            .ok_or(Error::UnsupportedSuite(suite))?;

        Ok(KeySchedule {
            provider,
            suite: descriptor,
            version,
            early: None,
            handshake: None,
            master: None,
            exporter: None,
            resumption: None,
            tls12_master: None,
            generation: [0; 2],
            key_log: None,
            client_random: Vec::new(),
            server_random: Vec::new(),
        })
    }

    pub(crate) fn set_key_log(&mut self, key_log: Option<Arc<dyn KeyLog>>) {
        self.key_log = key_log;
    }

    /// ClientHello random, used to label key log lines and by the TLS 1.2 PRF.
    pub fn set_client_random(&mut self, random: &[u8]) {
        self.client_random = random.to_vec();
    }

    /// ServerHello random, used by the TLS 1.2 PRF.
    pub fn set_server_random(&mut self, random: &[u8]) {
        self.server_random = random.to_vec();
    }

    pub fn suite(&self) -> &'static SuiteDescriptor {
        self.suite
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Key updates applied to `role` so far.
    pub fn generation(&self, role: Role) -> u64 {
        self.generation[role_index(role)]
    }

    /// Suite whose keys protect `epoch`.
    pub fn suite_for_epoch(&self, epoch: Epoch) -> Result<&'static SuiteDescriptor, Error> {
        if epoch == Epoch::Initial && self.version.is_quic() {
            return QUIC_INITIAL_SUITE
                .descriptor()
                .ok_or(Error::UnsupportedSuite(QUIC_INITIAL_SUITE));
        }
        Ok(self.suite)
    }

    // ------------------------------------------------------------------
    // HKDF helpers
    // ------------------------------------------------------------------

    fn hash(&self) -> HashAlgorithm {
        self.suite.hash
    }

    fn extract(&self, hash: HashAlgorithm, salt: &[u8], ikm: &[u8]) -> Result<Secret, Error> {
        let mut out = Buf::new();
        self.provider
            .hkdf_provider
            .hkdf_extract(hash, salt, ikm, &mut out)
            .map_err(|e| Error::CryptoError(format!("HKDF-Extract failed: {}", e)))?;
        let secret = Secret::new(&out);
        out.fill(0);
        Ok(secret)
    }

    fn expand_label(
        &self,
        hash: HashAlgorithm,
        secret: &[u8],
        label: &[u8],
        context: &[u8],
        len: usize,
    ) -> Result<Buf, Error> {
        let mut out = Buf::new();
        self.provider
            .hkdf_provider
            .hkdf_expand_label(
                hash,
                secret,
                self.version.label_prefix(),
                label,
                context,
                &mut out,
                len,
            )
            .map_err(|e| {
                Error::CryptoError(format!(
                    "HKDF-Expand-Label({}) failed: {}",
                    String::from_utf8_lossy(label),
                    e
                ))
            })?;
        Ok(out)
    }

    /// Derive-Secret(secret, label, messages) given the transcript hash of messages.
    fn derive_secret(&self, secret: &[u8], label: &[u8], hash_of_messages: &[u8]) -> Result<Buf, Error> {
        self.expand_label(
            self.hash(),
            secret,
            label,
            hash_of_messages,
            self.hash().output_len(),
        )
    }

    /// Derive-Secret(secret, "derived", "")
    fn derived(&self, secret: &[u8]) -> Result<Buf, Error> {
        let empty = self.provider.hash(self.hash(), &[]);
        self.derive_secret(secret, b"derived", &empty)
    }

    fn require_tls13(&self) -> Result<(), Error> {
        if self.suite.family != SuiteFamily::Tls13 {
            return Err(Error::UnsupportedSuite(self.suite.suite));
        }
        Ok(())
    }

    fn require_tls12(&self) -> Result<(), Error> {
        if self.suite.family != SuiteFamily::Tls12 {
            return Err(Error::UnsupportedSuite(self.suite.suite));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // TLS 1.3 secret chain
    // ------------------------------------------------------------------

    /// Early Secret = HKDF-Extract(0, PSK), zeros standing in for a missing PSK.
    pub fn extract_early(&mut self, psk: Option<&[u8]>) -> Result<(), Error> {
        self.require_tls13()?;
        let zeros = vec![0u8; self.hash().output_len()];
        let early = self.extract(self.hash(), &[], psk.unwrap_or(&zeros))?;
        self.early = Some(early);
        trace!("Early secret extracted (psk: {})", psk.is_some());
        Ok(())
    }

    /// Handshake Secret = HKDF-Extract(Derive-Secret(Early, "derived", ""), (EC)DHE)
    ///
    /// Extracts the early secret without a PSK if that has not happened yet.
    pub fn extract_handshake(&mut self, shared_secret: &[u8]) -> Result<(), Error> {
        self.require_tls13()?;
        if self.early.is_none() {
            self.extract_early(None)?;
        }
        let early = self.early.as_ref().map(|s| self.derived(s.as_bytes()));
        let salt = match early {
            Some(salt) => salt?,
            None => return Err(Error::CryptoError("early secret missing".to_string())),
        };
        let handshake = self.extract(self.hash(), &salt, shared_secret)?;
        self.handshake = Some(handshake);
        trace!("Handshake secret extracted");
        Ok(())
    }

    /// Master Secret = HKDF-Extract(Derive-Secret(Handshake, "derived", ""), 0)
    pub fn extract_master(&mut self) -> Result<(), Error> {
        self.require_tls13()?;
        let Some(handshake) = &self.handshake else {
            return Err(Error::MissingSecret(SecretId::new(
                Role::Client,
                Epoch::Handshake,
                Purpose::TrafficSecret,
            )));
        };
        let salt = self.derived(handshake.as_bytes())?;
        let zeros = vec![0u8; self.hash().output_len()];
        let master = self.extract(self.hash(), &salt, &zeros)?;
        self.master = Some(master);
        trace!("Master secret extracted");
        Ok(())
    }

    /// Derive the traffic secret of `(role, epoch)` and install its key, IV
    /// and header protection key into `store`.
    ///
    /// `context` is the transcript hash the epoch binds to (ClientHello for
    /// early data, ClientHello..ServerHello for handshake, ClientHello..server
    /// Finished for application). For the QUIC Initial epoch it is the
    /// client's first Destination Connection ID instead.
    pub fn derive(
        &mut self,
        store: &mut SecretStore,
        role: Role,
        epoch: Epoch,
        context: &[u8],
    ) -> Result<(), Error> {
        self.require_tls13()?;

        let missing = || Error::MissingSecret(SecretId::new(role, epoch, Purpose::TrafficSecret));

        let traffic = Zeroizing::new(match (epoch, role) {
            (Epoch::Initial, _) => {
                let Some(quic) = self.version.quic_version() else {
                    return Err(Error::ConfigError(format!(
                        "{:?} has no Initial epoch",
                        self.version
                    )));
                };
                let initial = self.extract(HashAlgorithm::SHA256, quic.initial_salt(), context)?;
                let label: &[u8] = match role {
                    Role::Client => b"client in",
                    Role::Server => b"server in",
                };
                self.expand_label(
                    HashAlgorithm::SHA256,
                    initial.as_bytes(),
                    label,
                    &[],
                    HashAlgorithm::SHA256.output_len(),
                )?
            }
            (Epoch::Early, Role::Client) => {
                let early = self.early.as_ref().ok_or_else(missing)?;
                self.derive_secret(early.as_bytes(), b"c e traffic", context)?
            }
            (Epoch::Early, Role::Server) => return Err(missing()),
            (Epoch::Handshake, _) => {
                let handshake = self.handshake.as_ref().ok_or_else(missing)?;
                let label: &[u8] = match role {
                    Role::Client => b"c hs traffic",
                    Role::Server => b"s hs traffic",
                };
                self.derive_secret(handshake.as_bytes(), label, context)?
            }
            (Epoch::Application, _) => {
                let master = self.master.as_ref().ok_or_else(missing)?;
                let label: &[u8] = match role {
                    Role::Client => b"c ap traffic",
                    Role::Server => b"s ap traffic",
                };
                self.derive_secret(master.as_bytes(), label, context)?
            }
        });

        if epoch == Epoch::Application {
            self.generation[role_index(role)] = 0;
        }
        self.install_traffic_secret(store, role, epoch, &traffic, true)?;
        debug!("Derived {:?} {:?} traffic keys", role, epoch);
        Ok(())
    }

    /// Extract the handshake secret and derive both handshake traffic secrets.
    pub fn derive_handshake(
        &mut self,
        store: &mut SecretStore,
        shared_secret: &[u8],
        transcript_hash: &[u8],
    ) -> Result<(), Error> {
        self.extract_handshake(shared_secret)?;
        self.derive(store, Role::Client, Epoch::Handshake, transcript_hash)?;
        self.derive(store, Role::Server, Epoch::Handshake, transcript_hash)
    }

    /// Extract the master secret, derive both application traffic secrets
    /// and the exporter master secret.
    pub fn derive_application(
        &mut self,
        store: &mut SecretStore,
        transcript_hash: &[u8],
    ) -> Result<(), Error> {
        self.extract_master()?;
        self.derive(store, Role::Client, Epoch::Application, transcript_hash)?;
        self.derive(store, Role::Server, Epoch::Application, transcript_hash)?;
        self.derive_exporter_master(transcript_hash)
    }

    /// exporter_master_secret = Derive-Secret(Master, "exp master", ClientHello..server Finished)
    pub fn derive_exporter_master(&mut self, transcript_hash: &[u8]) -> Result<(), Error> {
        let master = self.master.as_ref().ok_or(Error::MissingSecret(SecretId::new(
            Role::Server,
            Epoch::Application,
            Purpose::TrafficSecret,
        )))?;
        let exporter =
            Zeroizing::new(self.derive_secret(master.as_bytes(), b"exp master", transcript_hash)?);
        self.log(keylog::EXPORTER_SECRET, &exporter);
        self.exporter = Some(Secret::new(&exporter));
        Ok(())
    }

    /// resumption_master_secret = Derive-Secret(Master, "res master", ClientHello..client Finished)
    pub fn derive_resumption_master(&mut self, transcript_hash: &[u8]) -> Result<(), Error> {
        let master = self.master.as_ref().ok_or(Error::MissingSecret(SecretId::new(
            Role::Client,
            Epoch::Application,
            Purpose::TrafficSecret,
        )))?;
        let resumption =
            Zeroizing::new(self.derive_secret(master.as_bytes(), b"res master", transcript_hash)?);
        self.resumption = Some(Secret::new(&resumption));
        Ok(())
    }

    /// PSK for a NewSessionTicket (RFC 8446 Section 4.6.1).
    pub fn resumption_psk(&self, ticket_nonce: &[u8]) -> Result<Buf, Error> {
        let resumption = self
            .resumption
            .as_ref()
            .ok_or(Error::CryptoError("resumption master secret not derived".to_string()))?;
        self.expand_label(
            self.hash(),
            resumption.as_bytes(),
            b"resumption",
            ticket_nonce,
            self.hash().output_len(),
        )
    }

    /// Next generation of `role`'s application traffic secret.
    ///
    /// Uses `"traffic upd"` for TLS/DTLS and `"quic ku"`/`"quicv2 ku"` for QUIC.
    /// QUIC keeps its header protection key across key updates (RFC 9001 Section 6).
    pub fn key_update(&mut self, store: &mut SecretStore, role: Role) -> Result<(), Error> {
        let next = Zeroizing::new(self.next_traffic_secret(store, role)?);
        self.generation[role_index(role)] += 1;
        self.install_traffic_secret(
            store,
            role,
            Epoch::Application,
            &next,
            !self.version.is_quic(),
        )?;
        debug!(
            "Key update for {:?}, generation {}",
            role,
            self.generation(role)
        );
        Ok(())
    }

    /// Key and IV of the next application generation of `role`, without
    /// installing them.
    ///
    /// A QUIC receiver uses these to try a packet with a flipped key phase
    /// and only commits the update once the packet authenticates.
    pub fn next_packet_keys(&self, store: &SecretStore, role: Role) -> Result<(Buf, Buf), Error> {
        let next = Zeroizing::new(self.next_traffic_secret(store, role)?);
        let labels = self.version.protection_labels();
        let key = self.expand_label(self.hash(), &next, labels.key, &[], self.suite.key_len)?;
        let iv = self.expand_label(self.hash(), &next, labels.iv, &[], self.suite.iv_len)?;
        Ok((key, iv))
    }

    fn next_traffic_secret(&self, store: &SecretStore, role: Role) -> Result<Buf, Error> {
        self.require_tls13()?;
        let current = store.get(SecretId::new(role, Epoch::Application, Purpose::TrafficSecret))?;
        let label: &[u8] = match self.version.quic_version() {
            Some(quic) => quic.key_update_label(),
            None => b"traffic upd",
        };
        self.expand_label(
            self.hash(),
            current.as_bytes(),
            label,
            &[],
            self.hash().output_len(),
        )
    }

    /// Finished verify_data sent by `role`.
    ///
    /// TLS 1.3 family: HMAC(finished_key, transcript_hash) with the finished
    /// key expanded from `role`'s handshake traffic secret. TLS 1.2:
    /// PRF(master, "client finished" | "server finished", handshake_hash)[..12].
    pub fn finished_verify_data(
        &self,
        store: &SecretStore,
        role: Role,
        transcript_hash: &[u8],
    ) -> Result<Buf, Error> {
        if self.suite.family == SuiteFamily::Tls12 {
            let label = match role {
                Role::Client => "client finished",
                Role::Server => "server finished",
            };
            return self.prf_with_master(label, transcript_hash, TLS12_VERIFY_DATA_LEN);
        }

        let base = store.get(SecretId::new(role, Epoch::Handshake, Purpose::TrafficSecret))?;
        let finished_key = Zeroizing::new(self.expand_label(
            self.hash(),
            base.as_bytes(),
            b"finished",
            &[],
            self.hash().output_len(),
        )?);
        let mut verify_data = Buf::new();
        self.provider
            .hmac_provider
            .hmac(self.hash(), &finished_key, transcript_hash, &mut verify_data)
            .map_err(|e| Error::CryptoError(format!("Finished HMAC failed: {}", e)))?;
        Ok(verify_data)
    }

    /// Keying material exporter.
    ///
    /// TLS 1.3 family (RFC 8446 Section 7.5):
    ///
    /// ```text
    /// HKDF-Expand-Label(Derive-Secret(exporter_master, label, ""),
    ///                   "exporter", Hash(context), length)
    /// ```
    ///
    /// TLS 1.2 (RFC 5705): PRF(master, label, client_random || server_random
    /// [|| context_len || context], length).
    pub fn export_keying_material(
        &self,
        label: &[u8],
        context: Option<&[u8]>,
        length: usize,
    ) -> Result<Buf, Error> {
        if self.suite.family == SuiteFamily::Tls12 {
            let label = std::str::from_utf8(label)
                .map_err(|_| Error::CryptoError("Exporter label must be ASCII".to_string()))?;
            let mut seed = Vec::new();
            seed.extend_from_slice(&self.client_random);
            seed.extend_from_slice(&self.server_random);
            if let Some(context) = context {
                let len = u16::try_from(context.len())
                    .map_err(|_| Error::CryptoError("Exporter context too long".to_string()))?;
                seed.extend_from_slice(&len.to_be_bytes());
                seed.extend_from_slice(context);
            }
            return self.prf_with_master(label, &seed, length);
        }

        let exporter = self
            .exporter
            .as_ref()
            .ok_or(Error::CryptoError("exporter master secret not derived".to_string()))?;
        let empty = self.provider.hash(self.hash(), &[]);
        let secret = Zeroizing::new(self.derive_secret(exporter.as_bytes(), label, &empty)?);
        let context_hash = self.provider.hash(self.hash(), context.unwrap_or(&[]));
        self.expand_label(self.hash(), &secret, b"exporter", &context_hash, length)
    }

    // ------------------------------------------------------------------
    // TLS 1.2
    // ------------------------------------------------------------------

    fn prf(&self, secret: &[u8], label: &str, seed: &[u8], len: usize) -> Result<Buf, Error> {
        let mut out = Buf::new();
        let mut scratch = Buf::new();
        self.provider
            .prf_provider
            .prf_tls12(secret, label, seed, &mut out, len, &mut scratch, self.hash())
            .map_err(|e| Error::CryptoError(format!("PRF({}) failed: {}", label, e)))?;
        scratch.fill(0);
        Ok(out)
    }

    fn prf_with_master(&self, label: &str, seed: &[u8], len: usize) -> Result<Buf, Error> {
        let master = self
            .tls12_master
            .as_ref()
            .ok_or(Error::CryptoError("TLS 1.2 master secret not derived".to_string()))?;
        self.prf(master.as_bytes(), label, seed, len)
    }

    /// TLS 1.2 master secret from the pre-master secret.
    ///
    /// With `session_hash` the extended master secret (RFC 7627) is used,
    /// otherwise the randoms set via `set_client_random`/`set_server_random`.
    pub fn tls12_master_secret(
        &mut self,
        pre_master_secret: &[u8],
        session_hash: Option<&[u8]>,
    ) -> Result<(), Error> {
        self.require_tls12()?;
        let master = Zeroizing::new(match session_hash {
            Some(hash) => self.prf(
                pre_master_secret,
                "extended master secret",
                hash,
                TLS12_MASTER_LEN,
            )?,
            None => {
                let mut seed = Vec::with_capacity(64);
                seed.extend_from_slice(&self.client_random);
                seed.extend_from_slice(&self.server_random);
                self.prf(pre_master_secret, "master secret", &seed, TLS12_MASTER_LEN)?
            }
        });
        self.log(keylog::CLIENT_RANDOM, &master);
        self.tls12_master = Some(Secret::new(&master));
        trace!("TLS 1.2 master secret (extended: {})", session_hash.is_some());
        Ok(())
    }

    /// Expand the TLS 1.2 key block and install MAC keys, cipher keys and
    /// fixed IVs of both roles under the application epoch.
    ///
    /// ```text
    /// key_block = PRF(master, "key expansion", server_random + client_random)
    /// client_mac | server_mac | client_key | server_key | client_iv | server_iv
    /// ```
    pub fn tls12_key_block(&mut self, store: &mut SecretStore) -> Result<(), Error> {
        self.require_tls12()?;
        let suite = self.suite;
        let total = 2 * (suite.mac_key_len + suite.key_len + suite.iv_len);

        let mut seed = Vec::with_capacity(64);
        seed.extend_from_slice(&self.server_random);
        seed.extend_from_slice(&self.client_random);
        let mut block = self.prf_with_master("key expansion", &seed, total)?;

        let mut pos = 0;
        let mut take = |len: usize| {
            let range = pos..pos + len;
            pos += len;
            range
        };
        let client_mac = take(suite.mac_key_len);
        let server_mac = take(suite.mac_key_len);
        let client_key = take(suite.key_len);
        let server_key = take(suite.key_len);
        let client_iv = take(suite.iv_len);
        let server_iv = take(suite.iv_len);

        for (role, mac, key, iv) in [
            (Role::Client, client_mac, client_key, client_iv),
            (Role::Server, server_mac, server_key, server_iv),
        ] {
            let id = |purpose| SecretId::new(role, Epoch::Application, purpose);
            if !mac.is_empty() {
                store.insert(id(Purpose::MacKey), &block[mac]);
            }
            store.insert(id(Purpose::Key), &block[key]);
            if !iv.is_empty() {
                store.insert(id(Purpose::Iv), &block[iv]);
            }
        }
        block.fill(0);
        debug!("TLS 1.2 key block installed for {:?}", suite.suite);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Traffic key expansion
    // ------------------------------------------------------------------

    fn install_traffic_secret(
        &self,
        store: &mut SecretStore,
        role: Role,
        epoch: Epoch,
        traffic: &[u8],
        with_header_protection: bool,
    ) -> Result<(), Error> {
        let suite = self.suite_for_epoch(epoch)?;
        let hash = suite.hash;
        let labels = self.version.protection_labels();
        let id = |purpose| SecretId::new(role, epoch, purpose);

        let key = Zeroizing::new(self.expand_label(hash, traffic, labels.key, &[], suite.key_len)?);
        let iv = Zeroizing::new(self.expand_label(hash, traffic, labels.iv, &[], suite.iv_len)?);

        store.insert(id(Purpose::TrafficSecret), traffic);
        store.insert(id(Purpose::Key), &key);
        store.insert(id(Purpose::Iv), &iv);

        if let (Some(hp_label), true) = (labels.hp, with_header_protection) {
            let hp_len = suite
                .aead()
                .map(|a| a.header_protection().key_len())
                .unwrap_or(suite.key_len);
            let hp = Zeroizing::new(self.expand_label(hash, traffic, hp_label, &[], hp_len)?);
            store.insert(id(Purpose::HeaderProtection), &hp);
        }

        if let Some(label) =
            keylog::traffic_secret_label(role, epoch, self.generation[role_index(role)])
        {
            self.log(&label, traffic);
        }
        Ok(())
    }

    fn log(&self, label: &str, secret: &[u8]) {
        if let Some(key_log) = &self.key_log {
            if key_log.will_log(label) {
                key_log.log(label, &self.client_random, secret);
            }
        }
    }
}

impl fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySchedule")
            .field("suite", &self.suite.suite)
            .field("version", &self.version)
            .field("early", &self.early.is_some())
            .field("handshake", &self.handshake.is_some())
            .field("master", &self.master.is_some())
            .field("tls12_master", &self.tls12_master.is_some())
            .field("generation", &self.generation)
            .finish()
    }
}
