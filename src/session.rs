//! The [`Session`], single entry point of the crate.
//!
//! A session owns the secret store, the transcript and the key schedule of one
//! connection, plus the protection state of both directions. Each direction
//! moves forward through [`HandshakeStatus`]; every transition rebuilds the
//! direction's protector from the store so superseded keys are never used.
//!
//! Datagram protocols keep the keys of earlier epochs around (retransmitted
//! handshake records, coalesced QUIC packets) until
//! [`Session::discard_epoch`] drops them. TLS over a stream only ever has
//! one live epoch per direction.

use std::mem;
use std::ops::Range;
use std::sync::Arc;

use crate::buffer::Buf;
use crate::config::Config;
use crate::crypto::SuiteDescriptor;
use crate::header_protection::{HeaderProtector, SAMPLE_LEN};
use crate::key_schedule::KeySchedule;
use crate::packet::{self, PacketHeader, ProtectedPacket, ShortHeader};
use crate::record::{decode_inner_plaintext, encode_inner_plaintext, malformed, RecordProtector};
use crate::record::{Dtls12RecordHeader, TlsRecordHeader, UnifiedHeader};
use crate::secret::SecretStore;
use crate::transcript::Transcript;
use crate::types::{ContentType, Direction, Epoch, HandshakeStatus, ProtocolVersion};
use crate::types::{Purpose, Role, SecretId};
use crate::varint::decode_packet_number;
use crate::window::ReplayWindow;
use crate::Error;

const EPOCHS: usize = 4;

fn epoch_index(epoch: Epoch) -> usize {
    match epoch {
        Epoch::Initial => 0,
        Epoch::Early => 1,
        Epoch::Handshake => 2,
        Epoch::Application => 3,
    }
}

fn direction_index(direction: Direction) -> usize {
    match direction {
        Direction::ClientToServer => 0,
        Direction::ServerToClient => 1,
    }
}

/// Epoch number written into DTLS record headers.
fn wire_epoch(version: ProtocolVersion, epoch: Epoch) -> u64 {
    match (version, epoch) {
        (ProtocolVersion::Dtls12, _) => 1,
        (_, Epoch::Initial) => 0,
        (_, Epoch::Early) => 1,
        (_, Epoch::Handshake) => 2,
        (_, Epoch::Application) => 3,
    }
}

/// A record whose protection has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedRecord {
    /// Inner content type for TLS 1.3 family records.
    pub content_type: ContentType,
    /// Range of the input holding the plaintext content.
    pub payload: Range<usize>,
    /// Bytes of the input this record occupied.
    pub record_len: usize,
    /// Record sequence number, `None` for plaintext records.
    pub sequence: Option<u64>,
}

/// A QUIC packet whose protection has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPacket {
    pub header: PacketHeader,
    pub packet_number: u64,
    /// Range of the input holding the frames.
    pub payload: Range<usize>,
    /// Bytes of the datagram this packet occupied. Coalesced packets follow.
    pub packet_len: usize,
}

/// Keys and counters of one epoch in one direction.
struct EpochState {
    epoch: Epoch,
    suite: &'static SuiteDescriptor,
    wire_epoch: u64,
    protector: RecordProtector,
    header_protector: Option<HeaderProtector>,
    /// `None` once the sequence space is used up.
    next_sequence: Option<u64>,
    largest_acked: Option<u64>,
    largest_received: Option<u64>,
    replay: ReplayWindow,
    /// QUIC 1-RTT key phase bit of the current generation.
    key_phase: bool,
    /// First packet number received in the current key phase.
    phase_start: u64,
    /// QUIC keys of the previous generation, for reordered packets.
    previous: Option<RecordProtector>,
}

impl EpochState {
    fn peek_sequence(&self, direction: Direction, max: u64) -> Result<u64, Error> {
        match self.next_sequence.filter(|seq| *seq <= max) {
            Some(seq) => Ok(seq),
            None => {
                warn!("Sequence space of {:?} exhausted in {:?}", direction, self.epoch);
                Err(Error::SequenceExhausted(direction))
            }
        }
    }

    fn advance(&mut self) {
        self.next_sequence = self.next_sequence.and_then(|seq| seq.checked_add(1));
    }

    fn received(&mut self, seq: u64) {
        self.largest_received = Some(self.largest_received.map_or(seq, |l| l.max(seq)));
    }
}

struct DirectionState {
    status: HandshakeStatus,
    current: Option<Epoch>,
    epochs: [Option<EpochState>; EPOCHS],
    /// DTLS 1.3 and QUIC connection ID carried by records of this direction.
    connection_id: Vec<u8>,
    /// Sequence of DTLS records sent before any keys (epoch 0).
    plaintext_sequence: u64,
    plaintext_replay: ReplayWindow,
}

impl DirectionState {
    fn new() -> Self {
        DirectionState {
            status: HandshakeStatus::Initial,
            current: None,
            epochs: [None, None, None, None],
            connection_id: Vec::new(),
            plaintext_sequence: 0,
            plaintext_replay: ReplayWindow::new(),
        }
    }

    fn current_mut(&mut self) -> Option<&mut EpochState> {
        let epoch = self.current?;
        self.epochs[epoch_index(epoch)].as_mut()
    }

    fn by_wire_epoch(&mut self, wire: u64, mask: u64) -> Option<&mut EpochState> {
        // Prefer the current epoch when several share the low bits.
        let current = self.current.map(epoch_index);
        let hit = |s: &EpochState| s.wire_epoch & mask == wire & mask;
        if let Some(i) = current {
            if self.epochs[i].as_ref().map_or(false, hit) {
                return self.epochs[i].as_mut();
            }
        }
        self.epochs.iter_mut().flatten().find(|s| hit(s))
    }
}

/// Protection state of one connection.
pub struct Session {
    config: Arc<Config>,
    role: Role,
    store: SecretStore,
    transcript: Transcript,
    key_schedule: KeySchedule,
    directions: [DirectionState; 2],
}

impl Session {
    /// Create a session for the suite and version in `config`.
    pub fn new(config: Arc<Config>, role: Role) -> Result<Self, Error> {
        let provider = config.crypto_provider().clone();
        let mut key_schedule =
            KeySchedule::new(provider, config.cipher_suite(), config.protocol_version())?;
        key_schedule.set_key_log(config.key_log().cloned());

        let transcript = Transcript::new(
            config.crypto_provider().hash_provider,
            key_schedule.suite().hash,
        );

        debug!(
            "New {:?} session: {:?} over {:?}",
            role,
            config.cipher_suite(),
            config.protocol_version()
        );

        Ok(Session {
            config,
            role,
            store: SecretStore::new(),
            transcript,
            key_schedule,
            directions: [DirectionState::new(), DirectionState::new()],
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.config.protocol_version()
    }

    pub fn status(&self, direction: Direction) -> HandshakeStatus {
        self.directions[direction_index(direction)].status
    }

    /// Epoch whose keys currently protect `direction`, `None` while plaintext.
    pub fn current_epoch(&self, direction: Direction) -> Option<Epoch> {
        self.directions[direction_index(direction)].current
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Transcript
    // ------------------------------------------------------------------

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Feed one handshake message, header included.
    pub fn update_transcript(&mut self, message: &[u8]) {
        self.transcript.update(message);
    }

    pub fn transcript_hash(&self) -> Buf {
        self.transcript.snapshot()
    }

    /// Substitute ClientHello1 after a HelloRetryRequest.
    pub fn reset_transcript_for_retry(&mut self, first_client_hello: &[u8]) -> Result<(), Error> {
        self.transcript.reset_for_retry(first_client_hello)
    }

    // ------------------------------------------------------------------
    // Key schedule
    // ------------------------------------------------------------------

    /// ClientHello random; labels key log lines and feeds the TLS 1.2 PRF.
    pub fn set_client_random(&mut self, random: &[u8]) {
        self.key_schedule.set_client_random(random);
    }

    /// ServerHello random, for the TLS 1.2 PRF.
    pub fn set_server_random(&mut self, random: &[u8]) {
        self.key_schedule.set_server_random(random);
    }

    /// Derive QUIC Initial keys from the client's first Destination
    /// Connection ID and start protecting both directions with them.
    pub fn derive_initial(&mut self, client_dcid: &[u8]) -> Result<(), Error> {
        for role in [Role::Client, Role::Server] {
            self.key_schedule
                .derive(&mut self.store, role, Epoch::Initial, client_dcid)?;
        }
        for direction in [Direction::ClientToServer, Direction::ServerToClient] {
            let mut state = self.build_epoch_state(direction, Epoch::Initial)?;
            let dir = &mut self.directions[direction_index(direction)];
            // After a Retry the keys change but packet numbers keep counting.
            if let Some(old) = &dir.epochs[epoch_index(Epoch::Initial)] {
                state.next_sequence = old.next_sequence;
                state.largest_acked = old.largest_acked;
                state.largest_received = old.largest_received;
                debug!("Rekeyed {:?} Initial at {:?}", direction, old.next_sequence);
            }
            dir.epochs[epoch_index(Epoch::Initial)] = Some(state);
            if dir.status == HandshakeStatus::Initial {
                dir.current = Some(Epoch::Initial);
            }
        }
        Ok(())
    }

    /// Extract the early secret, optionally from a PSK.
    pub fn extract_early(&mut self, psk: Option<&[u8]>) -> Result<(), Error> {
        self.key_schedule.extract_early(psk)
    }

    /// Derive the client early traffic keys over the transcript so far
    /// (ClientHello).
    pub fn derive_early(&mut self) -> Result<(), Error> {
        let hash = self.transcript.snapshot();
        self.key_schedule
            .derive(&mut self.store, Role::Client, Epoch::Early, &hash)
    }

    /// Derive both handshake traffic secrets over ClientHello..ServerHello.
    pub fn derive_handshake(&mut self, shared_secret: &[u8]) -> Result<(), Error> {
        let hash = self.transcript.snapshot();
        self.key_schedule
            .derive_handshake(&mut self.store, shared_secret, &hash)
    }

    /// Derive both application traffic secrets and the exporter secret over
    /// ClientHello..server Finished.
    pub fn derive_application(&mut self) -> Result<(), Error> {
        let hash = self.transcript.snapshot();
        self.key_schedule.derive_application(&mut self.store, &hash)
    }

    /// Derive the resumption master secret over ClientHello..client Finished.
    pub fn derive_resumption_master(&mut self) -> Result<(), Error> {
        let hash = self.transcript.snapshot();
        self.key_schedule.derive_resumption_master(&hash)
    }

    pub fn resumption_psk(&self, ticket_nonce: &[u8]) -> Result<Buf, Error> {
        self.key_schedule.resumption_psk(ticket_nonce)
    }

    /// TLS 1.2: compute the master secret and install the key block.
    ///
    /// With extended master secret the transcript so far (through
    /// ClientKeyExchange) is the session hash.
    pub fn derive_tls12(&mut self, pre_master_secret: &[u8]) -> Result<(), Error> {
        let session_hash = self
            .config
            .with_extended_master_secret()
            .then(|| self.transcript.snapshot());
        self.key_schedule
            .tls12_master_secret(pre_master_secret, session_hash.as_deref())?;
        self.key_schedule.tls12_key_block(&mut self.store)
    }

    /// Finished verify_data `role` sends, over the transcript so far.
    pub fn finished_verify_data(&self, role: Role) -> Result<Buf, Error> {
        let hash = self.transcript.snapshot();
        self.key_schedule
            .finished_verify_data(&self.store, role, &hash)
    }

    pub fn export_keying_material(
        &self,
        label: &[u8],
        context: Option<&[u8]>,
        length: usize,
    ) -> Result<Buf, Error> {
        self.key_schedule
            .export_keying_material(label, context, length)
    }

    // ------------------------------------------------------------------
    // Direction state
    // ------------------------------------------------------------------

    /// Move `direction` forward to `status` and switch it to that status's keys.
    ///
    /// Statuses only move forward and early data only flows from client to
    /// server. The keys of the new epoch must already be in the store.
    pub fn set_status(&mut self, direction: Direction, status: HandshakeStatus) -> Result<(), Error> {
        let version = self.protocol_version();
        let from = self.status(direction);
        if status <= from
            || (status == HandshakeStatus::EarlyData && direction != Direction::ClientToServer)
        {
            return Err(Error::InvalidTransition(direction, from, status));
        }

        let epoch = status.epoch(version);
        let state = match epoch {
            Some(epoch) => Some(self.build_epoch_state(direction, epoch)?),
            None => None,
        };

        let dir = &mut self.directions[direction_index(direction)];
        if let (Some(epoch), Some(mut state)) = (epoch, state) {
            if version.is_quic() && epoch == Epoch::Application {
                // 0-RTT and 1-RTT share a packet number space.
                if let Some(early) = &dir.epochs[epoch_index(Epoch::Early)] {
                    state.next_sequence = early.next_sequence;
                    state.largest_acked = early.largest_acked;
                    state.largest_received = early.largest_received;
                }
            }
            if !version.is_datagram() {
                dir.epochs = [None, None, None, None];
            }
            dir.epochs[epoch_index(epoch)] = Some(state);
        }
        dir.status = status;
        dir.current = epoch.or(dir.current);

        debug!("{:?}: {:?} -> {:?} ({:?})", direction, from, status, epoch);
        Ok(())
    }

    /// Drop the keys of `epoch` for `direction` and retire its secrets.
    pub fn discard_epoch(&mut self, direction: Direction, epoch: Epoch) {
        let dir = &mut self.directions[direction_index(direction)];
        if dir.epochs[epoch_index(epoch)].take().is_some() {
            debug!("Discarded {:?} keys of {:?}", epoch, direction);
        }
        if dir.current == Some(epoch) {
            dir.current = None;
        }
        self.store.retire(direction.sender(), epoch);
    }

    /// Connection ID carried by DTLS 1.3 records and QUIC short headers of `direction`.
    pub fn set_connection_id(&mut self, direction: Direction, connection_id: &[u8]) {
        self.directions[direction_index(direction)].connection_id = connection_id.to_vec();
    }

    /// Take the next sequence number of `direction`'s current epoch.
    ///
    /// The record methods call this themselves; it is exposed for callers
    /// framing records on their own.
    pub fn next_sequence(&mut self, direction: Direction) -> Result<u64, Error> {
        let max = self.protocol_version().max_sequence();
        let dir = &mut self.directions[direction_index(direction)];
        match dir.current_mut() {
            Some(state) => {
                let seq = state.peek_sequence(direction, max)?;
                state.advance();
                Ok(seq)
            }
            None => {
                let seq = dir.plaintext_sequence;
                if seq > max {
                    return Err(Error::SequenceExhausted(direction));
                }
                dir.plaintext_sequence += 1;
                Ok(seq)
            }
        }
    }

    /// Raise the largest acknowledged packet number of `epoch`.
    pub fn on_packet_acked(&mut self, direction: Direction, epoch: Epoch, packet_number: u64) {
        let dir = &mut self.directions[direction_index(direction)];
        if let Some(state) = dir.epochs[epoch_index(epoch)].as_mut() {
            state.largest_acked = Some(state.largest_acked.map_or(packet_number, |l| l.max(packet_number)));
        }
    }

    pub fn largest_acked(&self, direction: Direction, epoch: Epoch) -> Option<u64> {
        self.directions[direction_index(direction)].epochs[epoch_index(epoch)]
            .as_ref()
            .and_then(|s| s.largest_acked)
    }

    /// Largest packet or record number successfully opened in `epoch`.
    pub fn largest_received(&self, direction: Direction, epoch: Epoch) -> Option<u64> {
        self.directions[direction_index(direction)].epochs[epoch_index(epoch)]
            .as_ref()
            .and_then(|s| s.largest_received)
    }

    /// Move `direction`'s application keys to the next generation.
    ///
    /// TLS and DTLS restart the sequence at 0 (DTLS 1.3 also bumps the epoch).
    /// QUIC flips the key phase, continues the packet numbers and keeps the
    /// previous keys for reordered packets.
    pub fn key_update(&mut self, direction: Direction) -> Result<(), Error> {
        let version = self.protocol_version();
        let role = direction.sender();
        let app = epoch_index(Epoch::Application);
        if self.directions[direction_index(direction)].epochs[app].is_none() {
            return Err(Error::MissingSecret(SecretId::new(
                role,
                Epoch::Application,
                Purpose::TrafficSecret,
            )));
        }

        self.key_schedule.key_update(&mut self.store, role)?;
        let mut fresh = self.build_epoch_state(direction, Epoch::Application)?;

        let dir = &mut self.directions[direction_index(direction)];
        let Some(state) = dir.epochs[app].as_mut() else {
            return Err(Error::MissingSecret(SecretId::new(
                role,
                Epoch::Application,
                Purpose::Key,
            )));
        };

        let previous = mem::replace(&mut state.protector, fresh.protector);
        if version.is_quic() {
            state.previous = Some(previous);
            state.key_phase = !state.key_phase;
            state.phase_start = state.next_sequence.unwrap_or(u64::MAX);
        } else {
            state.next_sequence = Some(0);
            if version == ProtocolVersion::Dtls13 {
                state.wire_epoch += 1;
                state.header_protector = fresh.header_protector.take();
                state.replay = ReplayWindow::new();
                state.largest_received = None;
            }
        }

        debug!(
            "Key update of {:?}, generation {}",
            direction,
            self.key_schedule.generation(role)
        );
        Ok(())
    }

    /// Forget the QUIC keys of the previous key phase.
    pub fn discard_previous_keys(&mut self, direction: Direction) {
        let dir = &mut self.directions[direction_index(direction)];
        if let Some(state) = dir.epochs[epoch_index(Epoch::Application)].as_mut() {
            state.previous = None;
        }
    }

    fn build_epoch_state(&self, direction: Direction, epoch: Epoch) -> Result<EpochState, Error> {
        let version = self.protocol_version();
        let role = direction.sender();
        let provider = self.config.crypto_provider();
        let suite = self.key_schedule.suite_for_epoch(epoch)?;

        let protector = RecordProtector::from_store(
            provider,
            suite,
            &self.store,
            role,
            epoch,
            self.config.max_ciphertext_len(),
        )?;

        let header_protector = if version.protection_labels().hp.is_some() {
            let algorithm = suite
                .aead()
                .ok_or(Error::UnsupportedSuite(suite.suite))?
                .header_protection();
            let key = self
                .store
                .get(SecretId::new(role, epoch, Purpose::HeaderProtection))?;
            Some(HeaderProtector::new(provider, algorithm, key.as_bytes())?)
        } else {
            None
        };

        let generation = if epoch == Epoch::Application {
            self.key_schedule.generation(role)
        } else {
            0
        };

        Ok(EpochState {
            epoch,
            suite,
            wire_epoch: wire_epoch(version, epoch) + generation,
            protector,
            header_protector,
            next_sequence: Some(0),
            largest_acked: None,
            largest_received: None,
            replay: ReplayWindow::new(),
            key_phase: generation % 2 == 1,
            phase_start: 0,
            previous: None,
        })
    }

    fn require(&self, wanted: impl Fn(ProtocolVersion) -> bool, what: &str) -> Result<(), Error> {
        let version = self.protocol_version();
        if !wanted(version) {
            return Err(Error::ConfigError(format!(
                "{} is not available for {:?}",
                what, version
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Record protection
    // ------------------------------------------------------------------

    /// Seal `payload` in place under `direction`'s current keys and next
    /// sequence number. The tag is appended. Returns the sequence number used.
    ///
    /// `aad` follows the record engine convention: `type || version` for the
    /// TLS 1.2 family, the complete record header otherwise.
    pub fn encrypt(&mut self, direction: Direction, aad: &[u8], payload: &mut Buf) -> Result<u64, Error> {
        let max = self.protocol_version().max_sequence();
        let state = self.current_state(direction)?;
        let seq = state.peek_sequence(direction, max)?;
        state.protector.seal(seq, aad, payload)?;
        state.advance();
        Ok(seq)
    }

    /// Open a sealed body in place under `direction`'s current keys and next
    /// sequence number. Returns the plaintext range.
    pub fn decrypt(
        &mut self,
        direction: Direction,
        aad: &[u8],
        body: &mut [u8],
    ) -> Result<Range<usize>, Error> {
        let max = self.protocol_version().max_sequence();
        let state = self.current_state(direction)?;
        let seq = state.peek_sequence(direction, max)?;
        let range = state.protector.open(seq, aad, body)?;
        state.advance();
        state.received(seq);
        Ok(range)
    }

    fn current_state(&mut self, direction: Direction) -> Result<&mut EpochState, Error> {
        let version = self.protocol_version();
        let dir = &mut self.directions[direction_index(direction)];
        let status = dir.status;
        let epoch = status.epoch(version).unwrap_or(Epoch::Initial);
        dir.current_mut().ok_or(Error::MissingSecret(SecretId::new(
            direction.sender(),
            epoch,
            Purpose::Key,
        )))
    }

    /// Write one TLS record for `payload` to `out`.
    ///
    /// Plaintext while the direction has no keys. TLS 1.3 records carry
    /// `TLSInnerPlaintext` under an `application_data` outer type.
    pub fn seal_record(
        &mut self,
        direction: Direction,
        content_type: ContentType,
        payload: &[u8],
        out: &mut Buf,
    ) -> Result<(), Error> {
        self.require(|v| !v.is_datagram(), "seal_record")?;
        let version = self.protocol_version();
        let legacy = version.legacy_record_version();
        let padding = self.config.record_padding();

        if self.current_epoch(direction).is_none() {
            let header = TlsRecordHeader {
                content_type,
                version: legacy,
                length: record_length(payload.len())?,
            };
            header.serialize(out);
            out.extend_from_slice(payload);
            return Ok(());
        }

        let mut body = Buf::from_slice(payload);
        let outer_type = if version.is_tls13_family() {
            encode_inner_plaintext(&mut body, content_type, padding);
            ContentType::ApplicationData
        } else {
            content_type
        };

        let max = version.max_sequence();
        let state = self.current_state(direction)?;
        let header = TlsRecordHeader {
            content_type: outer_type,
            version: legacy,
            length: record_length(state.protector.sealed_len(body.len()))?,
        };
        let mut aad = Buf::new();
        if version.is_tls13_family() {
            header.serialize(&mut aad);
        } else {
            aad.extend_from_slice(&header.associated_data());
        }

        let seq = state.peek_sequence(direction, max)?;
        state.protector.seal(seq, &aad, &mut body)?;
        state.advance();

        header.serialize(out);
        out.extend_from_slice(&body);
        trace!("Sealed {} record seq {} for {:?}", content_type, seq, direction);
        Ok(())
    }

    /// Open the TLS record at the start of `input` in place.
    ///
    /// TLS 1.3 `change_cipher_spec` records are passed through unprotected.
    pub fn open_record(&mut self, direction: Direction, input: &mut [u8]) -> Result<OpenedRecord, Error> {
        self.require(|v| !v.is_datagram(), "open_record")?;
        let version = self.protocol_version();

        let (_, header) = TlsRecordHeader::parse(input).map_err(malformed)?;
        let start = TlsRecordHeader::LEN;
        let end = start + usize::from(header.length);
        if end > input.len() {
            return Err(Error::MalformedHeader("truncated record"));
        }

        let compat_ccs =
            version.is_tls13_family() && header.content_type == ContentType::ChangeCipherSpec;
        if self.current_epoch(direction).is_none() || compat_ccs {
            return Ok(OpenedRecord {
                content_type: header.content_type,
                payload: start..end,
                record_len: end,
                sequence: None,
            });
        }

        let mut aad = Buf::new();
        if version.is_tls13_family() {
            aad.extend_from_slice(&input[..start]);
        } else {
            aad.extend_from_slice(&header.associated_data());
        }

        let max = version.max_sequence();
        let state = self.current_state(direction)?;
        let seq = state.peek_sequence(direction, max)?;
        let body = &mut input[start..end];
        let range = state.protector.open(seq, &aad, body)?;
        state.advance();
        state.received(seq);

        let (content_type, range) = if version.is_tls13_family() {
            let (content_type, len) = decode_inner_plaintext(&body[range.clone()])?;
            (content_type, range.start..range.start + len)
        } else {
            (header.content_type, range)
        };

        Ok(OpenedRecord {
            content_type,
            payload: start + range.start..start + range.end,
            record_len: end,
            sequence: Some(seq),
        })
    }

    /// Write one DTLS 1.2 record to `out`. Returns its sequence number.
    pub fn seal_dtls12_record(
        &mut self,
        direction: Direction,
        content_type: ContentType,
        payload: &[u8],
        out: &mut Buf,
    ) -> Result<u64, Error> {
        self.require(|v| v == ProtocolVersion::Dtls12, "seal_dtls12_record")?;
        if self.current_epoch(direction).is_none() {
            return self.seal_dtls_plaintext(direction, content_type, payload, out);
        }

        let max = self.protocol_version().max_sequence();
        let legacy = self.protocol_version().legacy_record_version();
        let state = self.current_state(direction)?;
        let seq = state.peek_sequence(direction, max)?;

        let mut body = Buf::from_slice(payload);
        let header = Dtls12RecordHeader {
            content_type,
            version: legacy,
            epoch: state.wire_epoch as u16,
            sequence: seq,
            length: record_length(state.protector.sealed_len(body.len()))?,
        };
        state
            .protector
            .seal(header.aad_sequence(), &header.associated_data(), &mut body)?;
        state.advance();

        header.serialize(out);
        out.extend_from_slice(&body);
        Ok(seq)
    }

    /// Open the DTLS 1.2 record at the start of `input` in place.
    pub fn open_dtls12_record(&mut self, direction: Direction, input: &mut [u8]) -> Result<OpenedRecord, Error> {
        self.require(|v| v == ProtocolVersion::Dtls12, "open_dtls12_record")?;
        let (_, header) = Dtls12RecordHeader::parse(input).map_err(malformed)?;
        if header.epoch == 0 {
            return self.open_dtls_plaintext(direction, input);
        }

        let start = Dtls12RecordHeader::LEN;
        let end = start + usize::from(header.length);
        if end > input.len() {
            return Err(Error::MalformedHeader("truncated record"));
        }

        let replay_protection = self.config.replay_protection();
        let dir = &mut self.directions[direction_index(direction)];
        let state = dir
            .by_wire_epoch(u64::from(header.epoch), u64::from(u16::MAX))
            .ok_or(Error::MalformedHeader("record for unknown epoch"))?;

        let seq = header.sequence;
        if replay_protection && !state.replay.is_fresh(seq) {
            debug!("Dropping replayed record {} on {:?}", seq, direction);
            return Err(Error::Replayed(seq));
        }

        let range = state.protector.open(
            header.aad_sequence(),
            &header.associated_data(),
            &mut input[start..end],
        )?;
        state.replay.mark(seq);
        state.received(seq);

        Ok(OpenedRecord {
            content_type: header.content_type,
            payload: start + range.start..start + range.end,
            record_len: end,
            sequence: Some(seq),
        })
    }

    /// Write one DTLS 1.3 record to `out`. Returns its sequence number.
    ///
    /// Protected records use the unified header with a 16 bit sequence
    /// number and an explicit length; the sequence number is encrypted.
    pub fn seal_dtls13_record(
        &mut self,
        direction: Direction,
        content_type: ContentType,
        payload: &[u8],
        out: &mut Buf,
    ) -> Result<u64, Error> {
        self.require(|v| v == ProtocolVersion::Dtls13, "seal_dtls13_record")?;
        if self.current_epoch(direction).is_none() {
            return self.seal_dtls_plaintext(direction, content_type, payload, out);
        }

        let max = self.protocol_version().max_sequence();
        let padding = self.config.record_padding();
        let connection_id = self.directions[direction_index(direction)]
            .connection_id
            .clone();
        let state = self.current_state(direction)?;
        let seq = state.peek_sequence(direction, max)?;

        let mut body = Buf::from_slice(payload);
        encode_inner_plaintext(&mut body, content_type, padding);
        // The record number mask samples 16 bytes of ciphertext.
        let min_inner = SAMPLE_LEN.saturating_sub(state.suite.tag_len);
        if body.len() < min_inner {
            body.resize(min_inner, 0);
        }

        let sealed_len = record_length(state.protector.sealed_len(body.len()))?;
        let header = UnifiedHeader::new(state.wire_epoch, seq, &connection_id, sealed_len);
        let mut aad = Buf::new();
        header.serialize(&mut aad);

        state.protector.seal(seq, &aad, &mut body)?;
        let hp = state
            .header_protector
            .as_ref()
            .ok_or(Error::MalformedHeader("epoch has no record number key"))?;

        let start = out.len();
        out.extend_from_slice(&aad);
        out.extend_from_slice(&body);
        let offset = start + header.sequence_offset();
        hp.mask_record_number(&mut out[offset..offset + header.sequence_len()], &body)?;
        state.advance();

        trace!("Sealed DTLS 1.3 record epoch {} seq {}", state.wire_epoch, seq);
        Ok(seq)
    }

    /// Open the DTLS 1.3 record at the start of `input` in place.
    ///
    /// Plaintext records (DTLSPlaintext, epoch 0) are passed through.
    pub fn open_dtls13_record(&mut self, direction: Direction, input: &mut [u8]) -> Result<OpenedRecord, Error> {
        self.require(|v| v == ProtocolVersion::Dtls13, "open_dtls13_record")?;
        let first = *input.first().ok_or(Error::MalformedHeader("empty record"))?;
        if !UnifiedHeader::is_unified(first) {
            return self.open_dtls_plaintext(direction, input);
        }

        let replay_protection = self.config.replay_protection();
        let dir = &mut self.directions[direction_index(direction)];
        let (_, header) = UnifiedHeader::parse(input, dir.connection_id.len()).map_err(malformed)?;
        let header_len = header.header_len();
        let end = match header.length {
            Some(len) => header_len + usize::from(len),
            None => input.len(),
        };
        if end > input.len() {
            return Err(Error::MalformedHeader("truncated record"));
        }

        let state = dir
            .by_wire_epoch(u64::from(header.epoch_bits), 0x03)
            .ok_or(Error::MalformedHeader("record for unknown epoch"))?;
        let hp = state
            .header_protector
            .as_ref()
            .ok_or(Error::MalformedHeader("epoch has no record number key"))?;

        let (head, body) = input[..end].split_at_mut(header_len);
        let offset = header.sequence_offset();
        let seq_len = header.sequence_len();
        hp.mask_record_number(&mut head[offset..offset + seq_len], body)?;

        let truncated = head[offset..offset + seq_len]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        let seq = decode_packet_number(truncated, seq_len, state.largest_received);

        if replay_protection && !state.replay.is_fresh(seq) {
            debug!("Dropping replayed record {} on {:?}", seq, direction);
            return Err(Error::Replayed(seq));
        }

        let range = state.protector.open(seq, head, body)?;
        state.replay.mark(seq);
        state.received(seq);

        let (content_type, len) = decode_inner_plaintext(&body[range.clone()])?;
        Ok(OpenedRecord {
            content_type,
            payload: header_len + range.start..header_len + range.start + len,
            record_len: end,
            sequence: Some(seq),
        })
    }

    fn seal_dtls_plaintext(
        &mut self,
        direction: Direction,
        content_type: ContentType,
        payload: &[u8],
        out: &mut Buf,
    ) -> Result<u64, Error> {
        let seq = self.next_sequence(direction)?;
        let header = Dtls12RecordHeader {
            content_type,
            version: self.protocol_version().legacy_record_version(),
            epoch: 0,
            sequence: seq,
            length: record_length(payload.len())?,
        };
        header.serialize(out);
        out.extend_from_slice(payload);
        Ok(seq)
    }

    fn open_dtls_plaintext(&mut self, direction: Direction, input: &[u8]) -> Result<OpenedRecord, Error> {
        let (_, header) = Dtls12RecordHeader::parse(input).map_err(malformed)?;
        if header.epoch != 0 {
            return Err(Error::MalformedHeader("protected record in plaintext format"));
        }
        if header.content_type == ContentType::ApplicationData {
            return Err(Error::MalformedHeader("application data in epoch 0"));
        }
        let start = Dtls12RecordHeader::LEN;
        let end = start + usize::from(header.length);
        if end > input.len() {
            return Err(Error::MalformedHeader("truncated record"));
        }

        if self.config.replay_protection() {
            let dir = &mut self.directions[direction_index(direction)];
            if !dir.plaintext_replay.check_and_update(header.sequence) {
                debug!("Dropping replayed record {} on {:?}", header.sequence, direction);
                return Err(Error::Replayed(header.sequence));
            }
        }

        Ok(OpenedRecord {
            content_type: header.content_type,
            payload: start..end,
            record_len: end,
            sequence: Some(header.sequence),
        })
    }

    // ------------------------------------------------------------------
    // QUIC packet protection
    // ------------------------------------------------------------------

    /// Protect one QUIC packet and append it to `out`. Returns its packet number.
    ///
    /// The epoch follows from the header type. Short headers get the key
    /// phase of the current generation whatever `header` says.
    pub fn seal_packet(
        &mut self,
        direction: Direction,
        header: &PacketHeader,
        payload: &[u8],
        out: &mut Buf,
    ) -> Result<u64, Error> {
        let quic = self.quic_version()?;
        let epoch = header
            .epoch()
            .ok_or(Error::MalformedHeader("Retry packets carry no packet protection"))?;
        if let PacketHeader::Long(long) = header {
            if long.version != quic {
                return Err(Error::MalformedHeader("packet version differs from session"));
            }
        }

        let max = self.protocol_version().max_sequence();
        let dir = &mut self.directions[direction_index(direction)];
        // 0-RTT shares its packet numbers with 1-RTT, which took over the count.
        if epoch == Epoch::Early && dir.status == HandshakeStatus::Application {
            return Err(Error::InvalidTransition(
                direction,
                dir.status,
                HandshakeStatus::EarlyData,
            ));
        }
        let state = dir.epochs[epoch_index(epoch)]
            .as_mut()
            .ok_or(Error::MissingSecret(SecretId::new(
                direction.sender(),
                epoch,
                Purpose::Key,
            )))?;

        let adjusted;
        let header = match header {
            PacketHeader::Short(short) if short.key_phase != state.key_phase => {
                adjusted = PacketHeader::Short(ShortHeader {
                    key_phase: state.key_phase,
                    ..short.clone()
                });
                &adjusted
            }
            _ => header,
        };

        let pn = state.peek_sequence(direction, max)?;
        let hp = state
            .header_protector
            .as_ref()
            .ok_or(Error::MalformedHeader("epoch has no header protection key"))?;
        packet::seal_packet(
            header,
            pn,
            state.largest_acked,
            payload,
            &mut state.protector,
            hp,
            out,
        )?;
        state.advance();
        Ok(pn)
    }

    /// Open the QUIC packet at the start of `input` in place.
    ///
    /// A 1-RTT packet with a flipped key phase is tried with the next
    /// generation of keys; the update is committed only if it authenticates.
    /// Older packets of the previous phase use the retained previous keys.
    pub fn open_packet(&mut self, direction: Direction, input: &mut [u8]) -> Result<OpenedPacket, Error> {
        let quic = self.quic_version()?;
        let role = direction.sender();
        let max_len = self.config.max_ciphertext_len();
        let provider = self.config.crypto_provider();

        let dir = &mut self.directions[direction_index(direction)];
        let protected = ProtectedPacket::parse(input, dir.connection_id.len())?;
        let epoch = protected
            .header
            .epoch()
            .ok_or(Error::MalformedHeader("Retry packets carry no packet protection"))?;
        if let PacketHeader::Long(long) = &protected.header {
            if long.version != quic {
                return Err(Error::MalformedHeader("packet version differs from session"));
            }
        }

        let state = dir.epochs[epoch_index(epoch)]
            .as_mut()
            .ok_or(Error::MissingSecret(SecretId::new(role, epoch, Purpose::Key)))?;
        let hp = state
            .header_protector
            .as_ref()
            .ok_or(Error::MalformedHeader("epoch has no header protection key"))?;
        let header = protected.unprotect(input, hp, state.largest_received)?;
        let pn = header.packet_number;

        let payload = if header.key_phase() == state.key_phase {
            packet::open_payload(input, &header, &mut state.protector)?
        } else if pn < state.phase_start {
            let previous = state.previous.as_mut().ok_or(Error::AuthenticationFailed)?;
            packet::open_payload(input, &header, previous)?
        } else {
            let (key, iv) = self.key_schedule.next_packet_keys(&self.store, role)?;
            let mut candidate =
                RecordProtector::new(provider, state.suite, &key, &iv, None, max_len)?;
            let payload = packet::open_payload(input, &header, &mut candidate)?;

            self.key_schedule.key_update(&mut self.store, role)?;
            state.previous = Some(mem::replace(&mut state.protector, candidate));
            state.key_phase = !state.key_phase;
            state.phase_start = pn;
            debug!(
                "Peer key update on {:?} at packet {}, generation {}",
                direction,
                pn,
                self.key_schedule.generation(role)
            );
            payload
        };
        state.received(pn);

        Ok(OpenedPacket {
            header: header.header,
            packet_number: pn,
            payload,
            packet_len: header.packet_len,
        })
    }

    /// Check a Retry packet against the Destination Connection ID of the
    /// client's first Initial.
    pub fn verify_retry(&self, original_dcid: &[u8], retry: &[u8]) -> Result<(), Error> {
        let quic = self.quic_version()?;
        packet::verify_retry(self.config.crypto_provider(), quic, original_dcid, retry)
    }

    /// Build a Retry packet (server).
    pub fn build_retry(
        &self,
        dcid: &[u8],
        scid: &[u8],
        token: &[u8],
        original_dcid: &[u8],
    ) -> Result<Buf, Error> {
        let quic = self.quic_version()?;
        packet::build_retry(
            self.config.crypto_provider(),
            quic,
            dcid,
            scid,
            token,
            original_dcid,
        )
    }

    fn quic_version(&self) -> Result<crate::types::QuicVersion, Error> {
        self.protocol_version().quic_version().ok_or_else(|| {
            Error::ConfigError(format!(
                "QUIC packets need a QUIC session, not {:?}",
                self.protocol_version()
            ))
        })
    }
}

fn record_length(len: usize) -> Result<u16, Error> {
    u16::try_from(len).map_err(|_| Error::RecordTooLarge(len, u16::MAX as usize))
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status: Vec<_> = self.directions.iter().map(|d| (d.status, d.current)).collect();
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("version", &self.protocol_version())
            .field("suite", &self.config.cipher_suite())
            .field("directions", &status)
            .field("secrets", &self.store.len())
            .finish()
    }
}
