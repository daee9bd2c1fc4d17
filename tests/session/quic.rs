//! QUIC packet protection through a session.

use hex_literal::hex;

use transec::crypto::Buf;
use transec::packet::{LongHeader, LongPacketType, PacketHeader, ShortHeader};
use transec::{CipherSuite, Epoch, Error, HandshakeStatus, ProtocolVersion, Purpose};
use transec::{QuicVersion, Role, Session};

use crate::common::*;

const DCID: [u8; 8] = hex!("8394c8f03e515708");

fn quic_pair(version: QuicVersion) -> (Session, Session) {
    let (mut client, mut server) = pair(config(
        CipherSuite::TLS_AES_128_GCM_SHA256,
        ProtocolVersion::Quic(version),
    ));
    client.derive_initial(&DCID).expect("client initial");
    server.derive_initial(&DCID).expect("server initial");
    (client, server)
}

fn long(packet_type: LongPacketType, version: QuicVersion) -> PacketHeader {
    PacketHeader::Long(LongHeader {
        packet_type,
        version,
        dcid: DCID.to_vec(),
        scid: hex!("f067a5502a4262b5").to_vec(),
        token: Vec::new(),
    })
}

#[test]
fn initial_keys_v1() {
    let (client, server) = quic_pair(QuicVersion::V1);
    for session in [&client, &server] {
        assert_eq!(
            secret(session, Role::Client, Epoch::Initial, Purpose::Key),
            hex!("1f369613dd76d5467730efcbe3b1a22d")
        );
        assert_eq!(
            secret(session, Role::Client, Epoch::Initial, Purpose::Iv),
            hex!("fa044b2f42a3fd3b46fb255c")
        );
        assert_eq!(
            secret(session, Role::Client, Epoch::Initial, Purpose::HeaderProtection),
            hex!("9f50449e04a0e810283a1e9933adedd2")
        );
        assert_eq!(
            secret(session, Role::Server, Epoch::Initial, Purpose::Key),
            hex!("cf3a5331653c364c88f0f379b6067e37")
        );
        assert_eq!(
            secret(session, Role::Server, Epoch::Initial, Purpose::Iv),
            hex!("0ac1493ca1905853b0bba03e")
        );
        assert_eq!(
            secret(session, Role::Server, Epoch::Initial, Purpose::HeaderProtection),
            hex!("c206b8d9b9f0f37644430b490eeaa314")
        );
    }
}

#[test]
fn initial_keys_v2() {
    let (client, _) = quic_pair(QuicVersion::V2);
    assert_eq!(
        secret(&client, Role::Client, Epoch::Initial, Purpose::Key),
        hex!("8b1a0bc121284290a29e0971b5cd045d")
    );
    assert_eq!(
        secret(&client, Role::Client, Epoch::Initial, Purpose::Iv),
        hex!("91f73e2351d8fa91660e909f")
    );
    assert_eq!(
        secret(&client, Role::Client, Epoch::Initial, Purpose::HeaderProtection),
        hex!("45b95e15235d6f45a6b19cbcb0294ba9")
    );
    assert_eq!(
        secret(&client, Role::Server, Epoch::Initial, Purpose::Key),
        hex!("82db637861d55e1d011f19ea71d5d2a7")
    );
    assert_eq!(
        secret(&client, Role::Server, Epoch::Initial, Purpose::Iv),
        hex!("dd13c276499c0249d3310652")
    );
    assert_eq!(
        secret(&client, Role::Server, Epoch::Initial, Purpose::HeaderProtection),
        hex!("edf6d05c83121201b436e16877593c3a")
    );
}

#[test]
fn retry_integrity() {
    let (client, server) = quic_pair(QuicVersion::V1);

    // RFC 9001 Appendix A.4
    let retry = hex!("ff000000010008f067a5502a4262b5746f6b656e04a265ba2eff4d829058fb3f0f2496ba");
    client.verify_retry(&DCID, &retry).expect("valid retry");

    let mut tampered = retry;
    tampered[10] ^= 1;
    assert_eq!(
        client.verify_retry(&DCID, &tampered),
        Err(Error::AuthenticationFailed)
    );
    assert_eq!(
        client.verify_retry(&[0; 8], &retry),
        Err(Error::AuthenticationFailed)
    );

    let built = server
        .build_retry(b"client", b"server", b"token", &DCID)
        .expect("build retry");
    client.verify_retry(&DCID, &built).expect("own retry");
}

#[test]
fn full_handshake_v2() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = quic_pair(QuicVersion::V2);

    let mut datagram = Buf::new();
    let pn = client
        .seal_packet(C2S, &long(LongPacketType::Initial, QuicVersion::V2), b"\x06\x00\x02ch", &mut datagram)
        .expect("seal initial");
    assert_eq!(pn, 0);
    // Initial is type 0b01 in version 2.
    assert_eq!(datagram[0] & 0x30, 0x10);
    let opened = server.open_packet(C2S, &mut datagram).expect("open initial");
    assert_eq!(opened.packet_len, datagram.len());

    to_handshake(&mut client, &mut server, &[0x21; 32]);
    for s in [&mut client, &mut server] {
        s.set_status(C2S, HandshakeStatus::Handshake).expect("handshake");
        s.set_status(S2C, HandshakeStatus::Handshake).expect("handshake");
    }

    // Server coalesces an Initial and a Handshake packet.
    let mut datagram = Buf::new();
    server
        .seal_packet(S2C, &long(LongPacketType::Initial, QuicVersion::V2), b"\x06\x00\x02sh", &mut datagram)
        .expect("seal initial");
    server
        .seal_packet(S2C, &long(LongPacketType::Handshake, QuicVersion::V2), b"\x06\x00\x03fin", &mut datagram)
        .expect("seal handshake");

    let first = client.open_packet(S2C, &mut datagram).expect("open initial");
    assert_eq!(first.header.epoch(), Some(Epoch::Initial));
    let rest = first.packet_len;
    let second = client
        .open_packet(S2C, &mut datagram[rest..])
        .expect("open handshake");
    assert_eq!(second.header.epoch(), Some(Epoch::Handshake));
    assert_eq!(second.packet_number, 0);

    for s in [&mut client, &mut server] {
        s.discard_epoch(C2S, Epoch::Initial);
        s.discard_epoch(S2C, Epoch::Initial);
    }
    assert!(!client
        .secrets()
        .contains(transec::SecretId::new(Role::Client, Epoch::Initial, Purpose::Key)));

    to_application(&mut client, &mut server);
    set_status([&mut client, &mut server], HandshakeStatus::Application);

    for s in [&mut client, &mut server] {
        s.set_connection_id(S2C, b"cid-to-client");
    }
    let header = PacketHeader::Short(ShortHeader {
        dcid: b"cid-to-client".to_vec(),
        spin: true,
        key_phase: false,
    });
    let mut packet = Buf::new();
    server
        .seal_packet(S2C, &header, b"\x01", &mut packet)
        .expect("seal 1-rtt");
    let opened = client.open_packet(S2C, &mut packet).expect("open 1-rtt");
    assert_eq!(opened.header, header);
    assert_eq!(&packet[opened.payload.start..opened.payload.start + 1], b"\x01");
}

#[test]
fn zero_rtt_shares_packet_numbers() {
    let (mut client, mut server) = quic_pair(QuicVersion::V1);

    for s in [&mut client, &mut server] {
        s.extract_early(Some(&[0x42; 32][..])).expect("early secret");
        s.update_transcript(b"\x01\x00\x00\x04ch!!");
        s.derive_early().expect("early keys");
        s.set_status(C2S, HandshakeStatus::EarlyData).expect("early data");
    }

    for expected in 0..2 {
        let mut packet = Buf::new();
        let pn = client
            .seal_packet(C2S, &long(LongPacketType::ZeroRtt, QuicVersion::V1), b"\x01", &mut packet)
            .expect("seal 0-rtt");
        assert_eq!(pn, expected);
        server.open_packet(C2S, &mut packet).expect("open 0-rtt");
    }

    for s in [&mut client, &mut server] {
        s.update_transcript(b"\x02\x00\x00\x04sh!!");
        s.derive_handshake(&[0x61; 32]).expect("handshake secrets");
        s.set_status(C2S, HandshakeStatus::Handshake).expect("handshake");
    }
    to_application(&mut client, &mut server);
    for s in [&mut client, &mut server] {
        s.set_status(C2S, HandshakeStatus::Application).expect("application");
        s.set_connection_id(C2S, &DCID);
    }

    let header = PacketHeader::Short(ShortHeader {
        dcid: DCID.to_vec(),
        spin: false,
        key_phase: false,
    });
    let mut packet = Buf::new();
    let pn = client
        .seal_packet(C2S, &header, b"\x01", &mut packet)
        .expect("seal 1-rtt");
    assert_eq!(pn, 2);
    let opened = server.open_packet(C2S, &mut packet).expect("open 1-rtt");
    assert_eq!(opened.packet_number, 2);
    assert_eq!(server.largest_received(C2S, Epoch::Application), Some(2));

    // 1-RTT now owns the shared packet number space.
    let mut late = Buf::new();
    assert_eq!(
        client.seal_packet(C2S, &long(LongPacketType::ZeroRtt, QuicVersion::V1), b"\x01", &mut late),
        Err(Error::InvalidTransition(
            C2S,
            HandshakeStatus::Application,
            HandshakeStatus::EarlyData
        ))
    );
    assert!(late.is_empty());
    let pn = client
        .seal_packet(C2S, &header, b"\x01", &mut Buf::new())
        .expect("seal 1-rtt");
    assert_eq!(pn, 3);
}

#[test]
fn retry_keeps_initial_packet_numbers() {
    let (mut client, mut server) = quic_pair(QuicVersion::V1);
    let header = long(LongPacketType::Initial, QuicVersion::V1);

    let mut first = Buf::new();
    let pn = client
        .seal_packet(C2S, &header, &[0; 32], &mut first)
        .expect("seal before retry");
    assert_eq!(pn, 0);

    // The Retry hands out a new Destination Connection ID and with it new keys.
    let retry_dcid = hex!("f067a5502a4262b5");
    client.derive_initial(&retry_dcid).expect("client rekey");
    server.derive_initial(&retry_dcid).expect("server rekey");

    let mut second = Buf::new();
    let pn = client
        .seal_packet(C2S, &header, &[0; 32], &mut second)
        .expect("seal after retry");
    assert_eq!(pn, 1);
    let opened = server.open_packet(C2S, &mut second).expect("open after retry");
    assert_eq!(opened.packet_number, 1);

    // Keys from before the Retry are gone.
    assert!(server.open_packet(C2S, &mut first).is_err());
}

#[test]
fn acked_packets_shorten_packet_numbers() {
    let (mut client, mut server) = quic_pair(QuicVersion::V1);
    let header = long(LongPacketType::Initial, QuicVersion::V1);

    let mut lengths = Vec::new();
    for _ in 0..300 {
        let mut packet = Buf::new();
        let pn = client
            .seal_packet(C2S, &header, &[0; 32], &mut packet)
            .expect("seal");
        lengths.push(packet.len());
        server.open_packet(C2S, &mut packet).expect("open");
        client.on_packet_acked(C2S, Epoch::Initial, pn);
    }
    assert_eq!(client.largest_acked(C2S, Epoch::Initial), Some(299));
    assert_eq!(server.largest_received(C2S, Epoch::Initial), Some(299));
    // Every packet is acknowledged right away, so one byte always suffices.
    assert!(lengths.iter().all(|l| *l == lengths[0]));
}
