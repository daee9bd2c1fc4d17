//! DTLS 1.2 and DTLS 1.3 record protection.

use transec::crypto::Buf;
use transec::{CipherSuite, ContentType, Epoch, Error, HandshakeStatus, ProtocolVersion};

use crate::common::*;

#[test]
fn dtls13_reordered_flight() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(config(
        CipherSuite::TLS_AES_256_GCM_SHA384,
        ProtocolVersion::Dtls13,
    ));

    // ClientHello goes out in the clear.
    let mut hello = Buf::new();
    let seq = client
        .seal_dtls13_record(C2S, ContentType::Handshake, b"client hello", &mut hello)
        .expect("seal hello");
    assert_eq!(seq, 0);
    assert_eq!(hello[0], 22);
    let opened = server.open_dtls13_record(C2S, &mut hello).expect("open hello");
    assert_eq!(opened.sequence, Some(0));
    assert_eq!(&hello[opened.payload], b"client hello");

    to_handshake(&mut client, &mut server, &[0x33; 48]);
    set_status([&mut client, &mut server], HandshakeStatus::Handshake);

    let flight: Vec<Buf> = (0..6u8)
        .map(|i| {
            let mut out = Buf::new();
            server
                .seal_dtls13_record(S2C, ContentType::Handshake, &[i; 20], &mut out)
                .expect("seal flight");
            out
        })
        .collect();

    for i in [3, 0, 5, 1, 4, 2] {
        let mut record = flight[i].clone();
        let opened = client.open_dtls13_record(S2C, &mut record).expect("open");
        assert_eq!(opened.sequence, Some(i as u64));
        assert_eq!(&record[opened.payload], &[i as u8; 20]);
    }
    assert_eq!(client.largest_received(S2C, Epoch::Handshake), Some(5));

    let mut again = flight[4].clone();
    assert_eq!(
        client.open_dtls13_record(S2C, &mut again),
        Err(Error::Replayed(4))
    );
}

#[test]
fn dtls13_record_number_is_encrypted() {
    let (mut client, mut server) = pair(config(
        CipherSuite::TLS_AES_128_GCM_SHA256,
        ProtocolVersion::Dtls13,
    ));
    to_handshake(&mut client, &mut server, &[0x44; 32]);
    to_application(&mut client, &mut server);
    set_status([&mut client, &mut server], HandshakeStatus::Application);

    let mut sequences = Vec::new();
    for _ in 0..8 {
        let mut out = Buf::new();
        client
            .seal_dtls13_record(C2S, ContentType::ApplicationData, b"same", &mut out)
            .expect("seal");
        // first byte, 16 bit sequence, 16 bit length
        sequences.push([out[1], out[2]]);
        let opened = server.open_dtls13_record(C2S, &mut out).expect("open");
        assert_eq!(&out[opened.payload], b"same");
    }
    // Plain sequence numbers would read 0..8 on the wire.
    let plain: Vec<[u8; 2]> = (0..8u8).map(|i| [0, i]).collect();
    assert_ne!(sequences, plain);
}

#[test]
fn dtls13_truncated_record() {
    let (mut client, mut server) = pair(config(
        CipherSuite::TLS_AES_128_GCM_SHA256,
        ProtocolVersion::Dtls13,
    ));
    to_handshake(&mut client, &mut server, &[0x44; 32]);
    set_status([&mut client, &mut server], HandshakeStatus::Handshake);

    let mut out = Buf::new();
    client
        .seal_dtls13_record(C2S, ContentType::Handshake, b"finished", &mut out)
        .expect("seal");
    let len = out.len();
    assert!(matches!(
        server.open_dtls13_record(C2S, &mut out[..len - 1]),
        Err(Error::MalformedHeader(_))
    ));
}

#[test]
fn dtls12_epoch_change() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(config(
        CipherSuite::ECDHE_ECDSA_AES128_CBC_SHA256,
        ProtocolVersion::Dtls12,
    ));

    let mut flight = Buf::new();
    for msg in [&b"client hello"[..], b"client key exchange"] {
        client
            .seal_dtls12_record(C2S, ContentType::Handshake, msg, &mut flight)
            .expect("seal plaintext");
    }
    let opened = server.open_dtls12_record(C2S, &mut flight).expect("first");
    let rest = opened.record_len;
    let opened = server
        .open_dtls12_record(C2S, &mut flight[rest..])
        .expect("second");
    assert_eq!(opened.sequence, Some(1));

    for s in [&mut client, &mut server] {
        s.set_client_random(&[0x0c; 32]);
        s.set_server_random(&[0x05; 32]);
        s.update_transcript(b"client hello .. client key exchange");
        s.derive_tls12(&[0x99; 32]).expect("key block");
    }
    set_status([&mut client, &mut server], HandshakeStatus::Application);
    assert_eq!(client.current_epoch(C2S), Some(Epoch::Application));

    let verify = client
        .finished_verify_data(transec::Role::Client)
        .expect("verify data");
    let mut record = Buf::new();
    let seq = client
        .seal_dtls12_record(C2S, ContentType::Handshake, &verify, &mut record)
        .expect("seal finished");
    assert_eq!(seq, 0);
    let opened = server.open_dtls12_record(C2S, &mut record).expect("open");
    assert_eq!(&record[opened.payload], &verify[..]);

    // Application data never travels in epoch 0.
    let mut forged = [23, 0xfe, 0xfd, 0, 0, 0, 0, 0, 0, 0, 9, 0, 1, 0];
    assert!(matches!(
        server.open_dtls12_record(C2S, &mut forged),
        Err(Error::MalformedHeader(_))
    ));
}
