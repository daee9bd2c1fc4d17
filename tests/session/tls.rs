//! TLS 1.2 and TLS 1.3 over a stream.

use transec::crypto::Buf;
use transec::{CipherSuite, ContentType, Epoch, Error, HandshakeStatus, ProtocolVersion};
use transec::{Purpose, Role, Session};

use crate::common::*;

fn exchange(from: &mut Session, to: &mut Session, direction: transec::Direction, msg: &[u8]) {
    let mut record = Buf::new();
    from.seal_record(direction, ContentType::ApplicationData, msg, &mut record)
        .expect("seal");
    let opened = to.open_record(direction, &mut record).expect("open");
    assert_eq!(opened.content_type, ContentType::ApplicationData);
    assert_eq!(&record[opened.payload], msg);
}

#[test]
fn tls13_handshake_with_retry() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(config(
        CipherSuite::TLS_AES_128_GCM_SHA256,
        ProtocolVersion::Tls13,
    ));

    let ch1 = b"\x01\x00\x00\x05first";
    for s in [&mut client, &mut server] {
        s.update_transcript(ch1);
        s.reset_transcript_for_retry(ch1).expect("retry substitution");
        assert_eq!(
            s.reset_transcript_for_retry(ch1),
            Err(Error::TranscriptMisuse("retry substitution already applied"))
        );
        s.update_transcript(b"\x02\x00\x00\x03hrr");
    }
    to_handshake(&mut client, &mut server, &[0x5a; 32]);
    set_status([&mut client, &mut server], HandshakeStatus::Handshake);

    assert_eq!(
        secret(&client, Role::Server, Epoch::Handshake, Purpose::Key),
        secret(&server, Role::Server, Epoch::Handshake, Purpose::Key)
    );

    // Server Finished over ClientHello..CertificateVerify.
    client.update_transcript(b"\x08\x00\x00\x02ee");
    server.update_transcript(b"\x08\x00\x00\x02ee");
    let verify = server.finished_verify_data(Role::Server).expect("verify data");
    assert_eq!(verify.len(), 32);
    assert_eq!(verify, client.finished_verify_data(Role::Server).expect("verify data"));

    let mut record = Buf::new();
    server
        .seal_record(S2C, ContentType::Handshake, &verify, &mut record)
        .expect("seal finished");
    let opened = client.open_record(S2C, &mut record).expect("open finished");
    assert_eq!(opened.content_type, ContentType::Handshake);
    assert_eq!(&record[opened.payload], &verify[..]);

    for s in [&mut client, &mut server] {
        s.update_transcript(b"\x14\x00\x00\x03fin");
        s.derive_application().expect("application secrets");
    }
    set_status([&mut client, &mut server], HandshakeStatus::Application);

    exchange(&mut client, &mut server, C2S, b"GET / HTTP/1.1\r\n\r\n");
    exchange(&mut server, &mut client, S2C, b"HTTP/1.1 200 OK\r\n\r\n");

    let a = client
        .export_keying_material(b"EXPERIMENTAL label", Some(&b"ctx"[..]), 40)
        .expect("export");
    let b = server
        .export_keying_material(b"EXPERIMENTAL label", Some(&b"ctx"[..]), 40)
        .expect("export");
    assert_eq!(a, b);
    assert_eq!(a.len(), 40);
    let other = client
        .export_keying_material(b"EXPERIMENTAL other", Some(&b"ctx"[..]), 40)
        .expect("export");
    assert_ne!(a, other);

    for s in [&mut client, &mut server] {
        s.update_transcript(b"\x14\x00\x00\x03cfn");
        s.derive_resumption_master().expect("resumption master");
    }
    assert_eq!(
        client.resumption_psk(&[0, 1]).expect("psk"),
        server.resumption_psk(&[0, 1]).expect("psk")
    );
}

#[test]
fn tls13_early_data() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(config(
        CipherSuite::TLS_CHACHA20_POLY1305_SHA256,
        ProtocolVersion::Tls13,
    ));

    for s in [&mut client, &mut server] {
        s.extract_early(Some(&[0x77; 32][..])).expect("early secret");
        s.update_transcript(b"\x01\x00\x00\x04ch!!");
        s.derive_early().expect("early traffic");
        s.set_status(C2S, HandshakeStatus::EarlyData).expect("early data");
    }
    assert_eq!(
        server.set_status(S2C, HandshakeStatus::EarlyData),
        Err(Error::InvalidTransition(
            S2C,
            HandshakeStatus::Initial,
            HandshakeStatus::EarlyData
        ))
    );

    exchange(&mut client, &mut server, C2S, b"0-rtt request");

    for s in [&mut client, &mut server] {
        s.update_transcript(b"\x02\x00\x00\x04sh!!");
        s.derive_handshake(&[0x11; 32]).expect("handshake secrets");
    }
    set_status([&mut client, &mut server], HandshakeStatus::Handshake);

    let mut record = Buf::new();
    client
        .seal_record(C2S, ContentType::Handshake, b"finished", &mut record)
        .expect("seal");
    let opened = server.open_record(C2S, &mut record).expect("open");
    assert_eq!(opened.sequence, Some(0));
}

#[test]
fn tls13_all_suites() {
    for suite in [
        CipherSuite::TLS_AES_128_GCM_SHA256,
        CipherSuite::TLS_AES_256_GCM_SHA384,
        CipherSuite::TLS_CHACHA20_POLY1305_SHA256,
        CipherSuite::TLS_AES_128_CCM_SHA256,
        CipherSuite::TLS_AES_128_CCM_8_SHA256,
    ] {
        let (mut client, mut server) = pair(config(suite, ProtocolVersion::Tls13));
        to_handshake(&mut client, &mut server, &[3; 48]);
        to_application(&mut client, &mut server);
        set_status([&mut client, &mut server], HandshakeStatus::Application);

        for i in 0..5u8 {
            exchange(&mut client, &mut server, C2S, &vec![i; 100 * usize::from(i)]);
            exchange(&mut server, &mut client, S2C, &[i]);
        }
    }
}

#[test]
fn tls13_ciphertext_bound() {
    let config = std::sync::Arc::new(
        transec::Config::builder()
            .max_ciphertext_len(64)
            .build()
            .expect("build config"),
    );
    let (mut client, mut server) = pair(config);
    to_handshake(&mut client, &mut server, &[1; 32]);
    set_status([&mut client, &mut server], HandshakeStatus::Handshake);

    let mut record = Buf::new();
    client
        .seal_record(C2S, ContentType::Handshake, &[0; 47], &mut record)
        .expect("fits");
    assert!(matches!(
        client.seal_record(C2S, ContentType::Handshake, &[0; 48], &mut Buf::new()),
        Err(Error::RecordTooLarge(65, 64))
    ));
    server.open_record(C2S, &mut record).expect("open");
}

#[test]
fn tls12_extended_master_secret_binds_transcript() {
    let finished = |ems: bool, transcript: &[u8]| {
        let config = std::sync::Arc::new(
            transec::Config::builder()
                .cipher_suite(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256)
                .protocol_version(ProtocolVersion::Tls12)
                .with_extended_master_secret(ems)
                .build()
                .expect("build config"),
        );
        let (mut client, _) = pair(config);
        client.set_client_random(&[1; 32]);
        client.set_server_random(&[2; 32]);
        client.update_transcript(transcript);
        client.derive_tls12(&[9; 32]).expect("master secret");
        client.finished_verify_data(Role::Client).expect("verify data")
    };

    assert_eq!(finished(true, b"a").len(), 12);
    // The Finished hash covers the transcript either way, the master secret
    // only with EMS.
    assert_ne!(finished(true, b"a"), finished(false, b"a"));
    assert_eq!(finished(false, b"a"), finished(false, b"a"));
}

#[test]
fn tls12_cbc_records() {
    let _ = env_logger::try_init();

    for suite in [
        CipherSuite::ECDHE_RSA_AES128_CBC_SHA,
        CipherSuite::ECDHE_ECDSA_AES256_CBC_SHA384,
    ] {
        let (mut client, mut server) = pair(config(suite, ProtocolVersion::Tls12));
        for s in [&mut client, &mut server] {
            s.set_client_random(&[0xc1; 32]);
            s.set_server_random(&[0x5e; 32]);
            s.derive_tls12(&[0x42; 48]).expect("key block");
        }
        set_status([&mut client, &mut server], HandshakeStatus::Application);

        for len in [0, 1, 15, 16, 17, 1000] {
            exchange(&mut client, &mut server, C2S, &vec![0xab; len]);
        }

        let mut record = Buf::new();
        client
            .seal_record(C2S, ContentType::ApplicationData, b"tamper me", &mut record)
            .expect("seal");
        let last = record.len() - 1;
        record[last] ^= 0x80;
        assert_eq!(
            server.open_record(C2S, &mut record),
            Err(Error::AuthenticationFailed)
        );
    }
}
