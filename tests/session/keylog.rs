//! Key log hook.

use std::sync::{Arc, Mutex};

use transec::{Config, Direction, Epoch, HandshakeStatus, KeyLog, Purpose, Role};

use crate::common::*;

#[derive(Default)]
struct Collect {
    lines: Mutex<Vec<(String, Vec<u8>, Vec<u8>)>>,
}

impl KeyLog for Collect {
    fn log(&self, label: &str, client_random: &[u8], secret: &[u8]) {
        self.lines
            .lock()
            .unwrap()
            .push((label.to_string(), client_random.to_vec(), secret.to_vec()));
    }
}

impl Collect {
    fn labels(&self) -> Vec<String> {
        self.lines.lock().unwrap().iter().map(|l| l.0.clone()).collect()
    }

    fn secret(&self, label: &str) -> Vec<u8> {
        let lines = self.lines.lock().unwrap();
        let line = lines.iter().find(|l| l.0 == label).expect(label);
        line.2.clone()
    }
}

#[test]
fn logs_traffic_secrets_in_nss_format() {
    let _ = env_logger::try_init();

    let sink = Arc::new(Collect::default());
    let config = Arc::new(
        Config::builder()
            .with_key_log(sink.clone())
            .build()
            .expect("build config"),
    );

    let (mut client, mut server) = pair(config);
    client.set_client_random(&[0xcc; 32]);
    to_handshake(&mut client, &mut server, &[0x10; 32]);
    to_application(&mut client, &mut server);

    // Both sessions share the sink; the server never saw the random.
    let lines = sink.lines.lock().unwrap().clone();
    assert!(lines.iter().any(|l| l.1 == [0xcc; 32]));
    assert!(lines.iter().any(|l| l.1.is_empty()));
    drop(lines);

    let labels = sink.labels();
    for label in [
        "CLIENT_HANDSHAKE_TRAFFIC_SECRET",
        "SERVER_HANDSHAKE_TRAFFIC_SECRET",
        "CLIENT_TRAFFIC_SECRET_0",
        "SERVER_TRAFFIC_SECRET_0",
        "EXPORTER_SECRET",
    ] {
        assert!(labels.iter().any(|l| l == label), "missing {}", label);
    }
    assert_eq!(
        sink.secret("CLIENT_HANDSHAKE_TRAFFIC_SECRET"),
        secret(&client, Role::Client, Epoch::Handshake, Purpose::TrafficSecret)
    );

    for s in [&mut client, &mut server] {
        s.set_status(Direction::ClientToServer, HandshakeStatus::Application)
            .expect("application");
    }
    client.key_update(C2S).expect("key update");
    assert!(sink.labels().iter().any(|l| l == "CLIENT_TRAFFIC_SECRET_1"));
    assert_eq!(
        sink.secret("CLIENT_TRAFFIC_SECRET_1"),
        secret(&client, Role::Client, Epoch::Application, Purpose::TrafficSecret)
    );
}

#[test]
fn nothing_is_logged_by_default() {
    let config = Arc::new(Config::default());
    assert!(config.key_log().is_none());
    let (mut client, mut server) = pair(config);
    to_handshake(&mut client, &mut server, &[0x10; 32]);
    // Debug output never carries secret bytes.
    let debug = format!("{:?}", client.secrets());
    let key = format!("{:?}", secret(&client, Role::Client, Epoch::Handshake, Purpose::Key));
    assert!(!debug.contains(&key[1..key.len() - 1]));
    assert!(debug.contains("len: 16"));
}
