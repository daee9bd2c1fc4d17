//! Shared helpers for session integration tests.

#![allow(unused)]

use std::sync::Arc;

use transec::{CipherSuite, Config, Direction, Epoch, HandshakeStatus};
use transec::{ProtocolVersion, Purpose, Role, SecretId, Session};

pub const C2S: Direction = Direction::ClientToServer;
pub const S2C: Direction = Direction::ServerToClient;

pub fn config(suite: CipherSuite, version: ProtocolVersion) -> Arc<Config> {
    Arc::new(
        Config::builder()
            .cipher_suite(suite)
            .protocol_version(version)
            .build()
            .expect("build config"),
    )
}

pub fn pair(config: Arc<Config>) -> (Session, Session) {
    let client = Session::new(Arc::clone(&config), Role::Client).expect("client session");
    let server = Session::new(config, Role::Server).expect("server session");
    (client, server)
}

/// Feed both sides the same handshake up to the handshake keys.
pub fn to_handshake(client: &mut Session, server: &mut Session, shared: &[u8]) {
    for s in [client, server] {
        s.update_transcript(b"\x01\x00\x00\x04ch!!");
        s.update_transcript(b"\x02\x00\x00\x04sh!!");
        s.derive_handshake(shared).expect("handshake secrets");
    }
}

/// Continue through server Finished and derive the application keys.
pub fn to_application(client: &mut Session, server: &mut Session) {
    for s in [client, server] {
        s.update_transcript(b"\x08\x00\x00\x02ee");
        s.update_transcript(b"\x14\x00\x00\x03fin");
        s.derive_application().expect("application secrets");
    }
}

pub fn set_status(sessions: [&mut Session; 2], status: HandshakeStatus) {
    for s in sessions {
        s.set_status(C2S, status).expect("client to server status");
        s.set_status(S2C, status).expect("server to client status");
    }
}

pub fn secret(session: &Session, role: Role, epoch: Epoch, purpose: Purpose) -> Vec<u8> {
    session
        .secrets()
        .get(SecretId::new(role, epoch, purpose))
        .expect("secret")
        .as_bytes()
        .to_vec()
}
