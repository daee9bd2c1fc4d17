//! Diagnostic hook exposing derived secrets in NSS key log format.
//!
//! Nothing is logged unless a [`KeyLog`] is set on the
//! [`ConfigBuilder`](crate::ConfigBuilder). Secrets are never passed to the
//! `log` facade.

use crate::types::{Epoch, Role};

/// Receiver of derived secrets.
///
/// `label` is one of the NSS key log labels (`CLIENT_HANDSHAKE_TRAFFIC_SECRET`,
/// `SERVER_TRAFFIC_SECRET_0`, `CLIENT_RANDOM`, ...). `client_random` is empty
/// unless the session was told the ClientHello random.
pub trait KeyLog: Send + Sync {
    fn log(&self, label: &str, client_random: &[u8], secret: &[u8]);

    /// Skip work for labels the sink does not care about.
    fn will_log(&self, _label: &str) -> bool {
        true
    }
}

/// Key log that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeyLog;

impl KeyLog for NoKeyLog {
    fn log(&self, _: &str, _: &[u8], _: &[u8]) {}

    fn will_log(&self, _: &str) -> bool {
        false
    }
}

/// NSS label for a traffic secret.
///
/// `generation` counts key updates; only application secrets have more than one.
/// QUIC Initial secrets are derivable from the wire and have no label.
pub(crate) fn traffic_secret_label(role: Role, epoch: Epoch, generation: u64) -> Option<String> {
    let side = match role {
        Role::Client => "CLIENT",
        Role::Server => "SERVER",
    };
    match epoch {
        Epoch::Initial => None,
        Epoch::Early if role == Role::Client => Some("CLIENT_EARLY_TRAFFIC_SECRET".to_string()),
        Epoch::Early => None,
        Epoch::Handshake => Some(format!("{}_HANDSHAKE_TRAFFIC_SECRET", side)),
        Epoch::Application => Some(format!("{}_TRAFFIC_SECRET_{}", side, generation)),
    }
}

pub(crate) const EXPORTER_SECRET: &str = "EXPORTER_SECRET";

/// TLS 1.2 master secret.
pub(crate) const CLIENT_RANDOM: &str = "CLIENT_RANDOM";
