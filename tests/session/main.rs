mod common;
mod dtls;
mod keylog;
mod quic;
mod tls;
