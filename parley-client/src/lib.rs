//! parley-client: Blocking chat client for the parley protocol
//!
//! [`Client`] issues one request at a time and returns its reply, while a
//! listener thread delivers pushed direct messages and file shares to a
//! [`PushHandler`]. Stream (TCP) and datagram (UDP) transports are supported.

pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod transport;

pub use connection::{
    CallbackHandler, Client, ClientBuilder, IgnorePushes, PushHandler, DEFAULT_TIMEOUT, READY_TICK,
};
pub use parley_protocol::{PushKind, PushNotification, TransportKind};
pub use transport::{parse_transport_kind, Connection, Readiness, TcpTransport, Transport, UdpTransport};
