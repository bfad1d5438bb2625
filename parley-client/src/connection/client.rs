//! Command API over a shared connection

use std::io::Read;
use std::net::ToSocketAddrs;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parley_protocol::{
    expect_ok, format_response, is_ok, parse_user_list, ClientCodec, Request, TransportKind,
    CHUNK_SIZE,
};
use parley_utils::{ParleyError, Result};
use tokio_util::codec::Encoder;

use super::coordinator::Coordinator;
use super::handler::PushHandler;
use super::listener;
use super::reader::codec_error;
use crate::transport::{Connection, Transport};

/// Timeout applied to every wait unless the builder says otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configures and opens a [`Client`]
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    transport: TransportKind,
    timeout: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stream,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream (TCP) or datagram (UDP) transport
    pub fn transport(mut self, kind: TransportKind) -> Self {
        self.transport = kind;
        self
    }

    /// How long a command waits for its reply
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect to `addr` and start the listener thread
    pub fn connect(
        self,
        addr: impl ToSocketAddrs,
        handler: impl PushHandler + 'static,
    ) -> Result<Client> {
        self.check_timeout()?;
        let conn = Connection::open(self.transport, addr, self.timeout)?;
        Client::start(conn, self.timeout, Box::new(handler))
    }

    /// Use an already established transport; the builder's kind is ignored
    pub fn with_transport(
        self,
        transport: Box<dyn Transport>,
        handler: impl PushHandler + 'static,
    ) -> Result<Client> {
        self.check_timeout()?;
        let conn = Connection::from_transport(transport, self.timeout)?;
        Client::start(conn, self.timeout, Box::new(handler))
    }

    fn check_timeout(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ParleyError::config("timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Chat client
///
/// Commands are synchronous: each sends one request and returns once its
/// reply has been read. Pushed messages are delivered to the handler on the
/// listener thread. Issue one command at a time per client.
pub struct Client {
    coordinator: Arc<Coordinator>,
    kind: TransportKind,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Connect over TCP with the default timeout
    pub fn connect(addr: impl ToSocketAddrs, handler: impl PushHandler + 'static) -> Result<Self> {
        ClientBuilder::new().connect(addr, handler)
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    fn start(conn: Connection, timeout: Duration, handler: Box<dyn PushHandler>) -> Result<Self> {
        let kind = conn.kind();
        let coordinator = Arc::new(Coordinator::new(conn, timeout));
        let handle = listener::spawn(coordinator.clone(), handler)?;
        Ok(Self {
            coordinator,
            kind,
            listener: Mutex::new(Some(handle)),
        })
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.kind
    }

    pub fn timeout(&self) -> Duration {
        self.coordinator.timeout()
    }

    pub fn is_closed(&self) -> bool {
        match self.coordinator.lock() {
            Ok(state) => state.closed,
            Err(_) => true,
        }
    }

    /// `LOGIN <userid>`; returns the formatted status line
    pub fn login(&self, userid: &str) -> Result<String> {
        let raw = self.request(Request::Login {
            userid: userid.to_string(),
        })?;
        Ok(format_response(&raw))
    }

    /// `WHO`; returns the logged in users in server order
    pub fn who(&self) -> Result<Vec<String>> {
        let raw = self.request(Request::Who)?;
        parse_user_list(&raw).map_err(codec_error)
    }

    /// `LOGOUT`; anything but `OK!` is an invalid response
    pub fn logout(&self) -> Result<()> {
        let raw = self.request(Request::Logout)?;
        expect_ok(&raw).map_err(codec_error)
    }

    /// `SEND`; direct message to one user
    pub fn send(&self, recipient: &str, message: impl Into<Bytes>) -> Result<String> {
        let raw = self.request(Request::Send {
            recipient: recipient.to_string(),
            message: message.into(),
        })?;
        Ok(format_response(&raw))
    }

    /// `BROADCAST`; message to every logged in user
    pub fn broadcast(&self, message: impl Into<Bytes>) -> Result<String> {
        let raw = self.request(Request::Broadcast {
            message: message.into(),
        })?;
        Ok(format_response(&raw))
    }

    /// `SHARE`; upload a file to one user
    ///
    /// The header and every chunk of at most [`CHUNK_SIZE`] bytes are each
    /// acknowledged before the next is sent. The first reply that is not
    /// `OK!` ends the transfer. Returns the formatted final reply.
    pub fn share(&self, recipient: &str, data: &[u8]) -> Result<String> {
        let header = encode(Request::Share {
            recipient: recipient.to_string(),
            length: data.len(),
        })?;
        let timeout = self.coordinator.timeout();

        let mut exchange = self.coordinator.begin()?;
        let mut reply = exchange.round(&header, timeout)?;
        if !is_ok(&reply) {
            tracing::debug!(recipient, "share refused");
            return Ok(format_response(&reply));
        }

        for (index, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
            reply = exchange.round(chunk, timeout)?;
            if !is_ok(&reply) {
                tracing::debug!(recipient, chunk = index, "share aborted by server");
                return Ok(format_response(&reply));
            }
        }

        tracing::debug!(recipient, bytes = data.len(), "share complete");
        Ok(format_response(&reply))
    }

    /// Read all of `reader` and share it
    pub fn share_reader(&self, recipient: &str, mut reader: impl Read) -> Result<String> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.share(recipient, &data)
    }

    /// Send raw request bytes and return the raw reply
    pub fn send_and_wait(&self, request: &[u8], timeout: Duration) -> Result<Bytes> {
        self.coordinator.begin()?.round(request, timeout)
    }

    fn request(&self, request: Request) -> Result<Bytes> {
        let name = request.name();
        let bytes = encode(request)?;
        tracing::debug!(request = name, "sending request");
        self.send_and_wait(&bytes, self.coordinator.timeout())
    }

    /// Close the connection and stop the listener; safe to call repeatedly
    pub fn close(&self) {
        self.coordinator.close();

        let handle = match self.listener.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if listener::on_listener_thread() {
                // closed from a push handler; the thread exits on its own
                return;
            }
            if handle.join().is_err() {
                tracing::error!("listener thread panicked");
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

fn encode(request: Request) -> Result<Vec<u8>> {
    let mut codec = ClientCodec::default();
    let mut buf = BytesMut::new();
    codec.encode(request, &mut buf).map_err(codec_error)?;
    Ok(buf.to_vec())
}
