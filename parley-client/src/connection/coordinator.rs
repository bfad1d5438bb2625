//! Hands the connection's read side back and forth
//!
//! One mutex guards all shared state and one condition variable carries
//! every hand-off. A foreground command sends its request and sets
//! `waiting`; the listener, on seeing the socket become readable while
//! `waiting` is set, grants the read instead of performing it and then
//! parks until that round is finished. The foreground caller reads exactly
//! one reply and clears `waiting`.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use parley_protocol::{Frame, PushNotification};
use parley_utils::{ParleyError, Result};

use super::reader::FrameReader;
use crate::transport::Connection;

/// Everything the listener and a foreground command share
pub(crate) struct ClientState {
    /// The connection has been released; nothing may read or send
    pub(crate) closed: bool,
    /// A foreground command owns the next reply
    pub(crate) waiting: bool,
    /// The listener has handed the current round's read to the caller
    pub(crate) granted: bool,
    /// Incremented per request/response round so the listener can tell a
    /// finished round from the next one
    pub(crate) round: u64,
    pub(crate) conn: Connection,
    pub(crate) reader: FrameReader,
    /// Pushes read by a foreground caller, dispatched later by the listener
    pub(crate) deferred: Vec<PushNotification>,
}

impl ClientState {
    pub(crate) fn new(conn: Connection) -> Self {
        let reader = FrameReader::new(conn.kind());
        Self {
            closed: false,
            waiting: false,
            granted: false,
            round: 0,
            conn,
            reader,
            deferred: Vec::new(),
        }
    }

    /// Release the connection; later calls do nothing
    pub(crate) fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.conn.close();
            self.reader.reset();
        }
    }

    fn finish_round(&mut self) {
        self.waiting = false;
        self.granted = false;
    }
}

/// The mutex, condition variable, and default timeout shared with the listener
pub(crate) struct Coordinator {
    state: Mutex<ClientState>,
    cond: Condvar,
    timeout: Duration,
}

impl Coordinator {
    pub(crate) fn new(conn: Connection, timeout: Duration) -> Self {
        Self {
            state: Mutex::new(ClientState::new(conn)),
            cond: Condvar::new(),
            timeout,
        }
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, ClientState>> {
        self.state
            .lock()
            .map_err(|_| ParleyError::internal("client state lock poisoned"))
    }

    pub(crate) fn notify(&self) {
        self.cond.notify_all();
    }

    /// Park the listener after granting a read, until that round ends
    pub(crate) fn wait_round_finished<'a>(
        &self,
        guard: MutexGuard<'a, ClientState>,
    ) -> Result<MutexGuard<'a, ClientState>> {
        let round = guard.round;
        self.cond
            .wait_while(guard, |s| s.waiting && s.round == round && !s.closed)
            .map_err(|_| ParleyError::internal("client state lock poisoned"))
    }

    /// Close from any thread; wakes everyone parked on the condition variable
    pub(crate) fn close(&self) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.close();
        drop(state);
        self.cond.notify_all();
    }

    /// Claim the connection for a request/response exchange
    ///
    /// The lock is held for the whole exchange, apart from the waits inside
    /// each round, so a multi-round transfer is never interleaved with
    /// another command.
    pub(crate) fn begin(&self) -> Result<Exchange<'_>> {
        let guard = self.lock()?;
        if guard.closed {
            return Err(ParleyError::ConnectionClosed);
        }
        Ok(Exchange {
            coordinator: self,
            guard: Some(guard),
        })
    }
}

/// A claimed connection; each `round` is one request and its single reply
pub(crate) struct Exchange<'a> {
    coordinator: &'a Coordinator,
    guard: Option<MutexGuard<'a, ClientState>>,
}

impl Exchange<'_> {
    /// Send `request`, wait for the listener's grant, and read one reply
    pub(crate) fn round(&mut self, request: &[u8], timeout: Duration) -> Result<Bytes> {
        let mut state = self
            .guard
            .take()
            .ok_or_else(|| ParleyError::internal("exchange used after failure"))?;
        if state.closed {
            self.guard = Some(state);
            return Err(ParleyError::ConnectionClosed);
        }

        if let Err(e) = state.conn.send(request) {
            self.guard = Some(state);
            return Err(e);
        }
        state.round += 1;
        state.waiting = true;
        state.granted = false;
        tracing::debug!(round = state.round, bytes = request.len(), "sent request, waiting for grant");

        let (mut state, _) = self
            .coordinator
            .cond
            .wait_timeout_while(state, timeout, |s| !s.granted && !s.closed)
            .map_err(|_| ParleyError::internal("client state lock poisoned"))?;

        if !state.granted {
            state.finish_round();
            let closed = state.closed;
            self.guard = Some(state);
            return Err(if closed {
                ParleyError::ConnectionClosed
            } else {
                tracing::debug!(?timeout, "no reply before timeout");
                ParleyError::timeout(timeout)
            });
        }

        tracing::debug!(round = state.round, "got grant, receiving reply");
        let result = read_reply(&mut state);
        state.finish_round();
        if matches!(result, Err(ParleyError::ConnectionClosed)) {
            state.close();
        }
        self.guard = Some(state);
        self.coordinator.notify();
        result
    }
}

/// Read frames until the reply turns up, setting aside any pushes
fn read_reply(state: &mut ClientState) -> Result<Bytes> {
    loop {
        let ClientState {
            conn,
            reader,
            deferred,
            ..
        } = &mut *state;
        match reader.read_frame(conn)? {
            Some(Frame::Reply(bytes)) => return Ok(bytes),
            Some(Frame::Push(push)) => {
                tracing::debug!(kind = %push.kind(), sender = push.sender(), "push arrived ahead of reply");
                deferred.push(push);
            }
            None => {
                tracing::info!("server closed the connection while a reply was pending");
                return Err(ParleyError::ConnectionClosed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_protocol::TransportKind;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;

    fn coordinator() -> (Arc<Coordinator>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let conn = Connection::open(TransportKind::Stream, addr, Duration::from_secs(2)).unwrap();
        let (server, _) = listener.accept().unwrap();
        (
            Arc::new(Coordinator::new(conn, Duration::from_secs(2))),
            server,
        )
    }

    /// Stand-in for the listener: grant whatever round is pending
    fn grant_once(coordinator: &Coordinator) {
        loop {
            let mut state = coordinator.lock().unwrap();
            if state.waiting && !state.granted {
                state.granted = true;
                coordinator.notify();
                let _state = coordinator.wait_round_finished(state).unwrap();
                return;
            }
            drop(state);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_round_reads_reply_after_grant() {
        let (coord, mut server) = coordinator();

        let granter = {
            let coord = coord.clone();
            std::thread::spawn(move || grant_once(&coord))
        };

        let server_thread = std::thread::spawn(move || {
            let mut buf = [0u8; 4];
            server.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"WHO\n");
            server.write_all(b"OK!\nalice\n").unwrap();
            server
        });

        let mut exchange = coord.begin().unwrap();
        let reply = exchange.round(b"WHO\n", Duration::from_secs(2)).unwrap();
        drop(exchange);
        assert_eq!(reply.as_ref(), b"OK!\nalice\n");

        granter.join().unwrap();
        let _server = server_thread.join().unwrap();

        let state = coord.lock().unwrap();
        assert!(!state.waiting);
        assert!(!state.granted);
    }

    #[test]
    fn test_round_times_out_and_clears_waiting() {
        let (coord, _server) = coordinator();

        let mut exchange = coord.begin().unwrap();
        let err = exchange.round(b"WHO\n", Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, ParleyError::Timeout { .. }));
        drop(exchange);

        let state = coord.lock().unwrap();
        assert!(!state.waiting);
        assert!(!state.closed);
    }

    #[test]
    fn test_push_before_reply_is_deferred() {
        let (coord, mut server) = coordinator();

        let granter = {
            let coord = coord.clone();
            std::thread::spawn(move || grant_once(&coord))
        };
        server.write_all(b"FROM bob 3\nyo!\nOK!\n").unwrap();

        let mut exchange = coord.begin().unwrap();
        let reply = exchange.round(b"LOGIN alice\n", Duration::from_secs(2)).unwrap();
        drop(exchange);
        granter.join().unwrap();

        assert_eq!(reply.as_ref(), b"OK!\n");
        let state = coord.lock().unwrap();
        assert_eq!(state.deferred.len(), 1);
        assert_eq!(state.deferred[0].sender(), "bob");
    }

    #[test]
    fn test_begin_fails_fast_when_closed() {
        let (coord, _server) = coordinator();
        coord.close();
        coord.close();

        assert!(matches!(coord.begin(), Err(ParleyError::ConnectionClosed)));
        assert!(coord.lock().unwrap().conn.is_closed());
    }

    #[test]
    fn test_peer_close_during_round_closes_client() {
        let (coord, server) = coordinator();

        let granter = {
            let coord = coord.clone();
            std::thread::spawn(move || grant_once(&coord))
        };

        let server_thread = std::thread::spawn(move || {
            let mut server = server;
            let mut buf = [0u8; 4];
            server.read_exact(&mut buf).unwrap();
            // hang up instead of replying
        });

        let mut exchange = coord.begin().unwrap();
        let err = exchange.round(b"WHO\n", Duration::from_secs(2)).unwrap_err();
        drop(exchange);
        granter.join().unwrap();
        server_thread.join().unwrap();

        assert!(matches!(err, ParleyError::ConnectionClosed));
        assert!(coord.lock().unwrap().closed);
    }
}
