//! Background thread that reads everything nobody asked for

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parley_protocol::Frame;
use parley_utils::{ParleyError, Result};

use super::coordinator::Coordinator;
use super::handler::PushHandler;

/// How long one readiness wait lasts before re-checking for shutdown
pub const READY_TICK: Duration = Duration::from_millis(100);

/// Name given to the listener thread
pub(crate) const THREAD_NAME: &str = "parley-listener";

/// Spawn the listener thread
pub(crate) fn spawn(
    coordinator: Arc<Coordinator>,
    handler: Box<dyn PushHandler>,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(THREAD_NAME.into())
        .spawn(move || listen(&coordinator, handler))
        .map_err(ParleyError::Io)
}

/// True when called from the listener thread itself
pub(crate) fn on_listener_thread() -> bool {
    std::thread::current().name() == Some(THREAD_NAME)
}

fn listen(coordinator: &Coordinator, mut handler: Box<dyn PushHandler>) {
    tracing::debug!("listener started");

    let readiness = {
        let state = match coordinator.lock() {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(error = %e, "listener could not start");
                return;
            }
        };
        if state.closed {
            return;
        }
        state.conn.readiness()
    };
    let readiness = match readiness {
        Ok(readiness) => readiness,
        Err(e) => {
            tracing::error!(error = %e, "listener could not watch the connection");
            coordinator.close();
            handler.on_disconnected();
            return;
        }
    };

    loop {
        let (deferred, buffered) = match coordinator.lock() {
            Ok(mut state) => {
                if state.closed {
                    break;
                }
                (std::mem::take(&mut state.deferred), state.reader.has_buffered())
            }
            Err(_) => break,
        };
        for push in deferred {
            handler.handle(push);
        }

        if !buffered {
            match readiness.wait(READY_TICK) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "waiting for the connection failed");
                    coordinator.close();
                    handler.on_disconnected();
                    break;
                }
            }
        }

        let mut state = match coordinator.lock() {
            Ok(state) => state,
            Err(_) => break,
        };
        if state.closed {
            break;
        }
        if !state.reader.has_buffered() && !matches!(readiness.wait(Duration::ZERO), Ok(true)) {
            // someone else consumed what woke us
            continue;
        }

        if state.waiting && !state.granted {
            state.granted = true;
            coordinator.notify();
            match coordinator.wait_round_finished(state) {
                Ok(_) => continue,
                Err(_) => break,
            }
        }

        if state.waiting {
            // a granted round is still being read; let it finish
            drop(state);
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }

        let frame = {
            let state = &mut *state;
            state.reader.read_frame(&state.conn)
        };
        match frame {
            Ok(Some(Frame::Push(push))) => {
                drop(state);
                tracing::debug!(kind = %push.kind(), sender = push.sender(), "dispatching push");
                handler.handle(push);
            }
            Ok(Some(Frame::Reply(raw))) => {
                tracing::error!(
                    header = %String::from_utf8_lossy(&raw).trim_end(),
                    "got invalid message with header"
                );
            }
            Ok(None) => {
                tracing::info!("server closed the connection");
                state.close();
                drop(state);
                coordinator.notify();
                handler.on_disconnected();
                break;
            }
            Err(ParleyError::Timeout { .. }) => {
                tracing::warn!("push body stalled, dropping partial frame");
                state.reader.reset();
            }
            Err(ParleyError::Io(e)) => {
                tracing::error!(error = %e, "connection failed");
                state.close();
                drop(state);
                coordinator.notify();
                handler.on_disconnected();
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to read pushed message");
            }
        }
    }

    tracing::debug!("listener stopped");
}
