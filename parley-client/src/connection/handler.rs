//! Push handler trait and utilities

use parley_protocol::PushNotification;

/// Trait for handling notifications the server pushes unprompted
///
/// Called on the listener thread. A slow handler delays delivery of later
/// pushes but never blocks a command waiting for its reply. Commands issued
/// from inside a handler time out, since only the listener can hand them the
/// read.
pub trait PushHandler: Send {
    /// Handle a pushed direct message or file share
    fn handle(&mut self, push: PushNotification);

    /// Called once when the server closes the connection
    fn on_disconnected(&mut self) {}
}

/// Simple callback-based handler
pub struct CallbackHandler<F>
where
    F: FnMut(PushNotification) + Send,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: FnMut(PushNotification) + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> PushHandler for CallbackHandler<F>
where
    F: FnMut(PushNotification) + Send,
{
    fn handle(&mut self, push: PushNotification) {
        (self.callback)(push);
    }
}

/// Handler that drops every push, for clients that only issue commands
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnorePushes;

impl PushHandler for IgnorePushes {
    fn handle(&mut self, push: PushNotification) {
        tracing::debug!(kind = %push.kind(), sender = push.sender(), "ignoring push");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn message(sender: &str, body: &'static [u8]) -> PushNotification {
        PushNotification::DirectMessage {
            sender: sender.into(),
            body: Bytes::from_static(body),
        }
    }

    #[test]
    fn test_callback_handler_receives_pushes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let mut handler = CallbackHandler::new(move |_push| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        handler.handle(message("alice", b"one"));
        handler.handle(message("bob", b"two"));

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_handler_sees_both_kinds() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let mut handler = CallbackHandler::new(move |push: PushNotification| {
            seen_clone
                .lock()
                .unwrap()
                .push((push.kind(), push.sender().to_string()));
        });

        handler.handle(message("alice", b"hi"));
        handler.handle(PushNotification::FileShare {
            sender: "bob".into(),
            payload: Bytes::from_static(b"\x00\x01"),
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, "alice");
        assert_eq!(seen[1].0, parley_protocol::PushKind::FileShare);
    }

    struct TestHandler {
        disconnected_called: bool,
    }

    impl PushHandler for TestHandler {
        fn handle(&mut self, _push: PushNotification) {}

        fn on_disconnected(&mut self) {
            self.disconnected_called = true;
        }
    }

    #[test]
    fn test_push_handler_on_disconnected() {
        let mut handler = TestHandler {
            disconnected_called: false,
        };
        handler.on_disconnected();
        assert!(handler.disconnected_called);
    }

    #[test]
    fn test_callback_handler_default_on_disconnected() {
        let mut handler = CallbackHandler::new(|_| {});
        // Default implementation should do nothing and not panic
        handler.on_disconnected();
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn test_handlers_are_send() {
        assert_send::<CallbackHandler<fn(PushNotification)>>();
        assert_send::<IgnorePushes>();
    }
}
