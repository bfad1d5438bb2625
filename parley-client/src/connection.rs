//! Client-server connection management
//!
//! One connection is shared by a background listener thread, which reads
//! pushed messages, and foreground commands, which read their own replies.
//! The coordinator hands the read side back and forth so only one of them
//! ever reads at a time.

mod client;
mod coordinator;
mod handler;
mod listener;
mod reader;

pub use client::{Client, ClientBuilder, DEFAULT_TIMEOUT};
pub use handler::{CallbackHandler, IgnorePushes, PushHandler};
pub use listener::READY_TICK;
