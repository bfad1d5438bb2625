//! parley-protocol: Wire definitions for the parley chat protocol
//!
//! This crate defines the request and frame types exchanged with a chat
//! server over a single line-oriented connection, the codec that tells
//! replies apart from pushed notifications, and reply parsing helpers.

pub mod codec;
pub mod messages;
pub mod reply;

// Re-export main types at crate root
pub use codec::{ClientCodec, CodecError, PendingBody, TransportKind};
pub use messages::{Frame, PushKind, PushNotification, Request};
pub use reply::{expect_ok, format_response, is_ok, parse_user_list, OK_REPLY};

/// Largest number of bytes taken from the transport in one read
pub const BUF_SIZE: usize = 1024;

/// Largest file chunk sent or expected per acknowledged round
pub const CHUNK_SIZE: usize = 1024;
