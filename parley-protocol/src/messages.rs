//! Client-server message types

use bytes::Bytes;

/// Which kind of unsolicited notification the server pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushKind {
    /// `FROM <sender> <len>\n<body>\n`
    DirectMessage,
    /// `SHARE <sender> <len>\n<body>`
    FileShare,
}

impl PushKind {
    /// The header keyword that introduces this push on the wire
    pub fn keyword(self) -> &'static str {
        match self {
            PushKind::DirectMessage => "FROM",
            PushKind::FileShare => "SHARE",
        }
    }
}

impl std::fmt::Display for PushKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// An unsolicited notification pushed by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushNotification {
    /// A private or broadcast message from another user
    DirectMessage { sender: String, body: Bytes },
    /// A file another user shared with us
    FileShare { sender: String, payload: Bytes },
}

impl PushNotification {
    pub fn kind(&self) -> PushKind {
        match self {
            PushNotification::DirectMessage { .. } => PushKind::DirectMessage,
            PushNotification::FileShare { .. } => PushKind::FileShare,
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            PushNotification::DirectMessage { sender, .. }
            | PushNotification::FileShare { sender, .. } => sender,
        }
    }

    /// Message body or file contents
    pub fn data(&self) -> &Bytes {
        match self {
            PushNotification::DirectMessage { body, .. } => body,
            PushNotification::FileShare { payload, .. } => payload,
        }
    }
}

/// One decoded unit read from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Response to whatever request is in flight, passed through untouched
    Reply(Bytes),
    /// Asynchronous notification, never a response to a request
    Push(PushNotification),
}

/// Requests sent from client to server
///
/// `Share` only carries the header; the file body follows in
/// acknowledged chunks of at most [`crate::CHUNK_SIZE`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Login { userid: String },
    Who,
    Logout,
    Send { recipient: String, message: Bytes },
    Broadcast { message: Bytes },
    Share { recipient: String, length: usize },
}

impl Request {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Request::Login { .. } => "LOGIN",
            Request::Who => "WHO",
            Request::Logout => "LOGOUT",
            Request::Send { .. } => "SEND",
            Request::Broadcast { .. } => "BROADCAST",
            Request::Share { .. } => "SHARE",
        }
    }
}
