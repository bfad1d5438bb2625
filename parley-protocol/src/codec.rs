//! Line protocol codec
//!
//! Requests are single `\n`-terminated header lines, optionally followed by a
//! body whose length the header declares. The server side is harder: the
//! bytes coming back are either a reply to the request in flight or one of
//! two unsolicited push frames, and a push body may span several reads.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::messages::{Frame, PushKind, PushNotification, Request};

/// Longest push header we keep buffering while looking for its terminator
const MAX_HEADER_LEN: usize = 256;

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed {kind} header: {header:?}")]
    MalformedHeader { kind: PushKind, header: String },

    #[error("Invalid length {value:?} in {kind} header")]
    InvalidLength { kind: PushKind, value: String },

    #[error("Sender in {kind} header is not valid UTF-8")]
    InvalidSender { kind: PushKind },

    #[error("Invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("Expected {expected:?}, got {got:?}")]
    UnexpectedReply { expected: String, got: String },
}

/// How the bytes reach us
///
/// Push frames only exist on stream transports. Every datagram is a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Stream,
    Datagram,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Stream => f.write_str("stream"),
            TransportKind::Datagram => f.write_str("datagram"),
        }
    }
}

/// A push frame whose header is parsed but whose body is still short
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingBody {
    pub kind: PushKind,
    /// Bytes still missing, including the trailing newline of a `FROM` body
    pub remaining: usize,
}

#[derive(Debug)]
struct PushHeader {
    sender: String,
    length: usize,
    /// Offset of the first body byte in the buffer
    body_start: usize,
}

/// Codec for Request (encoding) and Frame (decoding), used by the client
#[derive(Debug, Default)]
pub struct ClientCodec {
    transport: TransportKind,
    pending: Option<PendingBody>,
}

impl ClientCodec {
    pub fn new(transport: TransportKind) -> Self {
        Self {
            transport,
            pending: None,
        }
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Set when the last `decode` call stopped inside a push body
    pub fn pending(&self) -> Option<PendingBody> {
        self.pending
    }

    fn decode_stream(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        let kind = match push_kind(src) {
            Some(kind) => kind,
            None if is_header_prefix(src) => return Ok(None),
            None => {
                return Ok(reply_len(src).map(|len| Frame::Reply(src.split_to(len).freeze())));
            }
        };

        let Some(header) = parse_header(kind, src)? else {
            return Ok(None);
        };

        let needed = match kind {
            PushKind::DirectMessage => header.length + 1,
            PushKind::FileShare => header.length,
        };
        let available = src.len() - header.body_start;
        if available < needed {
            self.pending = Some(PendingBody {
                kind,
                remaining: needed - available,
            });
            return Ok(None);
        }

        src.advance(header.body_start);
        let data = src.split_to(header.length).freeze();
        let push = match kind {
            PushKind::DirectMessage => {
                if src.first() == Some(&b'\n') {
                    src.advance(1);
                } else {
                    tracing::warn!(sender = %header.sender, "got incoming message without an ending newline");
                }
                PushNotification::DirectMessage {
                    sender: header.sender,
                    body: data,
                }
            }
            PushKind::FileShare => PushNotification::FileShare {
                sender: header.sender,
                payload: data,
            },
        };
        Ok(Some(Frame::Push(push)))
    }
}

impl Decoder for ClientCodec {
    type Item = Frame;
    type Error = CodecError;

    /// Decode the next frame, discarding the buffer if it cannot be framed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.pending = None;
        if src.is_empty() {
            return Ok(None);
        }
        if self.transport == TransportKind::Datagram {
            return Ok(Some(Frame::Reply(src.split().freeze())));
        }
        match self.decode_stream(src) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                src.clear();
                Err(e)
            }
        }
    }
}

impl Encoder<Request> for ClientCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Request::Login { userid } => {
                check_token("userid", &userid)?;
                put_header(dst, &format!("LOGIN {}", userid));
            }
            Request::Who => put_header(dst, "WHO"),
            Request::Logout => put_header(dst, "LOGOUT"),
            Request::Send { recipient, message } => {
                check_token("recipient", &recipient)?;
                put_header(dst, &format!("SEND {} {}", recipient, message.len()));
                dst.put_slice(&message);
            }
            Request::Broadcast { message } => {
                put_header(dst, &format!("BROADCAST {}", message.len()));
                dst.put_slice(&message);
            }
            Request::Share { recipient, length } => {
                check_token("recipient", &recipient)?;
                put_header(dst, &format!("SHARE {} {}", recipient, length));
            }
        }
        Ok(())
    }
}

fn put_header(dst: &mut BytesMut, line: &str) {
    dst.reserve(line.len() + 1);
    dst.put_slice(line.as_bytes());
    dst.put_u8(b'\n');
}

/// User ids travel as one space-separated header token
fn check_token(field: &'static str, value: &str) -> Result<(), CodecError> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(CodecError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn push_kind(src: &[u8]) -> Option<PushKind> {
    if src.starts_with(b"FROM ") {
        Some(PushKind::DirectMessage)
    } else if src.starts_with(b"SHARE ") {
        Some(PushKind::FileShare)
    } else {
        None
    }
}

/// Where the reply at the front of `src` ends
///
/// A reply runs to the end of the buffer unless one of its lines is
/// followed by a push header, in which case it ends after that line. `None`
/// while the bytes after the last newline could still turn into a header.
fn reply_len(src: &[u8]) -> Option<usize> {
    for (i, _) in src.iter().enumerate().filter(|(_, &b)| b == b'\n') {
        let rest = &src[i + 1..];
        if rest.is_empty() {
            break;
        }
        if push_kind(rest).is_some() {
            return Some(i + 1);
        }
        if is_header_prefix(rest) {
            return None;
        }
    }
    Some(src.len())
}

/// A short read that could still grow into a push header
fn is_header_prefix(src: &[u8]) -> bool {
    b"FROM ".starts_with(src) || b"SHARE ".starts_with(src)
}

/// Parse `<KEYWORD> <sender> <length>` followed by its terminator
///
/// A `FROM` length may also be terminated by a space, with the body
/// following on the same line. Returns `None` until the terminator arrives.
fn parse_header(kind: PushKind, src: &[u8]) -> Result<Option<PushHeader>, CodecError> {
    let sender_start = kind.keyword().len() + 1;
    let malformed = || CodecError::MalformedHeader {
        kind,
        header: header_preview(src),
    };

    let Some(sender_len) = src[sender_start..].iter().position(|&b| b == b' ' || b == b'\n') else {
        return incomplete(src, malformed);
    };
    let sender_end = sender_start + sender_len;
    if src[sender_end] == b'\n' || sender_len == 0 {
        return Err(malformed());
    }

    let length_start = sender_end + 1;
    let is_terminator = |b: u8| match kind {
        PushKind::DirectMessage => b == b' ' || b == b'\n',
        PushKind::FileShare => b == b'\n',
    };
    let Some(length_len) = src[length_start..].iter().position(|&b| is_terminator(b)) else {
        return incomplete(src, malformed);
    };
    let length_end = length_start + length_len;

    let sender = std::str::from_utf8(&src[sender_start..sender_end])
        .map_err(|_| CodecError::InvalidSender { kind })?
        .to_string();
    let raw_length = &src[length_start..length_end];
    let length = std::str::from_utf8(raw_length)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| CodecError::InvalidLength {
            kind,
            value: String::from_utf8_lossy(raw_length).into_owned(),
        })?;

    Ok(Some(PushHeader {
        sender,
        length,
        body_start: length_end + 1,
    }))
}

fn incomplete(
    src: &[u8],
    malformed: impl FnOnce() -> CodecError,
) -> Result<Option<PushHeader>, CodecError> {
    if src.len() > MAX_HEADER_LEN {
        Err(malformed())
    } else {
        Ok(None)
    }
}

fn header_preview(src: &[u8]) -> String {
    let end = src
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(src.len())
        .min(64);
    String::from_utf8_lossy(&src[..end]).into_owned()
}
