//! Reassembles frames from raw transport reads

use bytes::BytesMut;
use parley_protocol::{ClientCodec, CodecError, Frame, PushKind, TransportKind, CHUNK_SIZE};
use parley_utils::{ParleyError, Result};
use tokio_util::codec::Decoder;

use crate::transport::Connection;

/// Buffer plus codec shared by whoever currently owns the read
///
/// Lives inside the coordinator's locked state, so holding it proves the
/// right to read from the connection.
pub(crate) struct FrameReader {
    codec: ClientCodec,
    buf: BytesMut,
}

impl FrameReader {
    pub(crate) fn new(transport: TransportKind) -> Self {
        Self {
            codec: ClientCodec::new(transport),
            buf: BytesMut::with_capacity(parley_protocol::BUF_SIZE),
        }
    }

    /// Bytes left over from an earlier read that have not been framed yet
    pub(crate) fn has_buffered(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Drop a partially received frame
    pub(crate) fn reset(&mut self) {
        if !self.buf.is_empty() {
            tracing::debug!(bytes = self.buf.len(), "discarding partial frame");
        }
        self.buf.clear();
    }

    /// Read until one whole frame is available
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    pub(crate) fn read_frame(&mut self, conn: &Connection) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buf).map_err(codec_error)? {
                return Ok(Some(frame));
            }

            let pending = self.codec.pending();
            let chunk = match conn.recv() {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.reset();
                    return Err(e);
                }
            };
            if chunk.is_empty() {
                if !self.buf.is_empty() {
                    tracing::warn!(bytes = self.buf.len(), "peer closed in the middle of a frame");
                    self.buf.clear();
                }
                return Ok(None);
            }

            if let Some(body) = pending {
                if body.kind == PushKind::FileShare && chunk.len() != body.remaining.min(CHUNK_SIZE) {
                    tracing::warn!(
                        got = chunk.len(),
                        expected = body.remaining.min(CHUNK_SIZE),
                        "got invalid chunk while receiving shared file"
                    );
                }
            }
            self.buf.extend_from_slice(&chunk);
        }
    }
}

/// Map a codec failure onto the client error taxonomy
pub(crate) fn codec_error(err: CodecError) -> ParleyError {
    match err {
        CodecError::Io(e) => ParleyError::Io(e),
        CodecError::UnexpectedReply { expected, got } => {
            ParleyError::invalid_response(format!("expected {:?}, got {:?}", expected, got))
        }
        other => ParleyError::protocol(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_protocol::PushNotification;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::time::Duration;

    fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let conn =
            Connection::open(TransportKind::Stream, addr, Duration::from_secs(2)).unwrap();
        let (server, _) = listener.accept().unwrap();
        (conn, server)
    }

    #[test]
    fn test_reads_file_share_in_chunks() {
        let (conn, mut server) = pair();
        let mut reader = FrameReader::new(TransportKind::Stream);

        let payload: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        let writer = std::thread::spawn(move || {
            server.write_all(b"SHARE dave 2500\n").unwrap();
            for chunk in payload.chunks(CHUNK_SIZE) {
                server.write_all(chunk).unwrap();
                std::thread::sleep(Duration::from_millis(10));
            }
            server
        });

        let frame = reader.read_frame(&conn).unwrap().unwrap();
        let _server = writer.join().unwrap();
        match frame {
            Frame::Push(PushNotification::FileShare { sender, payload }) => {
                assert_eq!(sender, "dave");
                assert_eq!(payload.len(), 2500);
                assert_eq!(payload[1000], (1000 % 251) as u8);
            }
            other => panic!("Expected file share, got {:?}", other),
        }
        assert!(!reader.has_buffered());
    }

    #[test]
    fn test_keeps_trailing_bytes_for_next_frame() {
        let (conn, mut server) = pair();
        let mut reader = FrameReader::new(TransportKind::Stream);

        server.write_all(b"FROM alice 5\nhello\nOK!\n").unwrap();

        let first = reader.read_frame(&conn).unwrap().unwrap();
        assert!(matches!(first, Frame::Push(_)));
        assert!(reader.has_buffered());

        let second = reader.read_frame(&conn).unwrap().unwrap();
        assert_eq!(second, Frame::Reply(bytes::Bytes::from_static(b"OK!\n")));
    }

    #[test]
    fn test_eof_returns_none() {
        let (conn, server) = pair();
        let mut reader = FrameReader::new(TransportKind::Stream);
        drop(server);

        assert!(reader.read_frame(&conn).unwrap().is_none());
    }

    #[test]
    fn test_malformed_header_is_protocol_error() {
        let (conn, mut server) = pair();
        let mut reader = FrameReader::new(TransportKind::Stream);

        server.write_all(b"SHARE dave lots\n").unwrap();
        let err = reader.read_frame(&conn).unwrap_err();
        assert!(matches!(err, ParleyError::Protocol(_)));
        assert!(!reader.has_buffered());
    }

    #[test]
    fn test_codec_error_mapping() {
        let err = codec_error(CodecError::UnexpectedReply {
            expected: "OK!".into(),
            got: "ERROR 1 nope".into(),
        });
        assert!(matches!(err, ParleyError::InvalidResponse(_)));

        let err = codec_error(CodecError::InvalidSender {
            kind: PushKind::DirectMessage,
        });
        assert!(matches!(err, ParleyError::Protocol(_)));
    }
}
