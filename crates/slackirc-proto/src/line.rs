//! Newline-delimited line codec for tokio.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Default line limit, per the IRC standard.
const DEFAULT_MAX_LEN: usize = 512;

/// Reads and writes `\r\n`-terminated lines.
///
/// Input is decoded as UTF-8, replacing invalid sequences rather than
/// failing: one garbled line from a confused client should not kill the
/// connection. Lines over the limit are an error.
pub struct LineCodec {
    /// Index of the next byte to scan for a newline.
    scan_from: usize,
    max_len: usize,
}

impl LineCodec {
    /// Create a codec with the default 512-byte limit.
    pub fn new() -> LineCodec {
        LineCodec {
            scan_from: 0,
            max_len: DEFAULT_MAX_LEN,
        }
    }

    /// Create a codec with a custom line limit.
    pub fn with_max_len(max_len: usize) -> LineCodec {
        LineCodec { scan_from: 0, max_len }
    }
}

impl Default for LineCodec {
    fn default() -> LineCodec {
        LineCodec::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        if let Some(offset) = src[self.scan_from..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.scan_from + offset + 1);
            self.scan_from = 0;

            if line.len() > self.max_len {
                return Err(ProtocolError::LineTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            let text = String::from_utf8_lossy(&line)
                .trim_end_matches(['\r', '\n'])
                .to_string();
            Ok(Some(text))
        } else {
            self.scan_from = src.len();
            if src.len() > self.max_len {
                return Err(ProtocolError::LineTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }
            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_complete_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("NICK alice\r\nUSER a 0 * :Alice\r\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some("NICK alice".to_string()));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("USER a 0 * :Alice".to_string())
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn waits_for_partial_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PRIVMSG #gen");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"eral :hi\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("PRIVMSG #general :hi".to_string())
        );
    }

    #[test]
    fn bare_newline_is_accepted() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING token\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("PING token".to_string()));
    }

    #[test]
    fn rejects_oversized_lines() {
        let mut codec = LineCodec::with_max_len(16);
        let mut buf = BytesMut::from("PRIVMSG #general :far far far too long\n");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::LineTooLong { .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PRIVMSG bob :caf\xff\n"[..]);
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert!(line.starts_with("PRIVMSG bob :caf"));
    }

    #[test]
    fn encodes_with_crlf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("PONG :token".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"PONG :token\r\n");
    }
}
