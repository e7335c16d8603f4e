//! Incremental framing for the stream (TCP) channel.
//!
//! TCP delivers a byte stream with no message boundaries, so a single read
//! may contain half a message or several.  [`FrameBuffer`] accumulates
//! chunks and yields complete messages as they become available.
//!
//! A header that fails to decode is unrecoverable: there is no
//! resynchronization marker in the wire format, so the caller must close
//! the connection on [`DecodeError`] rather than skip bytes.

use crate::protocol::codec::{decode_payload, DecodeError, Header};
use crate::protocol::messages::{Message, HEADER_SIZE};

/// Growable receive buffer that extracts length-delimited messages.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of bytes received from the transport.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extracts the next complete message, if one is buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed.  Call repeatedly
    /// after each [`extend`](Self::extend) until it returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the buffered header or payload is
    /// malformed; the buffer is left untouched and the connection must be
    /// closed.
    pub fn next_message(&mut self) -> Result<Option<Message>, DecodeError> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }
        let header = Header::decode(&self.buf[..HEADER_SIZE])?;
        let total = HEADER_SIZE + header.payload_len as usize;
        if self.buf.len() < total {
            return Ok(None);
        }
        let msg = decode_payload(header.msg_type, &self.buf[HEADER_SIZE..total])?;
        self.buf.drain(..total);
        Ok(Some(msg))
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::encode_message;
    use crate::protocol::messages::{HandshakeReq, KeyAction, KeyEvent, ModifierFlags};

    fn key_event(keycode: u16) -> Message {
        Message::KeyEvent(KeyEvent {
            timestamp: 1,
            action: KeyAction::Down,
            keycode,
            modifiers: ModifierFlags::default(),
        })
    }

    #[test]
    fn test_empty_buffer_yields_nothing() {
        let mut fb = FrameBuffer::new();
        assert_eq!(fb.next_message().unwrap(), None);
    }

    #[test]
    fn test_single_complete_message() {
        let mut fb = FrameBuffer::new();
        fb.extend(&encode_message(&Message::Ping));
        assert_eq!(fb.next_message().unwrap(), Some(Message::Ping));
        assert_eq!(fb.next_message().unwrap(), None);
        assert!(fb.is_empty());
    }

    #[test]
    fn test_message_split_across_arbitrary_chunks() {
        let bytes = encode_message(&Message::HandshakeReq(HandshakeReq {
            client_version: 1,
            flags: 0,
            client_name: "Phone".to_string(),
        }));
        // Feed one byte at a time; the message must appear exactly once,
        // only after the final byte.
        for split in 1..bytes.len() {
            let mut fb = FrameBuffer::new();
            fb.extend(&bytes[..split]);
            assert_eq!(fb.next_message().unwrap(), None, "split at {split}");
            fb.extend(&bytes[split..]);
            assert!(fb.next_message().unwrap().is_some(), "split at {split}");
            assert_eq!(fb.next_message().unwrap(), None);
        }
    }

    #[test]
    fn test_two_messages_in_one_chunk() {
        let mut chunk = encode_message(&key_event(10));
        chunk.extend_from_slice(&encode_message(&key_event(20)));
        let mut fb = FrameBuffer::new();
        fb.extend(&chunk);
        assert_eq!(fb.next_message().unwrap(), Some(key_event(10)));
        assert_eq!(fb.next_message().unwrap(), Some(key_event(20)));
        assert_eq!(fb.next_message().unwrap(), None);
    }

    #[test]
    fn test_header_only_waits_for_payload() {
        let bytes = encode_message(&key_event(7));
        let mut fb = FrameBuffer::new();
        fb.extend(&bytes[..HEADER_SIZE]);
        assert_eq!(fb.next_message().unwrap(), None);
        fb.extend(&bytes[HEADER_SIZE..]);
        assert_eq!(fb.next_message().unwrap(), Some(key_event(7)));
    }

    #[test]
    fn test_unknown_type_byte_is_fatal() {
        let mut fb = FrameBuffer::new();
        fb.extend(&[1, 0x7E, 0, 0]);
        assert_eq!(
            fb.next_message(),
            Err(DecodeError::UnknownMessageType(0x7E))
        );
    }

    #[test]
    fn test_oversized_declared_payload_is_fatal() {
        let mut fb = FrameBuffer::new();
        fb.extend(&[1, 0x10, 0xFF, 0xFF]);
        assert!(matches!(
            fb.next_message(),
            Err(DecodeError::PayloadTooLarge { .. })
        ));
    }
}
