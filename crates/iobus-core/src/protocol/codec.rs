//! Binary codec for encoding and decoding IOBus protocol messages.
//!
//! Wire format:
//! ```text
//! [version:1][msg_type:1][payload_len:2][payload:N]
//! ```
//! Total header size: 4 bytes.  All multi-byte integers are big-endian.
//! A message never exceeds 512 bytes on the wire.

use thiserror::Error;

use crate::protocol::messages::{
    ClickAction, HandshakeAck, HandshakeReject, HandshakeReq, KeyAction, KeyEvent, LaunchApp,
    Message, MessageType, ModifierFlags, MouseButton, MouseClick, MouseDrag, MouseMove,
    MouseScroll, RejectReason, SystemAction, SystemActionId, SystemStateResponse,
    APP_NAME_MAX_LEN, CLIENT_NAME_MAX_LEN, ERROR_TEXT_MAX_LEN, HEADER_SIZE, MAX_PAYLOAD_SIZE,
    PROTOCOL_VERSION,
};

/// Errors that can occur while decoding a message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer than [`HEADER_SIZE`] bytes were available for the header.
    #[error("truncated header: need {HEADER_SIZE} bytes, got {available}")]
    TruncatedHeader { available: usize },

    /// The message type byte in the header is not a recognized value.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// Fewer payload bytes were available than the type's layout requires.
    #[error("truncated {msg_type:?} payload: need {needed} bytes, got {available}")]
    TruncatedPayload {
        msg_type: MessageType,
        needed: usize,
        available: usize,
    },

    /// A sub-field decoded to a value outside its defined range.
    #[error("invalid value {value} for {field}")]
    InvalidEnumValue { field: &'static str, value: u16 },

    /// The header declares a payload that would exceed the 512-byte message bound.
    #[error("declared payload of {declared} bytes exceeds maximum of {MAX_PAYLOAD_SIZE}")]
    PayloadTooLarge { declared: u16 },
}

// ── Header ────────────────────────────────────────────────────────────────────

/// 4-byte header prepended to every message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version byte; always [`PROTOCOL_VERSION`] when sent by us.
    pub version: u8,
    /// Identifies the payload type.
    pub msg_type: MessageType,
    /// Length of the payload in bytes (not including this header).
    pub payload_len: u16,
}

impl Header {
    /// Encodes the header into its 4-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let len = self.payload_len.to_be_bytes();
        [self.version, self.msg_type as u8, len[0], len[1]]
    }

    /// Decodes a header from the beginning of `bytes`.
    ///
    /// # Errors
    ///
    /// Fails on short input, an unknown type byte, or a declared payload
    /// length that violates the 512-byte message bound.  Version mismatches
    /// are not rejected here; version negotiation happens at handshake time.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::TruncatedHeader {
                available: bytes.len(),
            });
        }
        let msg_type = MessageType::try_from(bytes[1])
            .map_err(|_| DecodeError::UnknownMessageType(bytes[1]))?;
        let payload_len = u16::from_be_bytes([bytes[2], bytes[3]]);
        if payload_len as usize > MAX_PAYLOAD_SIZE {
            return Err(DecodeError::PayloadTooLarge {
                declared: payload_len,
            });
        }
        Ok(Header {
            version: bytes[0],
            msg_type,
            payload_len,
        })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Message`] into a byte vector including the 4-byte header.
///
/// Encoding is total: every well-formed `Message` has a wire form.  Oversized
/// string fields are truncated at their protocol bounds (32 bytes for the
/// client name, 128 for the app name, 256 for error text) rather than
/// rejected, so the 512-byte message invariant always holds.
///
/// # Examples
///
/// ```rust
/// use iobus_core::{decode_message, encode_message, Message};
///
/// let bytes = encode_message(&Message::Ping);
/// let (decoded, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, Message::Ping);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(msg: &Message) -> Vec<u8> {
    let payload = encode_payload(msg);
    debug_assert!(payload.len() <= MAX_PAYLOAD_SIZE);
    let header = Header {
        version: PROTOCOL_VERSION,
        msg_type: msg.message_type(),
        payload_len: payload.len() as u16,
    };
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(&payload);
    buf
}

/// Decodes one [`Message`] from the beginning of `bytes`.
///
/// Returns the decoded message and the total number of bytes consumed
/// (header + payload), so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`DecodeError`] if the bytes are malformed or incomplete.
pub fn decode_message(bytes: &[u8]) -> Result<(Message, usize), DecodeError> {
    let header = Header::decode(bytes)?;
    let total = HEADER_SIZE + header.payload_len as usize;
    if bytes.len() < total {
        return Err(DecodeError::TruncatedPayload {
            msg_type: header.msg_type,
            needed: header.payload_len as usize,
            available: bytes.len() - HEADER_SIZE,
        });
    }
    let msg = decode_payload(header.msg_type, &bytes[HEADER_SIZE..total])?;
    Ok((msg, total))
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(msg: &Message) -> Vec<u8> {
    let mut buf = Vec::new();
    match msg {
        Message::HandshakeReq(m) => encode_handshake_req(&mut buf, m),
        Message::HandshakeAck(m) => encode_handshake_ack(&mut buf, m),
        Message::HandshakeReject(m) => encode_handshake_reject(&mut buf, m),
        Message::Ping | Message::Pong | Message::Disconnect | Message::GetSystemState => {}
        Message::MouseMove(m) => encode_mouse_move(&mut buf, m),
        Message::MouseClick(m) => encode_mouse_click(&mut buf, m),
        Message::MouseScroll(m) => encode_mouse_scroll(&mut buf, m),
        Message::MouseDrag(m) => encode_mouse_drag(&mut buf, m),
        Message::KeyEvent(m) => encode_key_event(&mut buf, m),
        Message::SystemAction(m) => encode_system_action(&mut buf, m),
        Message::LaunchApp(m) => encode_launch_app(&mut buf, m),
        Message::SystemStateResponse(m) => encode_system_state_response(&mut buf, m),
        Message::Ack(app_id) | Message::CommandError(app_id) => buf.push(*app_id),
        Message::Error(text) => {
            let bytes = text.as_bytes();
            let end = floor_char_boundary(text, ERROR_TEXT_MAX_LEN);
            buf.extend_from_slice(&bytes[..end]);
        }
    }
    buf
}

fn encode_handshake_req(buf: &mut Vec<u8>, m: &HandshakeReq) {
    buf.extend_from_slice(&m.client_version.to_be_bytes());
    buf.extend_from_slice(&m.flags.to_be_bytes());
    // Fixed-capacity name field: truncate to 32 bytes, right-pad with zeros.
    let end = floor_char_boundary(&m.client_name, CLIENT_NAME_MAX_LEN);
    let name = &m.client_name.as_bytes()[..end];
    buf.extend_from_slice(name);
    buf.resize(buf.len() + (CLIENT_NAME_MAX_LEN - name.len()), 0);
}

fn encode_handshake_ack(buf: &mut Vec<u8>, m: &HandshakeAck) {
    buf.extend_from_slice(&m.server_version.to_be_bytes());
    buf.extend_from_slice(&m.flags.to_be_bytes());
    buf.extend_from_slice(&m.udp_port.to_be_bytes());
    buf.extend_from_slice(&m.keepalive_interval.to_be_bytes());
}

fn encode_handshake_reject(buf: &mut Vec<u8>, m: &HandshakeReject) {
    buf.extend_from_slice(&m.server_version.to_be_bytes());
    buf.extend_from_slice(&(m.reason as u16).to_be_bytes());
}

fn encode_mouse_move(buf: &mut Vec<u8>, m: &MouseMove) {
    buf.extend_from_slice(&m.timestamp.to_be_bytes());
    buf.extend_from_slice(&m.dx.to_be_bytes());
    buf.extend_from_slice(&m.dy.to_be_bytes());
}

fn encode_mouse_click(buf: &mut Vec<u8>, m: &MouseClick) {
    buf.extend_from_slice(&m.timestamp.to_be_bytes());
    buf.push(m.button as u8);
    buf.push(m.action as u8);
}

fn encode_mouse_scroll(buf: &mut Vec<u8>, m: &MouseScroll) {
    buf.extend_from_slice(&m.timestamp.to_be_bytes());
    buf.extend_from_slice(&m.dx.to_be_bytes());
    buf.extend_from_slice(&m.dy.to_be_bytes());
}

fn encode_mouse_drag(buf: &mut Vec<u8>, m: &MouseDrag) {
    buf.extend_from_slice(&m.timestamp.to_be_bytes());
    buf.push(m.button as u8);
    buf.extend_from_slice(&m.dx.to_be_bytes());
    buf.extend_from_slice(&m.dy.to_be_bytes());
}

fn encode_key_event(buf: &mut Vec<u8>, m: &KeyEvent) {
    buf.extend_from_slice(&m.timestamp.to_be_bytes());
    buf.push(m.action as u8);
    buf.extend_from_slice(&m.keycode.to_be_bytes());
    buf.push(m.modifiers.0);
}

fn encode_system_action(buf: &mut Vec<u8>, m: &SystemAction) {
    buf.extend_from_slice(&m.timestamp.to_be_bytes());
    buf.push(m.action_id as u8);
}

fn encode_launch_app(buf: &mut Vec<u8>, m: &LaunchApp) {
    buf.extend_from_slice(&m.timestamp.to_be_bytes());
    let end = floor_char_boundary(&m.app_name, APP_NAME_MAX_LEN);
    let name = &m.app_name.as_bytes()[..end];
    buf.push(name.len() as u8);
    buf.extend_from_slice(name);
}

fn encode_system_state_response(buf: &mut Vec<u8>, m: &SystemStateResponse) {
    buf.extend_from_slice(&encode_fixed_point(m.brightness).to_be_bytes());
    buf.extend_from_slice(&encode_fixed_point(m.volume).to_be_bytes());
    let flags: u16 = (m.is_muted as u16) | ((m.is_locked as u16) << 1);
    buf.extend_from_slice(&flags.to_be_bytes());
}

/// Scales a 0.0–1.0 value by 100 into the u16 fixed-point wire field,
/// clamping to the representable 0–655.35 range.
fn encode_fixed_point(value: f32) -> u16 {
    (value.clamp(0.0, 655.35) * 100.0).round() as u16
}

// ── Payload decoding ──────────────────────────────────────────────────────────

pub(crate) fn decode_payload(msg_type: MessageType, payload: &[u8]) -> Result<Message, DecodeError> {
    match msg_type {
        MessageType::HandshakeReq => decode_handshake_req(payload).map(Message::HandshakeReq),
        MessageType::HandshakeAck => decode_handshake_ack(payload).map(Message::HandshakeAck),
        MessageType::HandshakeReject => {
            decode_handshake_reject(payload).map(Message::HandshakeReject)
        }
        MessageType::Ping => Ok(Message::Ping),
        MessageType::Pong => Ok(Message::Pong),
        MessageType::Disconnect => Ok(Message::Disconnect),
        MessageType::MouseMove => decode_mouse_move(payload).map(Message::MouseMove),
        MessageType::MouseClick => decode_mouse_click(payload).map(Message::MouseClick),
        MessageType::MouseScroll => decode_mouse_scroll(payload).map(Message::MouseScroll),
        MessageType::MouseDrag => decode_mouse_drag(payload).map(Message::MouseDrag),
        MessageType::KeyEvent => decode_key_event(payload).map(Message::KeyEvent),
        MessageType::SystemAction => decode_system_action(payload).map(Message::SystemAction),
        MessageType::LaunchApp => decode_launch_app(payload).map(Message::LaunchApp),
        MessageType::GetSystemState => Ok(Message::GetSystemState),
        MessageType::SystemStateResponse => {
            decode_system_state_response(payload).map(Message::SystemStateResponse)
        }
        MessageType::Ack => {
            require_len(payload, 1, MessageType::Ack)?;
            Ok(Message::Ack(payload[0]))
        }
        MessageType::CommandError => {
            require_len(payload, 1, MessageType::CommandError)?;
            Ok(Message::CommandError(payload[0]))
        }
        // Error text is length-implied by the header; malformed UTF-8 is
        // replaced, never rejected.
        MessageType::Error => Ok(Message::Error(
            String::from_utf8_lossy(payload).into_owned(),
        )),
    }
}

fn decode_handshake_req(p: &[u8]) -> Result<HandshakeReq, DecodeError> {
    // 2 (version) + 2 (flags) + 32 (name) = 36
    require_len(p, 4 + CLIENT_NAME_MAX_LEN, MessageType::HandshakeReq)?;
    let client_version = u16::from_be_bytes([p[0], p[1]]);
    let flags = u16::from_be_bytes([p[2], p[3]]);
    let name_raw = &p[4..4 + CLIENT_NAME_MAX_LEN];
    // Strip trailing null padding, then decode lossily.
    let trimmed = match name_raw.iter().rposition(|&b| b != 0) {
        Some(last) => &name_raw[..=last],
        None => &[],
    };
    let client_name = String::from_utf8_lossy(trimmed).into_owned();
    Ok(HandshakeReq {
        client_version,
        flags,
        client_name,
    })
}

fn decode_handshake_ack(p: &[u8]) -> Result<HandshakeAck, DecodeError> {
    require_len(p, 8, MessageType::HandshakeAck)?;
    Ok(HandshakeAck {
        server_version: u16::from_be_bytes([p[0], p[1]]),
        flags: u16::from_be_bytes([p[2], p[3]]),
        udp_port: u16::from_be_bytes([p[4], p[5]]),
        keepalive_interval: u16::from_be_bytes([p[6], p[7]]),
    })
}

fn decode_handshake_reject(p: &[u8]) -> Result<HandshakeReject, DecodeError> {
    require_len(p, 4, MessageType::HandshakeReject)?;
    let server_version = u16::from_be_bytes([p[0], p[1]]);
    let raw_reason = u16::from_be_bytes([p[2], p[3]]);
    let reason = RejectReason::try_from(raw_reason).map_err(|_| DecodeError::InvalidEnumValue {
        field: "reject reason",
        value: raw_reason,
    })?;
    Ok(HandshakeReject {
        server_version,
        reason,
    })
}

fn decode_mouse_move(p: &[u8]) -> Result<MouseMove, DecodeError> {
    require_len(p, 8, MessageType::MouseMove)?;
    Ok(MouseMove {
        timestamp: read_u32(p),
        dx: i16::from_be_bytes([p[4], p[5]]),
        dy: i16::from_be_bytes([p[6], p[7]]),
    })
}

fn decode_mouse_click(p: &[u8]) -> Result<MouseClick, DecodeError> {
    require_len(p, 6, MessageType::MouseClick)?;
    let button = MouseButton::try_from(p[4]).map_err(|_| DecodeError::InvalidEnumValue {
        field: "mouse button",
        value: p[4] as u16,
    })?;
    let action = ClickAction::try_from(p[5]).map_err(|_| DecodeError::InvalidEnumValue {
        field: "click action",
        value: p[5] as u16,
    })?;
    Ok(MouseClick {
        timestamp: read_u32(p),
        button,
        action,
    })
}

fn decode_mouse_scroll(p: &[u8]) -> Result<MouseScroll, DecodeError> {
    require_len(p, 8, MessageType::MouseScroll)?;
    Ok(MouseScroll {
        timestamp: read_u32(p),
        dx: i16::from_be_bytes([p[4], p[5]]),
        dy: i16::from_be_bytes([p[6], p[7]]),
    })
}

fn decode_mouse_drag(p: &[u8]) -> Result<MouseDrag, DecodeError> {
    require_len(p, 9, MessageType::MouseDrag)?;
    let button = MouseButton::try_from(p[4]).map_err(|_| DecodeError::InvalidEnumValue {
        field: "mouse button",
        value: p[4] as u16,
    })?;
    Ok(MouseDrag {
        timestamp: read_u32(p),
        button,
        dx: i16::from_be_bytes([p[5], p[6]]),
        dy: i16::from_be_bytes([p[7], p[8]]),
    })
}

fn decode_key_event(p: &[u8]) -> Result<KeyEvent, DecodeError> {
    require_len(p, 8, MessageType::KeyEvent)?;
    let action = KeyAction::try_from(p[4]).map_err(|_| DecodeError::InvalidEnumValue {
        field: "key action",
        value: p[4] as u16,
    })?;
    Ok(KeyEvent {
        timestamp: read_u32(p),
        action,
        keycode: u16::from_be_bytes([p[5], p[6]]),
        modifiers: ModifierFlags(p[7]),
    })
}

fn decode_system_action(p: &[u8]) -> Result<SystemAction, DecodeError> {
    require_len(p, 5, MessageType::SystemAction)?;
    let action_id = SystemActionId::try_from(p[4]).map_err(|_| DecodeError::InvalidEnumValue {
        field: "system action id",
        value: p[4] as u16,
    })?;
    Ok(SystemAction {
        timestamp: read_u32(p),
        action_id,
    })
}

fn decode_launch_app(p: &[u8]) -> Result<LaunchApp, DecodeError> {
    require_len(p, 5, MessageType::LaunchApp)?;
    let name_len = p[4] as usize;
    require_len(p, 5 + name_len, MessageType::LaunchApp)?;
    let app_name = String::from_utf8_lossy(&p[5..5 + name_len]).into_owned();
    Ok(LaunchApp {
        timestamp: read_u32(p),
        app_name,
    })
}

fn decode_system_state_response(p: &[u8]) -> Result<SystemStateResponse, DecodeError> {
    require_len(p, 6, MessageType::SystemStateResponse)?;
    let brightness = u16::from_be_bytes([p[0], p[1]]) as f32 / 100.0;
    let volume = u16::from_be_bytes([p[2], p[3]]) as f32 / 100.0;
    let flags = u16::from_be_bytes([p[4], p[5]]);
    Ok(SystemStateResponse {
        brightness,
        volume,
        is_muted: flags & 0x01 != 0,
        is_locked: flags & 0x02 != 0,
    })
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(p: &[u8], needed: usize, msg_type: MessageType) -> Result<(), DecodeError> {
    if p.len() < needed {
        Err(DecodeError::TruncatedPayload {
            msg_type,
            needed,
            available: p.len(),
        })
    } else {
        Ok(())
    }
}

/// Reads the leading u32 timestamp field shared by all input-event payloads.
///
/// Callers must have checked the length already.
fn read_u32(p: &[u8]) -> u32 {
    u32::from_be_bytes([p[0], p[1], p[2], p[3]])
}

/// Largest byte index ≤ `max` that falls on a UTF-8 character boundary of `s`.
///
/// Truncating on a boundary keeps the field valid UTF-8 so the peer's lossy
/// decode reproduces the prefix exactly.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::MAX_MESSAGE_SIZE;

    fn round_trip(msg: &Message) -> Message {
        let encoded = encode_message(msg);
        assert!(encoded.len() <= MAX_MESSAGE_SIZE);
        let (decoded, consumed) = decode_message(&encoded).expect("decode failed");
        assert_eq!(consumed, encoded.len(), "consumed must equal encoded size");
        decoded
    }

    // ── Handshake ────────────────────────────────────────────────────────────

    #[test]
    fn test_handshake_req_round_trip() {
        let msg = Message::HandshakeReq(HandshakeReq {
            client_version: 1,
            flags: 0,
            client_name: "Phone".to_string(),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_handshake_req_name_exactly_32_bytes() {
        let msg = Message::HandshakeReq(HandshakeReq {
            client_version: 1,
            flags: 0,
            client_name: "a".repeat(32),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_handshake_req_empty_name() {
        let msg = Message::HandshakeReq(HandshakeReq {
            client_version: 1,
            flags: 0,
            client_name: String::new(),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_handshake_req_oversized_name_is_truncated() {
        let msg = Message::HandshakeReq(HandshakeReq {
            client_version: 1,
            flags: 0,
            client_name: "x".repeat(40),
        });
        let decoded = round_trip(&msg);
        match decoded {
            Message::HandshakeReq(req) => assert_eq!(req.client_name, "x".repeat(32)),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_handshake_req_payload_is_fixed_36_bytes() {
        for name in ["", "Phone", &"n".repeat(32)] {
            let bytes = encode_message(&Message::HandshakeReq(HandshakeReq {
                client_version: 1,
                flags: 0,
                client_name: name.to_string(),
            }));
            assert_eq!(bytes.len(), HEADER_SIZE + 36);
        }
    }

    #[test]
    fn test_handshake_ack_round_trip() {
        let msg = Message::HandshakeAck(HandshakeAck {
            server_version: 1,
            flags: 0,
            udp_port: 9801,
            keepalive_interval: 5,
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_handshake_reject_round_trip() {
        for reason in [RejectReason::VersionMismatch, RejectReason::Busy] {
            let msg = Message::HandshakeReject(HandshakeReject {
                server_version: 1,
                reason,
            });
            assert_eq!(round_trip(&msg), msg);
        }
    }

    // ── Payload-less messages ────────────────────────────────────────────────

    #[test]
    fn test_payloadless_messages_round_trip() {
        for msg in [
            Message::Ping,
            Message::Pong,
            Message::Disconnect,
            Message::GetSystemState,
        ] {
            let bytes = encode_message(&msg);
            assert_eq!(bytes.len(), HEADER_SIZE);
            assert_eq!(round_trip(&msg), msg);
        }
    }

    // ── Mouse ────────────────────────────────────────────────────────────────

    #[test]
    fn test_mouse_move_round_trip() {
        let msg = Message::MouseMove(MouseMove {
            timestamp: 123_456,
            dx: -17,
            dy: 42,
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_mouse_click_all_buttons_round_trip() {
        for button in [MouseButton::Left, MouseButton::Right, MouseButton::Middle] {
            for action in [ClickAction::Press, ClickAction::Release] {
                let msg = Message::MouseClick(MouseClick {
                    timestamp: 1,
                    button,
                    action,
                });
                assert_eq!(round_trip(&msg), msg);
            }
        }
    }

    #[test]
    fn test_mouse_scroll_round_trip() {
        let msg = Message::MouseScroll(MouseScroll {
            timestamp: u32::MAX,
            dx: i16::MIN,
            dy: i16::MAX,
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_mouse_drag_round_trip() {
        let msg = Message::MouseDrag(MouseDrag {
            timestamp: 55,
            button: MouseButton::Left,
            dx: 3,
            dy: -9,
        });
        assert_eq!(round_trip(&msg), msg);
    }

    // ── Keyboard ─────────────────────────────────────────────────────────────

    #[test]
    fn test_key_event_round_trip() {
        let msg = Message::KeyEvent(KeyEvent {
            timestamp: 9999,
            action: KeyAction::Down,
            keycode: 0x0004,
            modifiers: ModifierFlags(ModifierFlags::SHIFT | ModifierFlags::META),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_modifier_flags_accessors() {
        let mods = ModifierFlags(ModifierFlags::CONTROL | ModifierFlags::FN);
        assert!(mods.control());
        assert!(mods.fn_key());
        assert!(!mods.shift());
        assert!(!mods.alt());
        assert!(!mods.meta());
    }

    // ── System action / launch app ───────────────────────────────────────────

    #[test]
    fn test_system_action_all_ids_round_trip() {
        for action_id in [
            SystemActionId::LockScreen,
            SystemActionId::PowerDialog,
            SystemActionId::Sleep,
            SystemActionId::Shutdown,
            SystemActionId::Restart,
        ] {
            let msg = Message::SystemAction(SystemAction {
                timestamp: 7,
                action_id,
            });
            assert_eq!(round_trip(&msg), msg);
        }
    }

    #[test]
    fn test_launch_app_round_trip() {
        let msg = Message::LaunchApp(LaunchApp {
            timestamp: 1,
            app_name: "Safari".to_string(),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_launch_app_name_exactly_128_bytes() {
        let msg = Message::LaunchApp(LaunchApp {
            timestamp: 1,
            app_name: "b".repeat(128),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_launch_app_oversized_name_is_truncated() {
        let msg = Message::LaunchApp(LaunchApp {
            timestamp: 1,
            app_name: "c".repeat(200),
        });
        match round_trip(&msg) {
            Message::LaunchApp(la) => assert_eq!(la.app_name.len(), 128),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_launch_app_empty_name_round_trip() {
        let msg = Message::LaunchApp(LaunchApp {
            timestamp: 0,
            app_name: String::new(),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    // ── System state ─────────────────────────────────────────────────────────

    #[test]
    fn test_system_state_round_trip_at_bounds() {
        for (brightness, volume) in [(0.0, 0.0), (1.0, 1.0), (0.55, 0.25)] {
            let msg = Message::SystemStateResponse(SystemStateResponse {
                brightness,
                volume,
                is_muted: false,
                is_locked: false,
            });
            match round_trip(&msg) {
                Message::SystemStateResponse(resp) => {
                    assert!((resp.brightness - brightness).abs() < 0.01);
                    assert!((resp.volume - volume).abs() < 0.01);
                }
                other => panic!("unexpected variant: {other:?}"),
            }
        }
    }

    #[test]
    fn test_system_state_flags_round_trip() {
        let msg = Message::SystemStateResponse(SystemStateResponse {
            brightness: 0.5,
            volume: 0.5,
            is_muted: true,
            is_locked: true,
        });
        match round_trip(&msg) {
            Message::SystemStateResponse(resp) => {
                assert!(resp.is_muted);
                assert!(resp.is_locked);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_system_state_out_of_range_is_clamped() {
        let bytes = encode_message(&Message::SystemStateResponse(SystemStateResponse {
            brightness: 1000.0,
            volume: -3.0,
            is_muted: false,
            is_locked: false,
        }));
        let (decoded, _) = decode_message(&bytes).unwrap();
        match decoded {
            Message::SystemStateResponse(resp) => {
                assert!((resp.brightness - 655.35).abs() < 0.01);
                assert_eq!(resp.volume, 0.0);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    // ── Ack / CommandError / Error ───────────────────────────────────────────

    #[test]
    fn test_ack_and_command_error_round_trip() {
        assert_eq!(round_trip(&Message::Ack(0)), Message::Ack(0));
        assert_eq!(round_trip(&Message::CommandError(0)), Message::CommandError(0));
    }

    #[test]
    fn test_error_message_round_trip() {
        let msg = Message::Error("unexpected message type: 0x20".to_string());
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_error_text_capped_at_256_bytes() {
        let msg = Message::Error("e".repeat(400));
        match round_trip(&msg) {
            Message::Error(text) => assert_eq!(text.len(), 256),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    // ── Header invariant ─────────────────────────────────────────────────────

    #[test]
    fn test_declared_payload_length_matches_actual() {
        let samples = [
            Message::Ping,
            Message::HandshakeReq(HandshakeReq {
                client_version: 1,
                flags: 0,
                client_name: "n".repeat(10),
            }),
            Message::LaunchApp(LaunchApp {
                timestamp: 2,
                app_name: "Mail".to_string(),
            }),
            Message::Error("boom".to_string()),
        ];
        for msg in samples {
            let bytes = encode_message(&msg);
            let header = Header::decode(&bytes).unwrap();
            assert_eq!(
                header.payload_len as usize,
                bytes.len() - HEADER_SIZE,
                "declared length must equal actual payload for {msg:?}"
            );
            assert_eq!(header.version, PROTOCOL_VERSION);
        }
    }

    // ── Error conditions ─────────────────────────────────────────────────────

    #[test]
    fn test_decode_empty_input_is_truncated_header() {
        assert_eq!(
            decode_message(&[]),
            Err(DecodeError::TruncatedHeader { available: 0 })
        );
    }

    #[test]
    fn test_decode_unknown_message_type() {
        let bytes = [PROTOCOL_VERSION, 0x7E, 0, 0];
        assert_eq!(
            decode_message(&bytes),
            Err(DecodeError::UnknownMessageType(0x7E))
        );
    }

    #[test]
    fn test_decode_truncated_payload() {
        // KeyEvent declares 8 payload bytes but only 3 follow.
        let bytes = [PROTOCOL_VERSION, 0x30, 0, 8, 1, 2, 3];
        assert!(matches!(
            decode_message(&bytes),
            Err(DecodeError::TruncatedPayload { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_mouse_button() {
        let mut bytes = encode_message(&Message::MouseClick(MouseClick {
            timestamp: 0,
            button: MouseButton::Left,
            action: ClickAction::Press,
        }));
        bytes[HEADER_SIZE + 4] = 9; // out-of-range button
        assert_eq!(
            decode_message(&bytes),
            Err(DecodeError::InvalidEnumValue {
                field: "mouse button",
                value: 9,
            })
        );
    }

    #[test]
    fn test_decode_invalid_system_action_id() {
        let mut bytes = encode_message(&Message::SystemAction(SystemAction {
            timestamp: 0,
            action_id: SystemActionId::LockScreen,
        }));
        bytes[HEADER_SIZE + 4] = 0;
        assert!(matches!(
            decode_message(&bytes),
            Err(DecodeError::InvalidEnumValue { field: "system action id", .. })
        ));
    }

    #[test]
    fn test_decode_oversized_declared_payload() {
        let bytes = [PROTOCOL_VERSION, 0xFF, 0xFF, 0xFF];
        assert_eq!(
            Header::decode(&bytes),
            Err(DecodeError::PayloadTooLarge { declared: 0xFFFF })
        );
    }

    #[test]
    fn test_decode_malformed_utf8_name_is_replaced_not_rejected() {
        let mut bytes = encode_message(&Message::HandshakeReq(HandshakeReq {
            client_version: 1,
            flags: 0,
            client_name: "ok".to_string(),
        }));
        bytes[HEADER_SIZE + 4] = 0xFF; // invalid UTF-8 lead byte in the name field
        let (decoded, _) = decode_message(&bytes).expect("lossy decode must succeed");
        match decoded {
            Message::HandshakeReq(req) => assert!(req.client_name.contains('\u{FFFD}')),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
