//! All IOBus protocol message types.
//!
//! Messages follow the v1 wire format: a 4-byte header followed by a
//! per-type payload, all multi-byte integers big-endian.  The set of
//! message types is closed; the codec rejects anything outside it.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 1;

/// Total size of the common message header in bytes.
pub const HEADER_SIZE: usize = 4;

/// Maximum total size of a message on the wire (header + payload).
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Maximum payload size implied by [`MAX_MESSAGE_SIZE`].
pub const MAX_PAYLOAD_SIZE: usize = MAX_MESSAGE_SIZE - HEADER_SIZE;

/// Default TCP port for the control channel.
pub const DEFAULT_TCP_PORT: u16 = 9800;

/// Default UDP port for the data channel.
pub const DEFAULT_UDP_PORT: u16 = 9801;

/// Default keepalive ping interval in seconds.
pub const KEEPALIVE_INTERVAL_SECS: u16 = 5;

/// Missed-pong multiplier: a client is dead after `interval × multiplier`
/// seconds without a pong.
pub const KEEPALIVE_TIMEOUT_MULTIPLIER: u32 = 3;

/// Maximum client display name length in bytes (UTF-8, null-padded on the wire).
pub const CLIENT_NAME_MAX_LEN: usize = 32;

/// Maximum launch-app target name length in bytes.
pub const APP_NAME_MAX_LEN: usize = 128;

/// Maximum free-text error message length in bytes.
pub const ERROR_TEXT_MAX_LEN: usize = 256;

// ── Message type codes ────────────────────────────────────────────────────────

/// All message type codes defined in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Control plane (TCP)
    HandshakeReq = 0x01,
    HandshakeAck = 0x02,
    HandshakeReject = 0x03,
    Ping = 0x10,
    Pong = 0x11,
    Disconnect = 0x1F,
    // Data plane (UDP) — mouse
    MouseMove = 0x20,
    MouseClick = 0x21,
    MouseScroll = 0x22,
    MouseDrag = 0x23,
    // Data plane (UDP) — keyboard
    KeyEvent = 0x30,
    // Data plane (UDP) — system actions
    SystemAction = 0x40,
    // App launcher (TCP)
    LaunchApp = 0x50,
    // System state (TCP)
    GetSystemState = 0x5F,
    SystemStateResponse = 0x60,
    Ack = 0x61,
    CommandError = 0x62,
    // Error
    Error = 0xFF,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::HandshakeReq),
            0x02 => Ok(MessageType::HandshakeAck),
            0x03 => Ok(MessageType::HandshakeReject),
            0x10 => Ok(MessageType::Ping),
            0x11 => Ok(MessageType::Pong),
            0x1F => Ok(MessageType::Disconnect),
            0x20 => Ok(MessageType::MouseMove),
            0x21 => Ok(MessageType::MouseClick),
            0x22 => Ok(MessageType::MouseScroll),
            0x23 => Ok(MessageType::MouseDrag),
            0x30 => Ok(MessageType::KeyEvent),
            0x40 => Ok(MessageType::SystemAction),
            0x50 => Ok(MessageType::LaunchApp),
            0x5F => Ok(MessageType::GetSystemState),
            0x60 => Ok(MessageType::SystemStateResponse),
            0x61 => Ok(MessageType::Ack),
            0x62 => Ok(MessageType::CommandError),
            0xFF => Ok(MessageType::Error),
            _ => Err(()),
        }
    }
}

// ── Field enums ───────────────────────────────────────────────────────────────

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MouseButton {
    Left = 0,
    Right = 1,
    Middle = 2,
}

impl TryFrom<u8> for MouseButton {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MouseButton::Left),
            1 => Ok(MouseButton::Right),
            2 => Ok(MouseButton::Middle),
            _ => Err(()),
        }
    }
}

/// Mouse click action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClickAction {
    Press = 0,
    Release = 1,
}

impl TryFrom<u8> for ClickAction {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ClickAction::Press),
            1 => Ok(ClickAction::Release),
            _ => Err(()),
        }
    }
}

/// Key press action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyAction {
    Down = 0,
    Up = 1,
}

impl TryFrom<u8> for KeyAction {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(KeyAction::Down),
            1 => Ok(KeyAction::Up),
            _ => Err(()),
        }
    }
}

/// System action identifier carried in SYSTEM_ACTION messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SystemActionId {
    LockScreen = 1,
    PowerDialog = 2,
    Sleep = 3,
    Shutdown = 4,
    Restart = 5,
}

impl TryFrom<u8> for SystemActionId {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SystemActionId::LockScreen),
            2 => Ok(SystemActionId::PowerDialog),
            3 => Ok(SystemActionId::Sleep),
            4 => Ok(SystemActionId::Shutdown),
            5 => Ok(SystemActionId::Restart),
            _ => Err(()),
        }
    }
}

/// Handshake rejection reason, carried as a u16 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum RejectReason {
    VersionMismatch = 1,
    Busy = 2,
}

impl TryFrom<u16> for RejectReason {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RejectReason::VersionMismatch),
            2 => Ok(RejectReason::Busy),
            _ => Err(()),
        }
    }
}

/// Modifier key bitmask used in [`KeyEvent`].
///
/// Bit layout:
/// - Bit 0: Shift
/// - Bit 1: Control
/// - Bit 2: Alt (Option on macOS)
/// - Bit 3: Meta (Cmd on macOS)
/// - Bit 4: Fn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModifierFlags(pub u8);

impl ModifierFlags {
    pub const SHIFT: u8 = 1 << 0;
    pub const CONTROL: u8 = 1 << 1;
    pub const ALT: u8 = 1 << 2;
    pub const META: u8 = 1 << 3;
    pub const FN: u8 = 1 << 4;

    pub fn shift(&self) -> bool {
        self.0 & Self::SHIFT != 0
    }

    pub fn control(&self) -> bool {
        self.0 & Self::CONTROL != 0
    }

    pub fn alt(&self) -> bool {
        self.0 & Self::ALT != 0
    }

    pub fn meta(&self) -> bool {
        self.0 & Self::META != 0
    }

    pub fn fn_key(&self) -> bool {
        self.0 & Self::FN != 0
    }
}

// ── Per-message payload structs ───────────────────────────────────────────────

/// HANDSHAKE_REQ (0x01): sent by the client to request admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeReq {
    /// Protocol version the client speaks.
    pub client_version: u16,
    /// Reserved capability flags (0 in v1).
    pub flags: u16,
    /// Human-readable display name, ≤32 UTF-8 bytes (null-padded on the wire).
    pub client_name: String,
}

/// HANDSHAKE_ACK (0x02): server accepts the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeAck {
    pub server_version: u16,
    /// Reserved capability flags (0 in v1).
    pub flags: u16,
    /// UDP port the client must send data-plane events to.
    pub udp_port: u16,
    /// Keepalive interval in seconds the client must honor.
    pub keepalive_interval: u16,
}

/// HANDSHAKE_REJECT (0x03): server declines the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeReject {
    pub server_version: u16,
    pub reason: RejectReason,
}

/// MOUSE_MOVE (0x20): relative pointer movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseMove {
    /// Client-side timestamp, milliseconds (opaque to the server).
    pub timestamp: u32,
    pub dx: i16,
    pub dy: i16,
}

/// MOUSE_CLICK (0x21): button press or release at the current position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseClick {
    pub timestamp: u32,
    pub button: MouseButton,
    pub action: ClickAction,
}

/// MOUSE_SCROLL (0x22): scroll wheel deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseScroll {
    pub timestamp: u32,
    pub dx: i16,
    pub dy: i16,
}

/// MOUSE_DRAG (0x23): relative movement with a button held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseDrag {
    pub timestamp: u32,
    pub button: MouseButton,
    pub dx: i16,
    pub dy: i16,
}

/// KEY_EVENT (0x30): keyboard press or release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub timestamp: u32,
    pub action: KeyAction,
    /// Protocol key code (translated to platform codes by the injector).
    pub keycode: u16,
    pub modifiers: ModifierFlags,
}

/// SYSTEM_ACTION (0x40): power/media action request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemAction {
    pub timestamp: u32,
    pub action_id: SystemActionId,
}

/// LAUNCH_APP (0x50): launch an application by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchApp {
    pub timestamp: u32,
    /// Application name, ≤128 UTF-8 bytes (u8 length prefix on the wire).
    pub app_name: String,
}

/// SYSTEM_STATE_RESPONSE (0x60): brightness/volume snapshot.
///
/// Brightness and volume are transmitted ×100 as u16 fixed-point, giving
/// two-decimal precision over 0.0–655.35.  Callers supply 0.0–1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStateResponse {
    pub brightness: f32,
    pub volume: f32,
    pub is_muted: bool,
    pub is_locked: bool,
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// All valid IOBus messages, discriminated by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    HandshakeReq(HandshakeReq),
    HandshakeAck(HandshakeAck),
    HandshakeReject(HandshakeReject),
    Ping,
    Pong,
    Disconnect,
    MouseMove(MouseMove),
    MouseClick(MouseClick),
    MouseScroll(MouseScroll),
    MouseDrag(MouseDrag),
    KeyEvent(KeyEvent),
    SystemAction(SystemAction),
    LaunchApp(LaunchApp),
    GetSystemState,
    SystemStateResponse(SystemStateResponse),
    /// Generic acknowledgement carrying an application reference id (always 0 in v1).
    Ack(u8),
    /// Command failure carrying an application reference id (always 0 in v1).
    CommandError(u8),
    /// Free-text error description, ≤256 UTF-8 bytes.
    Error(String),
}

impl Message {
    /// Returns the [`MessageType`] discriminant for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::HandshakeReq(_) => MessageType::HandshakeReq,
            Message::HandshakeAck(_) => MessageType::HandshakeAck,
            Message::HandshakeReject(_) => MessageType::HandshakeReject,
            Message::Ping => MessageType::Ping,
            Message::Pong => MessageType::Pong,
            Message::Disconnect => MessageType::Disconnect,
            Message::MouseMove(_) => MessageType::MouseMove,
            Message::MouseClick(_) => MessageType::MouseClick,
            Message::MouseScroll(_) => MessageType::MouseScroll,
            Message::MouseDrag(_) => MessageType::MouseDrag,
            Message::KeyEvent(_) => MessageType::KeyEvent,
            Message::SystemAction(_) => MessageType::SystemAction,
            Message::LaunchApp(_) => MessageType::LaunchApp,
            Message::GetSystemState => MessageType::GetSystemState,
            Message::SystemStateResponse(_) => MessageType::SystemStateResponse,
            Message::Ack(_) => MessageType::Ack,
            Message::CommandError(_) => MessageType::CommandError,
            Message::Error(_) => MessageType::Error,
        }
    }
}
