//! # iobus-core
//!
//! Shared wire protocol for IOBus: message type definitions, the binary
//! codec, and the incremental stream framer.
//!
//! This crate is pure: no sockets, no OS APIs, no mutable global state.
//! Both the server and any future Rust client depend on it.
//!
//! The wire format is a 4-byte header (`version`, `type`, `payload_len`
//! big-endian) followed by a per-type payload.  The TCP control channel
//! carries handshake, keepalive, and command traffic; the UDP data channel
//! carries high-frequency pointer/keyboard/system events.  Both channels
//! share this codec.

pub mod protocol;

pub use protocol::codec::{decode_message, encode_message, DecodeError, Header};
pub use protocol::framing::FrameBuffer;
pub use protocol::messages::Message;
