//! Protocol module containing message types, the binary codec, and framing.

pub mod codec;
pub mod framing;
pub mod messages;

pub use codec::{decode_message, encode_message, DecodeError, Header};
pub use framing::FrameBuffer;
pub use messages::*;
