//! Protocol module: control messages, the incremental decoder, and the
//! handshake and video framing written towards the controller.

pub mod codec;
pub mod handshake;
pub mod messages;
pub mod video;

pub use codec::{encode_control_message, ControlMessageReader, DecodeError, DECODER_CAPACITY};
pub use handshake::{encode_handshake, truncate_utf8};
pub use messages::*;
pub use video::{FrameHeader, PtsRebaser};
