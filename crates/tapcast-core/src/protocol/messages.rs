//! Control-channel message types and wire constants.
//!
//! Every control message is a one-byte tag followed by a fixed-length
//! payload. All multi-byte integers are big-endian.

use serde::{Deserialize, Serialize};

use crate::domain::geometry::Position;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Payload length of an `InjectTouch` message, tag byte excluded.
pub const INJECT_TOUCH_PAYLOAD_LEN: usize = 27;

/// Length of the zero-padded device name field in the handshake.
pub const DEVICE_NAME_FIELD_LEN: usize = 64;

/// Total handshake length: device name + width + height.
pub const HANDSHAKE_LEN: usize = DEVICE_NAME_FIELD_LEN + 4;

/// Size of the header preceding each video frame: pts (8) + length (4).
pub const FRAME_HEADER_LEN: usize = 12;

/// Pts value sent for codec configuration packets.
pub const PTS_CONFIG: i64 = -1;

// ── Message tags ──────────────────────────────────────────────────────────────

/// Tag byte identifying a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageTag {
    InjectTouch = 2,
    StopStreaming = 11,
}

impl TryFrom<u8> for MessageTag {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            2 => Ok(MessageTag::InjectTouch),
            11 => Ok(MessageTag::StopStreaming),
            _ => Err(()),
        }
    }
}

impl MessageTag {
    /// Length of the payload that follows the tag byte.
    pub const fn payload_len(self) -> usize {
        match self {
            MessageTag::InjectTouch => INJECT_TOUCH_PAYLOAD_LEN,
            MessageTag::StopStreaming => 0,
        }
    }
}

// ── Motion event vocabulary ───────────────────────────────────────────────────

/// Motion action codes, as used by the platform's motion events.
pub mod action {
    pub const DOWN: u8 = 0;
    pub const UP: u8 = 1;
    pub const MOVE: u8 = 2;
    pub const CANCEL: u8 = 3;
    /// A non-primary pointer went down; OR-ed with the pointer index.
    pub const POINTER_DOWN: u32 = 5;
    /// A non-primary pointer went up; OR-ed with the pointer index.
    pub const POINTER_UP: u32 = 6;
    /// Bit shift of the pointer index inside a pointer action.
    pub const POINTER_INDEX_SHIFT: u32 = 8;

    /// Builds the pointer-indexed variant of `action` for pointer `index`.
    pub const fn pointer_indexed(action: u32, index: usize) -> u32 {
        action | ((index as u32) << POINTER_INDEX_SHIFT)
    }
}

/// Button bit masks carried by `InjectTouch`.
pub mod buttons {
    pub const PRIMARY: u32 = 1 << 0;
    pub const SECONDARY: u32 = 1 << 1;
    pub const TERTIARY: u32 = 1 << 2;
}

/// The kind of device a synthesized event pretends to come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Touchscreen,
    Mouse,
}

impl InputSource {
    /// Picks the source for `buttons`: secondary and tertiary clicks are only
    /// honoured when they come from a mouse.
    pub const fn for_buttons(buttons: u32) -> Self {
        if buttons & !buttons::PRIMARY != 0 {
            InputSource::Mouse
        } else {
            InputSource::Touchscreen
        }
    }

    /// Platform source code.
    pub const fn code(self) -> u32 {
        match self {
            InputSource::Touchscreen => 0x1002,
            InputSource::Mouse => 0x2002,
        }
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// INJECT_TOUCH (2): one contact changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectTouchMessage {
    /// Raw motion action, see [`action`].
    pub action: u8,
    /// Controller-assigned contact id.
    pub pointer_id: u64,
    /// Contact position in the controller's video space.
    pub position: Position,
    /// Normalised pressure in `0.0..=1.0`.
    pub pressure: f32,
    /// Pressed buttons, see [`buttons`].
    pub buttons: u32,
}

/// All control messages the device understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlMessage {
    InjectTouch(InjectTouchMessage),
    StopStreaming,
}

impl ControlMessage {
    pub fn tag(&self) -> MessageTag {
        match self {
            ControlMessage::InjectTouch(_) => MessageTag::InjectTouch,
            ControlMessage::StopStreaming => MessageTag::StopStreaming,
        }
    }
}

// ── Pressure fixed point ──────────────────────────────────────────────────────

/// Decodes 16-bit fixed-point pressure: `0xFFFF` is exactly 1.0.
pub fn pressure_from_fixed(raw: u16) -> f32 {
    if raw == u16::MAX {
        1.0
    } else {
        f32::from(raw) / 65536.0
    }
}

/// Encodes pressure as 16-bit fixed point, saturating at `0xFFFF`.
pub fn pressure_to_fixed(pressure: f32) -> u16 {
    if pressure >= 1.0 {
        u16::MAX
    } else if pressure <= 0.0 {
        0
    } else {
        (pressure * 65536.0) as u16
    }
}
