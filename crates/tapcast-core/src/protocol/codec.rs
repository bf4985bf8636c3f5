//! Incremental decoder for the control channel, and the matching encoder.
//!
//! Wire format of one control message:
//! ```text
//! [tag:1][payload:N]
//!
//! INJECT_TOUCH (tag 2, N = 27):
//!   action:u8 pointer_id:u64 x:i32 y:i32 screen_width:u16 screen_height:u16
//!   pressure:u16 (fixed point) buttons:u32
//! STOP_STREAMING (tag 11, N = 0)
//! ```
//! All multi-byte integers are big-endian.
//!
//! The decoder keeps a bounded buffer. Bytes are appended at the tail and
//! messages are parsed from the head; a message that is not yet complete is
//! left in place until more bytes arrive.

use thiserror::Error;
use tracing::warn;

use crate::domain::geometry::{Point, Position, Size};
use crate::protocol::messages::{
    pressure_from_fixed, pressure_to_fixed, ControlMessage, InjectTouchMessage, MessageTag,
    INJECT_TOUCH_PAYLOAD_LEN,
};

/// Capacity of the decoder buffer (256 KiB).
pub const DECODER_CAPACITY: usize = 1 << 18;

/// Errors raised by [`ControlMessageReader`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer is full and no message can be parsed from it.
    #[error("control buffer full ({capacity} bytes) without a complete message")]
    BufferFull { capacity: usize },
}

/// Incremental control-message decoder over a bounded buffer.
///
/// Invariant: `head <= tail <= buf.len()`; `buf[head..tail]` holds the bytes
/// received but not yet decoded.
pub struct ControlMessageReader {
    buf: Box<[u8]>,
    head: usize,
    tail: usize,
}

impl Default for ControlMessageReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlMessageReader {
    pub fn new() -> Self {
        Self::with_capacity(DECODER_CAPACITY)
    }

    /// Creates a reader with a custom buffer size.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` cannot hold a single `InjectTouch` message.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity > INJECT_TOUCH_PAYLOAD_LEN,
            "decoder capacity must hold at least one message"
        );
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
        }
    }

    /// Number of undecoded bytes.
    pub fn buffered(&self) -> usize {
        self.tail - self.head
    }

    pub fn is_full(&self) -> bool {
        self.buffered() == self.buf.len()
    }

    /// Moves undecoded bytes to the front and returns the free tail.
    ///
    /// Write into the returned slice, then call [`commit`](Self::commit) with
    /// the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::BufferFull`] when no space can be freed.
    pub fn spare_capacity(&mut self) -> Result<&mut [u8], DecodeError> {
        if self.is_full() {
            return Err(DecodeError::BufferFull {
                capacity: self.buf.len(),
            });
        }
        self.compact();
        Ok(&mut self.buf[self.tail..])
    }

    /// Marks `n` bytes of the slice returned by
    /// [`spare_capacity`](Self::spare_capacity) as received.
    pub fn commit(&mut self, n: usize) {
        self.tail = (self.tail + n).min(self.buf.len());
    }

    /// Appends as much of `bytes` as fits and returns how many were taken.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::BufferFull`] when the buffer is already full.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<usize, DecodeError> {
        let spare = self.spare_capacity()?;
        let n = spare.len().min(bytes.len());
        spare[..n].copy_from_slice(&bytes[..n]);
        self.commit(n);
        Ok(n)
    }

    /// Decodes the next message, if one is complete.
    ///
    /// Returns `None` when the buffered bytes do not hold a full message; the
    /// read position is then left before the tag byte. An unknown tag byte is
    /// dropped and also yields `None`, so callers should keep calling while
    /// [`buffered`](Self::buffered) shrinks.
    pub fn next_message(&mut self) -> Option<ControlMessage> {
        let pending = &self.buf[self.head..self.tail];
        let (&tag_byte, payload) = pending.split_first()?;

        let Ok(tag) = MessageTag::try_from(tag_byte) else {
            warn!(tag = tag_byte, "unknown control message tag; dropping one byte");
            self.head += 1;
            return None;
        };

        let len = tag.payload_len();
        if payload.len() < len {
            return None;
        }
        let msg = match tag {
            MessageTag::InjectTouch => ControlMessage::InjectTouch(parse_inject_touch(&payload[..len])),
            MessageTag::StopStreaming => ControlMessage::StopStreaming,
        };
        self.head += 1 + len;
        Some(msg)
    }

    fn compact(&mut self) {
        if self.head == 0 {
            return;
        }
        self.buf.copy_within(self.head..self.tail, 0);
        self.tail -= self.head;
        self.head = 0;
    }
}

/// Encodes `msg` into its exact wire form, tag byte included.
pub fn encode_control_message(msg: &ControlMessage) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + msg.tag().payload_len());
    buf.push(msg.tag() as u8);
    if let ControlMessage::InjectTouch(m) = msg {
        buf.push(m.action);
        buf.extend_from_slice(&m.pointer_id.to_be_bytes());
        buf.extend_from_slice(&m.position.point.x.to_be_bytes());
        buf.extend_from_slice(&m.position.point.y.to_be_bytes());
        // sizes beyond the u16 wire field saturate rather than wrap
        let width = u16::try_from(m.position.screen_size.width).unwrap_or(u16::MAX);
        let height = u16::try_from(m.position.screen_size.height).unwrap_or(u16::MAX);
        buf.extend_from_slice(&width.to_be_bytes());
        buf.extend_from_slice(&height.to_be_bytes());
        buf.extend_from_slice(&pressure_to_fixed(m.pressure).to_be_bytes());
        buf.extend_from_slice(&m.buttons.to_be_bytes());
    }
    buf
}

// ── Field readers ─────────────────────────────────────────────────────────────

/// Parses an `InjectTouch` payload; `p` is exactly 27 bytes long.
fn parse_inject_touch(p: &[u8]) -> InjectTouchMessage {
    let x = read_i32(p, 9);
    let y = read_i32(p, 13);
    let width = read_u16(p, 17);
    let height = read_u16(p, 19);
    InjectTouchMessage {
        action: p[0],
        pointer_id: read_u64(p, 1),
        position: Position::new(
            Point::new(x, y),
            Size::new(u32::from(width), u32::from(height)),
        ),
        pressure: pressure_from_fixed(read_u16(p, 21)),
        buttons: read_u32(p, 23),
    }
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn read_i32(buf: &[u8], offset: usize) -> i32 {
    read_u32(buf, offset) as i32
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}
