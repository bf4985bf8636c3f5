//! Video frame framing.
//!
//! Each encoded packet is sent as:
//! ```text
//! [pts:i64][length:u32][payload:length]
//! ```
//! `pts` is in microseconds relative to the first picture of the capture
//! session, or `-1` for codec configuration data.

use crate::protocol::messages::{FRAME_HEADER_LEN, PTS_CONFIG};

/// Header preceding one encoded packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub pts: i64,
    pub len: u32,
}

impl FrameHeader {
    pub fn encode(&self) -> [u8; FRAME_HEADER_LEN] {
        let mut out = [0u8; FRAME_HEADER_LEN];
        out[..8].copy_from_slice(&self.pts.to_be_bytes());
        out[8..].copy_from_slice(&self.len.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8; FRAME_HEADER_LEN]) -> Self {
        let mut pts = [0u8; 8];
        pts.copy_from_slice(&bytes[..8]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[8..]);
        Self {
            pts: i64::from_be_bytes(pts),
            len: u32::from_be_bytes(len),
        }
    }
}

/// Rebases encoder timestamps onto the first picture of a capture session.
#[derive(Debug, Default)]
pub struct PtsRebaser {
    origin: Option<i64>,
}

impl PtsRebaser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pts to send for a packet with encoder timestamp `pts_us`.
    ///
    /// Configuration packets always map to `-1`. The first picture sets the
    /// origin and maps to 0; later pictures are offset by it and never go
    /// negative.
    pub fn rebase(&mut self, pts_us: i64, is_config: bool) -> i64 {
        if is_config {
            return PTS_CONFIG;
        }
        let origin = *self.origin.get_or_insert(pts_us);
        pts_us.saturating_sub(origin).max(0)
    }

    pub fn reset(&mut self) {
        self.origin = None;
    }
}
