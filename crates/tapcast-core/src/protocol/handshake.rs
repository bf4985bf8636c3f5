//! The device handshake, sent once right after the channel opens.
//!
//! ```text
//! [device_name:64, UTF-8, zero padded][width:u16][height:u16]
//! ```
//! The name is cut to at most 63 bytes so the field always ends with a NUL,
//! and never in the middle of a multi-byte character.

use crate::domain::geometry::Size;
use crate::protocol::messages::{DEVICE_NAME_FIELD_LEN, HANDSHAKE_LEN};

/// Returns the longest prefix of `s` that fits in `max_len` bytes without
/// splitting a character.
pub fn truncate_utf8(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Encodes the handshake for a device called `device_name` streaming video
/// of `video_size`.
///
/// Dimensions larger than `u16::MAX` are clamped.
pub fn encode_handshake(device_name: &str, video_size: Size) -> [u8; HANDSHAKE_LEN] {
    let mut out = [0u8; HANDSHAKE_LEN];
    let name = truncate_utf8(device_name, DEVICE_NAME_FIELD_LEN - 1).as_bytes();
    out[..name.len()].copy_from_slice(name);

    let width = u16::try_from(video_size.width).unwrap_or(u16::MAX);
    let height = u16::try_from(video_size.height).unwrap_or(u16::MAX);
    out[DEVICE_NAME_FIELD_LEN..DEVICE_NAME_FIELD_LEN + 2].copy_from_slice(&width.to_be_bytes());
    out[DEVICE_NAME_FIELD_LEN + 2..].copy_from_slice(&height.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name_is_zero_padded() {
        let bytes = encode_handshake("Pixel 7", Size::new(1080, 2400));

        assert_eq!(&bytes[..7], b"Pixel 7");
        assert!(bytes[7..DEVICE_NAME_FIELD_LEN].iter().all(|&b| b == 0));
        assert_eq!(&bytes[64..66], &1080u16.to_be_bytes());
        assert_eq!(&bytes[66..68], &2400u16.to_be_bytes());
    }

    #[test]
    fn test_ascii_name_is_cut_at_63_bytes() {
        let name = "a".repeat(100);

        let bytes = encode_handshake(&name, Size::new(1, 1));

        assert!(bytes[..63].iter().all(|&b| b == b'a'));
        assert_eq!(bytes[63], 0);
    }

    #[test]
    fn test_truncation_never_splits_a_multibyte_character() {
        // 62 ASCII bytes, then a 3-byte character straddling the 63-byte cut
        let name = format!("{}設備", "x".repeat(62));

        let cut = truncate_utf8(&name, 63);

        assert_eq!(cut, "x".repeat(62));
        let bytes = encode_handshake(&name, Size::new(1, 1));
        assert_eq!(bytes[62], 0);
    }

    #[test]
    fn test_truncation_keeps_character_ending_exactly_at_limit() {
        // 60 ASCII bytes + 3-byte character = 63 bytes exactly
        let name = format!("{}設備", "y".repeat(60));

        assert_eq!(truncate_utf8(&name, 63), format!("{}設", "y".repeat(60)));
    }
}
