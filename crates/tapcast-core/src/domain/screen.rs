//! Screen geometry snapshot and the client-to-device coordinate mapping.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::geometry::{reverse_rotation, Point, Position, Rect, Size};

/// What the display reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    /// Logical size, already taking the current rotation into account.
    pub size: Size,
    /// Device rotation in quarter turns.
    pub rotation: u8,
    /// Compositor layer stack the display belongs to.
    pub layer_stack: u32,
}

/// One consistent view of the screen geometry.
///
/// Values of this type are immutable; a device rotation produces a new
/// snapshot rather than mutating an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenInfo {
    /// Device pixels used for output, possibly cropped.
    pub content_rect: Rect,
    /// Video size ignoring any locked video orientation.
    pub unlocked_video_size: Size,
    /// Device rotation in quarter turns.
    pub device_rotation: u8,
    /// Orientation the video is locked to, if any.
    pub locked_video_orientation: Option<u8>,
}

/// Returned by [`ScreenInfo::to_device_point`] when the controller's view of
/// the screen does not match the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event generated for a {client_size} screen, device video size is {device_size}")]
pub struct StaleGeometry {
    pub client_size: Size,
    pub device_size: Size,
}

impl ScreenInfo {
    /// Computes the geometry for `display`, optionally restricted to `crop`.
    ///
    /// A crop that does not overlap the display is ignored.
    pub fn compute(display: &DisplayInfo, crop: Option<Rect>, locked_video_orientation: Option<u8>) -> Self {
        let full = Rect::from_size(display.size);
        let content_rect = crop.and_then(|c| full.intersect(&c)).unwrap_or(full);
        Self {
            content_rect,
            unlocked_video_size: content_rect.size().round_down_to_8(),
            device_rotation: display.rotation % 4,
            locked_video_orientation: locked_video_orientation.map(|o| o % 4),
        }
    }

    /// Rotation to apply to the device orientation to get the locked video
    /// orientation.
    pub fn video_rotation(&self) -> u8 {
        match self.locked_video_orientation {
            Some(locked) => (4 + locked % 4 - self.device_rotation % 4) % 4,
            None => 0,
        }
    }

    /// Rotation to apply to the locked video orientation to get back to the
    /// device orientation.
    pub fn reverse_video_rotation(&self) -> u8 {
        reverse_rotation(self.video_rotation())
    }

    /// The size of the video actually sent, with any locked orientation applied.
    pub fn video_size(&self) -> Size {
        if self.video_rotation() % 2 == 0 {
            self.unlocked_video_size
        } else {
            self.unlocked_video_size.rotate()
        }
    }

    /// Maps a controller position to device pixels.
    ///
    /// The position is first rotated back into the device orientation; its
    /// carried size must then equal the unlocked video size, otherwise the
    /// event was generated before a rotation and is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`StaleGeometry`] when the sizes differ.
    pub fn to_device_point(&self, position: Position) -> Result<Point, StaleGeometry> {
        let device_position = position.rotate(self.reverse_video_rotation());
        let client_size = device_position.screen_size;
        let video = self.unlocked_video_size;
        if client_size != video || video.is_empty() {
            return Err(StaleGeometry {
                client_size,
                device_size: video,
            });
        }

        let rect = &self.content_rect;
        let point = device_position.point;
        let x = rect.left as i64 + point.x as i64 * rect.width() as i64 / video.width as i64;
        let y = rect.top as i64 + point.y as i64 * rect.height() as i64 / video.height as i64;
        Ok(Point::new(x as i32, y as i32))
    }
}
