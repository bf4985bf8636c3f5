//! Integer screen geometry: points, sizes, rectangles and positions.
//!
//! All coordinates are device pixels (or client video pixels, for a
//! [`Position`] received on the wire). Rotations are expressed in quarter
//! turns, `0..=3`, the way the display reports them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in some screen's coordinate space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Width and height of a screen or video frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the size with width and height swapped (a quarter turn).
    pub const fn rotate(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// Rounds both dimensions down to a multiple of 8.
    ///
    /// Hardware H.264 encoders commonly reject frame sizes that are not
    /// multiples of 8.
    pub const fn round_down_to_8(self) -> Self {
        Self {
            width: self.width & !7,
            height: self.height & !7,
        }
    }

    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle; `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// A rectangle anchored at (0, 0) covering `size`.
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width as i32, size.height as i32)
    }

    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub const fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Size of the rectangle; empty rectangles report 0x0.
    pub fn size(&self) -> Size {
        if self.is_empty() {
            return Size::default();
        }
        Size::new(self.width() as u32, self.height() as u32)
    }

    /// Returns the overlap of `self` and `other`, or `None` if they are disjoint.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }
}

/// A point together with the size of the screen it is relative to.
///
/// The controller reports every touch against the video size it is
/// currently displaying, so the device can detect stale geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub point: Point,
    pub screen_size: Size,
}

impl Position {
    pub const fn new(point: Point, screen_size: Size) -> Self {
        Self { point, screen_size }
    }

    /// Rotates the position by `rotation` quarter turns.
    ///
    /// Odd rotations swap the carried screen size; even ones keep it.
    /// Values outside `0..=3` are taken modulo 4.
    pub fn rotate(self, rotation: u8) -> Self {
        let Point { x, y } = self.point;
        let w = self.screen_size.width as i32;
        let h = self.screen_size.height as i32;
        match rotation % 4 {
            1 => Self::new(Point::new(h - y, x), self.screen_size.rotate()),
            2 => Self::new(Point::new(w - x, h - y), self.screen_size),
            3 => Self::new(Point::new(y, w - x), self.screen_size.rotate()),
            _ => self,
        }
    }
}

/// Returns the rotation that undoes `rotation`.
pub const fn reverse_rotation(rotation: u8) -> u8 {
    (4 - rotation % 4) % 4
}
