//! Shared screen geometry.
//!
//! [`SharedScreenInfo`] holds the current [`ScreenInfo`] behind a read/write
//! lock. Readers always copy out a whole snapshot; a rotation notification
//! replaces the snapshot in one write via [`SharedScreenInfo::update_display`].
//!
//! # Where do updates come from?
//!
//! On a device, a display listener reports rotation and size changes. The
//! server binary has no such listener and keeps the geometry it was
//! configured with; the update path is what a platform listener plugs into.

use std::sync::{PoisonError, RwLock};

use tapcast_core::{DisplayInfo, Rect, ScreenInfo};
use tracing::info;

use crate::application::screen_geometry::ScreenInfoProvider;

struct Geometry {
    display: DisplayInfo,
    info: ScreenInfo,
}

/// Lock-protected screen geometry shared by the dispatcher and the streamer.
pub struct SharedScreenInfo {
    crop: Option<Rect>,
    locked_video_orientation: Option<u8>,
    geometry: RwLock<Geometry>,
}

impl SharedScreenInfo {
    /// Creates the provider for `display`, restricted to `crop` and with an
    /// optional locked video orientation (quarter turns).
    pub fn new(display: DisplayInfo, crop: Option<Rect>, locked_video_orientation: Option<u8>) -> Self {
        let info = ScreenInfo::compute(&display, crop, locked_video_orientation);
        Self {
            crop,
            locked_video_orientation,
            geometry: RwLock::new(Geometry { display, info }),
        }
    }

    /// Replaces the display description and recomputes the geometry.
    ///
    /// Returns `true` if the geometry changed.
    pub fn update_display(&self, new_display: DisplayInfo) -> bool {
        let info = ScreenInfo::compute(&new_display, self.crop, self.locked_video_orientation);
        let mut geometry = self.geometry.write().unwrap_or_else(PoisonError::into_inner);
        let changed = geometry.info != info;
        if changed {
            info!(
                size = %new_display.size,
                rotation = new_display.rotation,
                video_size = %info.video_size(),
                "screen geometry changed"
            );
        }
        *geometry = Geometry { display: new_display, info };
        changed
    }

    /// The display description the current geometry was computed from.
    pub fn display(&self) -> DisplayInfo {
        self.geometry.read().unwrap_or_else(PoisonError::into_inner).display
    }
}

impl ScreenInfoProvider for SharedScreenInfo {
    fn screen_info(&self) -> ScreenInfo {
        self.geometry.read().unwrap_or_else(PoisonError::into_inner).info
    }

    fn layer_stack(&self) -> u32 {
        self.display().layer_stack
    }
}
