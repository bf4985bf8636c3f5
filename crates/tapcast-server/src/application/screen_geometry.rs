//! Screen-info provider capability.
//!
//! The dispatcher reads a snapshot per touch event and the streamer reads
//! one per capture session. Implementations must hand out whole snapshots:
//! a reader never sees fields from two different rotations.

use tapcast_core::ScreenInfo;

/// Source of the current screen geometry.
#[cfg_attr(test, mockall::automock)]
pub trait ScreenInfoProvider: Send + Sync {
    /// Returns the current geometry snapshot.
    fn screen_info(&self) -> ScreenInfo;

    /// Compositor layer stack the capture display must mirror.
    fn layer_stack(&self) -> u32;
}
