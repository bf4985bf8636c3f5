//! Input injection backends.
//!
//! The platform injector lives outside this crate. The server binary ships
//! with [`LoggingInjector`], which records every synthesized motion event in
//! the log, and tests use the recording injector in [`mock`].

pub mod mock;

use tracing::debug;

use crate::application::dispatch_input::{InjectionError, InputInjector, MotionEvent};

/// Injector that logs each event instead of delivering it.
#[derive(Debug, Default)]
pub struct LoggingInjector;

impl LoggingInjector {
    pub fn new() -> Self {
        Self
    }
}

impl InputInjector for LoggingInjector {
    fn inject(&self, event: &MotionEvent) -> Result<(), InjectionError> {
        let pointers: Vec<(u8, f32, f32, f32)> = event
            .pointers
            .as_slice()
            .iter()
            .map(|p| (p.local_id, p.x, p.y, p.pressure))
            .collect();
        debug!(
            action = format_args!("{:#06x}", event.action),
            source = ?event.source,
            buttons = event.buttons,
            ?pointers,
            "motion event"
        );
        Ok(())
    }
}
