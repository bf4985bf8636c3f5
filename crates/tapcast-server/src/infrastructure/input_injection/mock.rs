//! Recording input injector for tests.
//!
//! Every injected [`MotionEvent`] is pushed into a `Mutex<Vec<_>>` so test
//! assertions can inspect exactly what was injected and in what order.
//!
//! # `should_fail` flag
//!
//! Set `should_fail = true` to make every call return
//! [`InjectionError::Rejected`] after recording the event. This exercises
//! the dispatcher's error path without a real platform.

use std::sync::{Mutex, PoisonError};

use crate::application::dispatch_input::{InjectionError, InputInjector, MotionEvent};

/// An injector that records all calls.
#[derive(Debug, Default)]
pub struct RecordingInjector {
    /// Every event passed to `inject`, in call order.
    pub events: Mutex<Vec<MotionEvent>>,
    /// When `true`, every call returns an error.
    pub should_fail: bool,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events recorded so far.
    pub fn events(&self) -> Vec<MotionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl InputInjector for RecordingInjector {
    fn inject(&self, event: &MotionEvent) -> Result<(), InjectionError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        if self.should_fail {
            return Err(InjectionError::Rejected("mock failure".into()));
        }
        Ok(())
    }
}
