//! DispatchInput use case: turns decoded control messages into platform
//! motion events.
//!
//! The dispatcher owns the pointer multiplexer. Each `InjectTouch` is mapped
//! to device pixels, assigned a pointer slot and combined with every other
//! active contact into one [`MotionEvent`], which is handed to an
//! [`InputInjector`]. Dropped or failed events are logged and never stop the
//! loop.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tapcast_core::protocol::messages::{action, InjectTouchMessage, InputSource};
use tapcast_core::{ControlMessage, DecodeError, NoFreeSlot, PointerSnapshot, PointersState, StaleGeometry};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::screen_geometry::ScreenInfoProvider;
use crate::application::stream_video::StreamStopper;

/// Device id used for synthesized events.
pub const VIRTUAL_DEVICE_ID: i32 = -1;

/// Tool type reported for every synthesized pointer.
pub const TOOL_TYPE_FINGER: i32 = 1;

/// Error on the inbound control channel. Ends the dispatcher.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("control channel I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Error returned by an [`InputInjector`].
#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("input event rejected by the platform: {0}")]
    Rejected(String),
}

/// Why a touch was not injected.
#[derive(Debug, Error)]
pub enum DroppedTouch {
    #[error("stale geometry: {0}")]
    StaleGeometry(#[from] StaleGeometry),
    #[error(transparent)]
    NoFreeSlot(#[from] NoFreeSlot),
    #[error(transparent)]
    Injection(#[from] InjectionError),
}

/// One synthesized multi-pointer motion event.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionEvent {
    /// Start of the current gesture.
    pub down_time: Instant,
    pub event_time: Instant,
    /// Action code, pointer-indexed when more than one pointer is active.
    pub action: u32,
    /// Every active pointer, including one that is lifting in this event.
    pub pointers: PointerSnapshot,
    pub tool_type: i32,
    pub buttons: u32,
    pub source: InputSource,
    pub device_id: i32,
}

impl MotionEvent {
    pub fn pointer_count(&self) -> usize {
        self.pointers.len()
    }
}

/// Platform input injection capability.
pub trait InputInjector: Send + Sync {
    /// Injects `event` into the platform input pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError`] if the platform refuses the event.
    fn inject(&self, event: &MotionEvent) -> Result<(), InjectionError>;
}

/// Inbound half of the connection, as seen by the dispatcher.
#[async_trait]
pub trait ControlSource: Send {
    /// Waits for the next complete control message.
    ///
    /// Returns `Ok(None)` once the controller has closed the channel.
    async fn next_message(&mut self) -> Result<Option<ControlMessage>, ChannelError>;
}

/// The input dispatcher. One instance per connection.
pub struct InputDispatcher {
    injector: Arc<dyn InputInjector>,
    screen: Arc<dyn ScreenInfoProvider>,
    stopper: StreamStopper,
    pointers: PointersState,
    last_touch_down: Instant,
}

impl InputDispatcher {
    pub fn new(
        injector: Arc<dyn InputInjector>,
        screen: Arc<dyn ScreenInfoProvider>,
        stopper: StreamStopper,
    ) -> Self {
        Self {
            injector,
            screen,
            stopper,
            pointers: PointersState::new(),
            last_touch_down: Instant::now(),
        }
    }

    /// Receives and handles messages until the channel closes.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] on an I/O failure or when the decoder buffer
    /// overflows. A closed channel is the normal end of a session and
    /// returns `Ok(())`.
    pub async fn run<S>(&mut self, source: &mut S) -> Result<(), ChannelError>
    where
        S: ControlSource + ?Sized,
    {
        while let Some(msg) = source.next_message().await? {
            self.handle_message(msg);
        }
        info!("control channel closed by controller");
        Ok(())
    }

    /// Handles one message, logging anything that had to be dropped.
    pub fn handle_message(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::InjectTouch(touch) => match self.inject_touch(&touch) {
                Ok(()) => {}
                Err(DroppedTouch::Injection(e)) => {
                    error!(pointer_id = touch.pointer_id, action = touch.action, "injection failed: {e}");
                }
                Err(e) => {
                    warn!(pointer_id = touch.pointer_id, action = touch.action, "ignoring touch event: {e}");
                }
            },
            ControlMessage::StopStreaming => {
                if self.stopper.stop() {
                    info!("video streaming stop requested");
                }
            }
        }
    }

    /// Maps, multiplexes and injects one touch.
    ///
    /// # Errors
    ///
    /// Returns [`DroppedTouch`] when the event was generated for another
    /// screen geometry, when all pointer slots are taken, or when the
    /// injector refuses it.
    pub fn inject_touch(&mut self, touch: &InjectTouchMessage) -> Result<(), DroppedTouch> {
        let now = Instant::now();
        let point = self.screen.screen_info().to_device_point(touch.position)?;

        let index = self.pointers.resolve_slot(touch.pointer_id)?;
        if let Some(pointer) = self.pointers.get_mut(index) {
            pointer.point = point;
            pointer.pressure = touch.pressure;
            pointer.up = touch.action == action::UP;
        }
        let pointers = self.pointers.snapshot_and_release();

        let mut code = u32::from(touch.action);
        if pointers.len() == 1 {
            if touch.action == action::DOWN {
                self.last_touch_down = now;
            }
        } else if touch.action == action::UP {
            code = action::pointer_indexed(action::POINTER_UP, index);
        } else if touch.action == action::DOWN {
            code = action::pointer_indexed(action::POINTER_DOWN, index);
        }

        let event = MotionEvent {
            down_time: self.last_touch_down,
            event_time: now,
            action: code,
            pointers,
            tool_type: TOOL_TYPE_FINGER,
            buttons: touch.buttons,
            source: InputSource::for_buttons(touch.buttons),
            device_id: VIRTUAL_DEVICE_ID,
        };
        debug!(action = code, pointers = event.pointer_count(), x = point.x, y = point.y, "injecting motion event");
        self.injector.inject(&event)?;
        Ok(())
    }

    /// Number of pointers currently held down.
    pub fn active_pointers(&self) -> usize {
        self.pointers.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
