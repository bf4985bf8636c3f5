//! # tapcast-core
//!
//! Shared library for the tapcast device server: the control-channel wire
//! codec, the pointer multiplexer, and screen geometry.
//!
//! It has no dependencies on OS APIs, async runtimes, or sockets, so every
//! piece can be tested on a desktop machine.
//!
//! # Architecture overview
//!
//! A desktop controller connects to the device over a single channel. The
//! device answers with a handshake, then streams encoded video frames while
//! the controller sends touch events back.
//!
//! - **`protocol`** – How bytes travel over the channel. Control messages are
//!   a tag byte plus a fixed-size payload, decoded incrementally from a bounded
//!   buffer. Video frames carry a 12-byte header.
//!
//! - **`domain`** – Pure logic. `ScreenInfo` maps controller coordinates to
//!   device pixels (including a locked video orientation), and
//!   `PointersState` tracks up to ten simultaneous contacts.

pub mod domain;
pub mod protocol;

pub use domain::geometry::{Point, Position, Rect, Size};
pub use domain::pointers::{NoFreeSlot, Pointer, PointerSample, PointerSnapshot, PointersState, MAX_POINTERS};
pub use domain::screen::{DisplayInfo, ScreenInfo, StaleGeometry};
pub use protocol::codec::{encode_control_message, ControlMessageReader, DecodeError};
pub use protocol::messages::{ControlMessage, InjectTouchMessage};
