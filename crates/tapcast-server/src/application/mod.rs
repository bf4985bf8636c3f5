//! Application layer use cases for the device server.
//!
//! - **`dispatch_input`** – Turns decoded control messages into motion
//!   events and hands them to an `InputInjector` capability.
//!
//! - **`stream_video`** – Pulls encoded packets from a `CaptureBackend`
//!   capability and frames them onto the connection, restarting capture
//!   sessions when they end.
//!
//! - **`screen_geometry`** – The `ScreenInfoProvider` capability both of the
//!   above read geometry snapshots from.
//!
//! - **`run_session`** – Runs the two loops above against one connection.
//!
//! Capabilities are traits defined here and implemented in the
//! infrastructure layer; they are injected at construction time.

pub mod dispatch_input;
pub mod run_session;
pub mod screen_geometry;
pub mod stream_video;
