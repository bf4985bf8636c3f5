//! tapcast-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the server do?
//!
//! The server runs on the device being controlled. A desktop controller
//! decides what to touch and when; the server:
//!
//! 1. Connects to the controller and sends a handshake with the device name
//!    and video size.
//! 2. Decodes touch events from the controller, maps them from the
//!    controller's view of the screen to device pixels and injects them as
//!    multi-touch motion events.
//! 3. Streams encoded video frames back over the same connection until the
//!    controller asks it to stop.

/// Application layer: use cases and capability traits.
pub mod application;

/// Infrastructure layer: connection, capability backends, configuration.
pub mod infrastructure;
