//! Domain entities for the tapcast device server.
//!
//! Pure logic with no I/O: screen geometry, the pointer multiplexer and the
//! coordinate mapping from the controller's video space to device pixels.
//! Everything here can be tested on any platform without a device attached.

pub mod geometry;
pub mod pointers;
pub mod screen;
