//! Infrastructure layer for the device server.
//!
//! Adapters behind the application layer's capability traits, plus the
//! connection and configuration plumbing.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `tapcast_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`connection`** – TCP connection to the controller: handshake, the
//!   control-message reader and the video frame sink.
//!
//! - **`screen_info`** – Lock-protected screen geometry that rotation
//!   notifications can replace atomically.
//!
//! - **`input_injection`** – A logging injector for the binary and a
//!   recording injector for tests.
//!
//! - **`capture`** – A synthetic capture backend for the binary and a
//!   scripted backend for tests.
//!
//! - **`storage`** – TOML configuration.

pub mod capture;
pub mod connection;
pub mod input_injection;
pub mod screen_info;
pub mod storage;
