//! Capture backends.
//!
//! The platform capture pipeline (virtual display plus hardware encoder)
//! lives outside this crate. The server binary ships with the synthetic
//! backend; tests drive the streamer with the scripted one.

pub mod mock;
pub mod synthetic;

pub use synthetic::SyntheticCapture;
