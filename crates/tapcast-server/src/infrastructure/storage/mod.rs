//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration, fills in defaults
//! for anything missing and converts it into the settings types the
//! application layer consumes.

pub mod config;
