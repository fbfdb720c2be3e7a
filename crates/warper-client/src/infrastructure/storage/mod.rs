//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration from the
//! platform-appropriate directory, falls back to defaults on first run, and
//! writes the file back when asked.

pub mod config;
