//! Infrastructure layer for the session client.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `warper_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`connection`** – the WiFi and USB transports, the transport selector,
//!   and an in-memory recording console for tests.
//!
//! - **`storage`** – TOML configuration file in the platform config directory.

pub mod connection;
pub mod storage;
