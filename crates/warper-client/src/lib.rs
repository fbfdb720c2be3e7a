//! warper-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does warper-client do? (for beginners)
//!
//! A homebrew service running on the console accepts simple text commands:
//! press a button, move a stick, resolve a pointer chain, read or write
//! memory.  This crate wraps that service in a [`SessionClient`] offering
//! game-level operations:
//!
//! 1. Connect over WiFi (TCP) or USB and detach any stale virtual controller.
//! 2. Read and move the player, change the weather and the in-game clock.
//! 3. Run short button macros (mark the spawn point, save the game).
//! 4. Detach the controller and close the link on shutdown.
//!
//! Every operation goes through one exclusive gate so two callers never talk
//! to the console at the same time, and every operation can be cancelled.
//!
//! [`SessionClient`]: application::session::SessionClient

/// Application layer: the session, its macros, and the transport seam.
pub mod application;

/// Infrastructure layer: transports and configuration storage.
pub mod infrastructure;
