//! # warper-core
//!
//! Shared library for the Warper console client containing the controller
//! vocabulary, the remote-control command encoder, the response codec, and
//! the fixed memory pointer chains of the target game.
//!
//! It has zero dependencies on sockets, USB devices, or async runtimes.  The
//! `warper-client` crate owns every piece of I/O.
//!
//! # Architecture overview (for beginners)
//!
//! The console runs a small remote-control service (a *sys-module*) that
//! accepts plain-text commands such as `click A` or
//! `peekAbsolute 0x12345678 4`.  The client talks to it either over WiFi
//! (a TCP socket) or over a USB cable.
//!
//! This crate defines:
//!
//! - **`protocol`** – How commands look on the wire and how the service's
//!   replies are decoded.  WiFi replies are hex text; USB replies are
//!   length-prefixed raw bytes.
//!
//! - **`domain`** – Pure values with no I/O: the protocol selector, the
//!   pointer chains that locate game state in memory, and the 3-float
//!   position vector.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `warper_core::SwitchCommand` instead of `warper_core::protocol::commands::SwitchCommand`.
pub use domain::connection::SwitchProtocol;
pub use domain::pointers::PointerChain;
pub use domain::position::Vec3;
pub use protocol::buttons::{ScreenState, SwitchButton, SwitchStick};
pub use protocol::codec::CodecError;
pub use protocol::commands::SwitchCommand;
