//! Domain layer: pure values with no I/O.
//!
//! # Sub-modules
//!
//! - **`connection`** – The [`SwitchProtocol`] selector read from
//!   configuration.  It decides which transport is built and whether
//!   commands carry a `\r\n` terminator.
//!
//! - **`pointers`** – The fixed [`PointerChain`]s that locate the player
//!   position, weather, clock, and object tables in the game's memory.
//!
//! - **`position`** – [`Vec3`], the three-float position read from and
//!   written to memory.

pub mod connection;
pub mod pointers;
pub mod position;

pub use connection::SwitchProtocol;
pub use pointers::PointerChain;
pub use position::Vec3;
