//! Application layer for the Warper client.
//!
//! # What does the application layer hold?
//!
//! - **`connection`** – The [`connection::SwitchConnection`] trait: the
//!   capability set every transport must provide (connect, send a command,
//!   resolve a pointer chain, read and write absolute memory).  The concrete
//!   USB and socket implementations live in the infrastructure layer and are
//!   injected at construction time.
//!
//! - **`session`** – The [`session::SessionClient`]: connection lifecycle,
//!   memory operations on the fixed pointer chains, and the exclusive gate
//!   that keeps operations from interleaving on the transport.
//!
//! - **`macros`** – Scripted button sequences (`markSpawn`, `saveGame`, the
//!   shutdown cleanup) expressed as data, plus their configurable delays.

pub mod connection;
pub mod macros;
pub mod session;
