//! Protocol module containing the controller vocabulary, command encoder, and
//! response codec.

pub mod buttons;
pub mod codec;
pub mod commands;

pub use buttons::{ScreenState, SwitchButton, SwitchStick};
pub use codec::CodecError;
pub use commands::SwitchCommand;
