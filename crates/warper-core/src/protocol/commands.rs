//! Command encoder for the console's remote-control service.
//!
//! Wire format (one command per line):
//! ```text
//! click A\r\n
//! setStick RIGHT 1200 0\r\n
//! pointerAll 0x40FE500 0xB8 0x0\r\n
//! peekAbsolute 0x00000000DEADBEEF 4\r\n
//! pokeAbsolute 0x00000000DEADBEEF 0x01020304\r\n
//! ```
//!
//! The `\r\n` terminator is only used over WiFi, where the service reads the
//! socket line by line.  Over USB every command is already delimited by a
//! length prefix (see [`crate::protocol::codec::frame_usb`]) so the bare text
//! is sent without a line ending.

use std::fmt;

use crate::domain::pointers::PointerChain;
use crate::protocol::buttons::{ScreenState, SwitchButton, SwitchStick};
use crate::protocol::codec::encode_hex;

/// A single command understood by the remote-control service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchCommand {
    /// Press and release a button.
    Click(SwitchButton),
    /// Press a button and keep it held.
    Press(SwitchButton),
    /// Release a previously held button.
    Release(SwitchButton),
    /// Move an analog stick to an absolute position.
    SetStick { stick: SwitchStick, x: i16, y: i16 },
    /// Tell the console the virtual controller is going away.
    DetachController,
    /// Turn the screen backlight on or off.
    SetScreen(ScreenState),
    /// Resolve a pointer chain to an absolute address.
    PointerAll(Vec<i64>),
    /// Read `length` bytes at an absolute address.
    PeekAbsolute { address: u64, length: usize },
    /// Write bytes at an absolute address.
    PokeAbsolute { address: u64, data: Vec<u8> },
}

impl SwitchCommand {
    /// Centres a stick.
    pub fn reset_stick(stick: SwitchStick) -> Self {
        SwitchCommand::SetStick { stick, x: 0, y: 0 }
    }

    /// Builds a `pointerAll` command from one of the fixed chains.
    pub fn pointer_all(chain: &PointerChain) -> Self {
        SwitchCommand::PointerAll(chain.offsets().to_vec())
    }

    /// Encodes the command, appending `\r\n` when `crlf` is set.
    pub fn encode(&self, crlf: bool) -> Vec<u8> {
        let mut text = self.to_string();
        if crlf {
            text.push_str("\r\n");
        }
        text.into_bytes()
    }
}

impl fmt::Display for SwitchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchCommand::Click(button) => write!(f, "click {button}"),
            SwitchCommand::Press(button) => write!(f, "press {button}"),
            SwitchCommand::Release(button) => write!(f, "release {button}"),
            SwitchCommand::SetStick { stick, x, y } => write!(f, "setStick {stick} {x} {y}"),
            SwitchCommand::DetachController => f.write_str("detachController"),
            SwitchCommand::SetScreen(ScreenState::On) => f.write_str("screenOn"),
            SwitchCommand::SetScreen(ScreenState::Off) => f.write_str("screenOff"),
            SwitchCommand::PointerAll(offsets) => {
                f.write_str("pointerAll")?;
                for offset in offsets {
                    write!(f, " {}", signed_hex(*offset))?;
                }
                Ok(())
            }
            SwitchCommand::PeekAbsolute { address, length } => {
                write!(f, "peekAbsolute 0x{address:016X} {length}")
            }
            SwitchCommand::PokeAbsolute { address, data } => {
                write!(f, "pokeAbsolute 0x{address:016X} 0x{}", encode_hex(data))
            }
        }
    }
}

/// Formats an offset as `0x...` or `-0x...`; the service parses both.
fn signed_hex(value: i64) -> String {
    if value < 0 {
        format!("-0x{:X}", value.unsigned_abs())
    } else {
        format!("0x{value:X}")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
