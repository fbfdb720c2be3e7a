//! Fixed pointer chains into the game's memory.
//!
//! # What is a pointer chain? (for beginners)
//!
//! Game state lives on the heap, so its address changes every time the game
//! starts.  What stays fixed is the *path* to it: start at the main module's
//! base address, add the first offset, read the 8-byte pointer stored there,
//! add the next offset, read again, and so on.  The last offset is added
//! without a final read and the result is the absolute address of the value.
//!
//! ```text
//! main + 0x40FE500 -> [ptr] + 0xB8 -> [ptr] + 0x0 => metadata base
//! ```
//!
//! The console service walks the chain itself (`pointerAll`); the client
//! only ships the offsets.  The chains below are constants for the current
//! game build and are never derived from runtime data.

use std::fmt;

/// A named, immutable sequence of offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerChain {
    name: &'static str,
    offsets: &'static [i64],
}

impl PointerChain {
    pub const fn new(name: &'static str, offsets: &'static [i64]) -> Self {
        Self { name, offsets }
    }

    /// Short label used in log lines.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn offsets(&self) -> &'static [i64] {
        self.offsets
    }
}

impl fmt::Display for PointerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.name)?;
        for (i, offset) in self.offsets.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "0x{offset:X}")?;
        }
        f.write_str("]")
    }
}

/// Player position: three `f32` values.
pub const PLAYER_POSITION: PointerChain =
    PointerChain::new("player-position", &[0x47D71A0, 0x248, 0x00, 0x138, 0x90]);

/// Current weather: 4 bytes.
pub const WEATHER: PointerChain = PointerChain::new("weather", &[0x612FC30, 0xB0, 0x28, 0x00]);

/// In-game clock: 4 bytes.
pub const TIME: PointerChain = PointerChain::new("time", &[0x40FE500, 0x20, 0x40, 0x30]);

/// Base of the spawn metadata block.
pub const META_BASE: PointerChain = PointerChain::new("meta-base", &[0x40FE500, 0xB8, 0x00]);

/// Start of the spawn array.
pub const ARRAY_START: PointerChain =
    PointerChain::new("array-start", &[0x40FE500, 0xB8, 0x378, 0x00]);

/// Start of the invalid-entry marker table.
pub const INVALID_START: PointerChain =
    PointerChain::new("invalid-start", &[0x40FE500, 0xB8, 0x380, 0x00]);
