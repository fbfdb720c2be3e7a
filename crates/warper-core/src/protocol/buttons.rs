//! Controller buttons, analog sticks, and screen states understood by the
//! remote-control service.
//!
//! The service identifies every input by an upper-case token (`A`, `PLUS`,
//! `LSTICK`, ...).  [`SwitchButton::token`] returns exactly that token so the
//! command encoder never has to format enum names itself.

use std::fmt;

/// A physical button on the emulated controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchButton {
    A,
    B,
    X,
    Y,
    /// Right stick pressed in.
    RStick,
    /// Left stick pressed in.
    LStick,
    L,
    R,
    ZL,
    ZR,
    Plus,
    Minus,
    DLeft,
    DUp,
    DDown,
    DRight,
    Home,
    Capture,
}

impl SwitchButton {
    /// Returns the token the remote-control service expects for this button.
    pub fn token(self) -> &'static str {
        match self {
            SwitchButton::A => "A",
            SwitchButton::B => "B",
            SwitchButton::X => "X",
            SwitchButton::Y => "Y",
            SwitchButton::RStick => "RSTICK",
            SwitchButton::LStick => "LSTICK",
            SwitchButton::L => "L",
            SwitchButton::R => "R",
            SwitchButton::ZL => "ZL",
            SwitchButton::ZR => "ZR",
            SwitchButton::Plus => "PLUS",
            SwitchButton::Minus => "MINUS",
            SwitchButton::DLeft => "DLEFT",
            SwitchButton::DUp => "DUP",
            SwitchButton::DDown => "DDOWN",
            SwitchButton::DRight => "DRIGHT",
            SwitchButton::Home => "HOME",
            SwitchButton::Capture => "CAPTURE",
        }
    }
}

impl fmt::Display for SwitchButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One of the two analog sticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchStick {
    Left,
    Right,
}

impl SwitchStick {
    pub fn token(self) -> &'static str {
        match self {
            SwitchStick::Left => "LEFT",
            SwitchStick::Right => "RIGHT",
        }
    }
}

impl fmt::Display for SwitchStick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Backlight state of the console screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenState {
    On,
    Off,
}

impl From<bool> for ScreenState {
    fn from(on: bool) -> Self {
        if on {
            ScreenState::On
        } else {
            ScreenState::Off
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
