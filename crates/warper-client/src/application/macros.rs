//! Scripted controller macros.
//!
//! A macro is a flat list of [`MacroStep`]s: either send one command or wait
//! a fixed wall-clock delay.  There is no branching and the delays are not
//! conditioned on any acknowledgement from the console; they encode how long
//! the game's menus take to open.  The delays come from [`MacroTimings`] so
//! they can be retuned from the config file without a rebuild.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warper_core::{SwitchButton, SwitchCommand, SwitchStick};

/// One step of a [`ButtonMacro`].
#[derive(Debug, Clone, PartialEq)]
pub enum MacroStep {
    Send(SwitchCommand),
    Wait(Duration),
}

/// A named sequence of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonMacro {
    name: &'static str,
    steps: Vec<MacroStep>,
}

impl ButtonMacro {
    pub fn new(name: &'static str, steps: Vec<MacroStep>) -> Self {
        Self { name, steps }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn steps(&self) -> &[MacroStep] {
        &self.steps
    }

    /// The commands of the macro in send order, without the delays.
    pub fn commands(&self) -> impl Iterator<Item = &SwitchCommand> {
        self.steps.iter().filter_map(|step| match step {
            MacroStep::Send(cmd) => Some(cmd),
            MacroStep::Wait(_) => None,
        })
    }

    /// Sum of every delay in the macro.
    pub fn total_delay(&self) -> Duration {
        self.steps
            .iter()
            .filter_map(|step| match step {
                MacroStep::Wait(d) => Some(*d),
                MacroStep::Send(_) => None,
            })
            .sum()
    }
}

/// Delays used by the scripted macros, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MacroTimings {
    /// Pause after opening the map before selecting the marker.
    #[serde(default = "default_mark_spawn_first_delay_ms")]
    pub mark_spawn_first_delay_ms: u64,
    /// Pause between the remaining map-marker inputs.
    #[serde(default = "default_mark_spawn_step_delay_ms")]
    pub mark_spawn_step_delay_ms: u64,
    /// Pause after opening the main menu.
    #[serde(default = "default_save_open_delay_ms")]
    pub save_open_delay_ms: u64,
    /// Pause after switching to the save tab.
    #[serde(default = "default_save_confirm_delay_ms")]
    pub save_confirm_delay_ms: u64,
    /// Pause while the game writes the save file.
    #[serde(default = "default_save_write_delay_ms")]
    pub save_write_delay_ms: u64,
    /// Pause after each of the two closing presses.
    #[serde(default = "default_save_close_delay_ms")]
    pub save_close_delay_ms: u64,
}

fn default_mark_spawn_first_delay_ms() -> u64 {
    450
}
fn default_mark_spawn_step_delay_ms() -> u64 {
    350
}
fn default_save_open_delay_ms() -> u64 {
    1_000
}
fn default_save_confirm_delay_ms() -> u64 {
    1_000
}
fn default_save_write_delay_ms() -> u64 {
    5_000
}
fn default_save_close_delay_ms() -> u64 {
    800
}

impl Default for MacroTimings {
    fn default() -> Self {
        Self {
            mark_spawn_first_delay_ms: default_mark_spawn_first_delay_ms(),
            mark_spawn_step_delay_ms: default_mark_spawn_step_delay_ms(),
            save_open_delay_ms: default_save_open_delay_ms(),
            save_confirm_delay_ms: default_save_confirm_delay_ms(),
            save_write_delay_ms: default_save_write_delay_ms(),
            save_close_delay_ms: default_save_close_delay_ms(),
        }
    }
}

fn click(button: SwitchButton) -> MacroStep {
    MacroStep::Send(SwitchCommand::Click(button))
}

fn wait_ms(ms: u64) -> MacroStep {
    MacroStep::Wait(Duration::from_millis(ms))
}

/// Opens the map and drops a marker on the current spawn point.
///
/// PLUS, LSTICK, A, PLUS, hold A, release A.
pub fn mark_spawn(timings: &MacroTimings) -> ButtonMacro {
    let step = timings.mark_spawn_step_delay_ms;
    ButtonMacro::new(
        "mark-spawn",
        vec![
            click(SwitchButton::Plus),
            wait_ms(timings.mark_spawn_first_delay_ms),
            click(SwitchButton::LStick),
            wait_ms(step),
            click(SwitchButton::A),
            wait_ms(step),
            click(SwitchButton::Plus),
            wait_ms(step),
            MacroStep::Send(SwitchCommand::Press(SwitchButton::A)),
            wait_ms(step),
            MacroStep::Send(SwitchCommand::Release(SwitchButton::A)),
        ],
    )
}

/// Opens the menu, saves, and backs out.
///
/// X, R, A, B, B.  The trailing delay lets the menu close before the next
/// operation is allowed onto the transport.
pub fn save_game(timings: &MacroTimings) -> ButtonMacro {
    ButtonMacro::new(
        "save-game",
        vec![
            click(SwitchButton::X),
            wait_ms(timings.save_open_delay_ms),
            click(SwitchButton::R),
            wait_ms(timings.save_confirm_delay_ms),
            click(SwitchButton::A),
            wait_ms(timings.save_write_delay_ms),
            click(SwitchButton::B),
            wait_ms(timings.save_close_delay_ms),
            click(SwitchButton::B),
            wait_ms(timings.save_close_delay_ms),
        ],
    )
}

/// Centres the left stick and detaches the virtual controller.
pub fn on_close() -> ButtonMacro {
    ButtonMacro::new(
        "on-close",
        vec![
            MacroStep::Send(SwitchCommand::reset_stick(SwitchStick::Left)),
            MacroStep::Send(SwitchCommand::DetachController),
        ],
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_spawn_sends_six_inputs_in_order() {
        // Arrange / Act
        let m = mark_spawn(&MacroTimings::default());
        let commands: Vec<String> = m.commands().map(ToString::to_string).collect();

        // Assert
        assert_eq!(
            commands,
            vec!["click PLUS", "click LSTICK", "click A", "click PLUS", "press A", "release A"]
        );
    }

    #[test]
    fn test_mark_spawn_default_delays() {
        let m = mark_spawn(&MacroTimings::default());
        let waits: Vec<Duration> = m
            .steps()
            .iter()
            .filter_map(|s| match s {
                MacroStep::Wait(d) => Some(*d),
                MacroStep::Send(_) => None,
            })
            .collect();

        assert_eq!(
            waits,
            vec![450, 350, 350, 350, 350]
                .into_iter()
                .map(Duration::from_millis)
                .collect::<Vec<_>>()
        );
        assert_eq!(m.total_delay(), Duration::from_millis(1_850));
    }

    #[test]
    fn test_save_game_sends_five_clicks_and_ends_with_a_delay() {
        // Arrange / Act
        let m = save_game(&MacroTimings::default());

        // Assert
        let commands: Vec<String> = m.commands().map(ToString::to_string).collect();
        assert_eq!(commands, vec!["click X", "click R", "click A", "click B", "click B"]);
        assert!(matches!(m.steps().last(), Some(MacroStep::Wait(_))));
        assert_eq!(m.total_delay(), Duration::from_millis(8_600));
    }

    #[test]
    fn test_custom_timings_flow_into_steps() {
        let timings = MacroTimings {
            save_write_delay_ms: 7_500,
            ..MacroTimings::default()
        };

        let m = save_game(&timings);

        assert_eq!(m.steps()[5], MacroStep::Wait(Duration::from_millis(7_500)));
    }

    #[test]
    fn test_on_close_resets_left_stick_then_detaches() {
        let m = on_close();
        let commands: Vec<String> = m.commands().map(ToString::to_string).collect();

        assert_eq!(commands, vec!["setStick LEFT 0 0", "detachController"]);
        assert_eq!(m.total_delay(), Duration::ZERO);
    }

    #[test]
    fn test_partial_timings_toml_uses_defaults() {
        let timings: MacroTimings = toml::from_str("save_write_delay_ms = 6000").unwrap();

        assert_eq!(timings.save_write_delay_ms, 6_000);
        assert_eq!(timings.mark_spawn_first_delay_ms, 450);
    }
}
