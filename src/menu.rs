//! Interactive menu typed into the host through the text channel.
//!
//! Screens are implemented against [`MenuContext`], which bundles everything a screen
//! may touch: printing, reading one keypress, radio counters, persisted settings and the
//! battery. [`StatusMenu`] is the built-in status screen.

use core::fmt::Write;

use heapless::String;

use crate::driver::OutputPower;
use crate::error::Error;
use crate::keycode::{KC_ESC, KC_F1, KC_F2, KC_F3, KC_F4, KC_F5};
use crate::link::RadioStats;
use crate::settings::next_brightness_level;

/// Battery voltage sampling.
pub trait Battery {
    /// Battery voltage in hundredths of a volt.
    fn voltage_centivolts(&mut self) -> u16;
}

/// How a menu was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum MenuExit {
    /// Back to normal typing.
    Resume,
    /// Lock the keyboard.
    Lock,
}

/// What a menu screen can do.
pub trait MenuContext {
    /// Types `text` on the host, optionally waiting until all of it is typed.
    fn print(&mut self, text: &str, wait_for_drain: bool) -> Result<(), Error>;

    /// Waits for one key to be pressed and released and returns its keycode.
    fn read_key(&mut self) -> u8;

    /// Battery voltage in hundredths of a volt.
    fn battery_centivolts(&mut self) -> u16;

    /// Radio counters.
    fn stats(&self) -> RadioStats;

    /// Zeroes the radio counters.
    fn reset_stats(&mut self);

    /// Persisted output power.
    fn output_power(&mut self) -> OutputPower;

    /// Persists and applies a new output power.
    fn set_output_power(&mut self, power: OutputPower);

    /// Persisted LED brightness.
    fn led_brightness(&mut self) -> u8;

    /// Persists a new LED brightness.
    fn set_led_brightness(&mut self, value: u8);
}

/// A menu screen.
pub trait Menu {
    /// Runs until the user leaves. Errors from printing abort the menu.
    fn run(&mut self, ctx: &mut dyn MenuContext) -> Result<MenuExit, Error>;
}

/// Built-in status screen.
///
/// Prints battery voltage, radio counters, output power and LED brightness, then waits
/// for one of:
///
/// | Key | Action                         |
/// |-----|--------------------------------|
/// | F1  | next output power step         |
/// | F2  | next LED brightness step       |
/// | F3  | lock the keyboard              |
/// | F4  | reset radio counters           |
/// | F5  | refresh                        |
/// | Esc | leave the menu                 |
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusMenu;

type Line = String<64>;

impl StatusMenu {
    fn print_status(ctx: &mut dyn MenuContext) -> Result<(), Error> {
        let volts = ctx.battery_centivolts();
        let stats = ctx.stats();
        let power = ctx.output_power();
        let brightness = ctx.led_brightness();

        let mut line = Line::new();
        // every line is far shorter than the buffer
        let _ = writeln!(line, "\nbattery voltage: {}.{:02}V", volts / 100, volts % 100);
        ctx.print(&line, false)?;

        line.clear();
        let _ = writeln!(line, "RF packets: {}", stats.packets);
        ctx.print(&line, false)?;

        line.clear();
        let _ = writeln!(line, "RF retransmits: {}", stats.retransmits);
        ctx.print(&line, false)?;

        line.clear();
        let _ = writeln!(line, "RF packets lost: {}\n", stats.lost);
        ctx.print(&line, false)?;

        line.clear();
        let _ = writeln!(line, "F1 - output power (current {}dBm)", power.dbm());
        ctx.print(&line, false)?;

        line.clear();
        let _ = writeln!(line, "F2 - LED brightness (current {})", brightness);
        ctx.print(&line, false)?;

        ctx.print(
            "F3 - lock keyboard\nF4 - reset RF stats\nF5 - refresh\nEsc - exit menu\n\n",
            false,
        )
    }
}

impl Menu for StatusMenu {
    fn run(&mut self, ctx: &mut dyn MenuContext) -> Result<MenuExit, Error> {
        loop {
            Self::print_status(ctx)?;
            loop {
                match ctx.read_key() {
                    KC_F1 => {
                        let power = ctx.output_power().cycle();
                        ctx.set_output_power(power);
                    }
                    KC_F2 => {
                        let level = next_brightness_level(ctx.led_brightness());
                        ctx.set_led_brightness(level);
                    }
                    KC_F3 => {
                        ctx.print("keyboard locked\nunlock with Fn+Ctrl+Del\n\n", true)?;
                        return Ok(MenuExit::Lock);
                    }
                    KC_F4 => ctx.reset_stats(),
                    KC_F5 => {}
                    KC_ESC => {
                        ctx.print("\nexiting menu, you can type now\n", true)?;
                        return Ok(MenuExit::Resume);
                    }
                    _ => continue,
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::FakeMenuContext;

    #[test]
    fn test_status_screen_contents() {
        let mut ctx = FakeMenuContext::new(&[KC_ESC]);
        ctx.battery = 287;
        ctx.stats = RadioStats {
            packets: 120,
            retransmits: 7,
            lost: 2,
        };

        assert_eq!(StatusMenu.run(&mut ctx), Ok(MenuExit::Resume));
        assert!(ctx.printed.contains("battery voltage: 2.87V\n"));
        assert!(ctx.printed.contains("RF packets: 120\n"));
        assert!(ctx.printed.contains("RF retransmits: 7\n"));
        assert!(ctx.printed.contains("RF packets lost: 2\n\nF1 - output power (current 0dBm)\nF2"));
        assert!(ctx.printed.contains("current 0dBm"));
        assert!(ctx.printed.ends_with("you can type now\n"));
        assert_eq!(ctx.drain_waits, 1);
    }

    #[test]
    fn test_settings_keys_refresh_screen() {
        let mut ctx = FakeMenuContext::new(&[KC_F1, KC_F2, KC_F4, KC_ESC]);
        ctx.stats.packets = 9;

        assert_eq!(StatusMenu.run(&mut ctx), Ok(MenuExit::Resume));
        assert_eq!(ctx.power, OutputPower::Minus18Dbm);
        assert_eq!(ctx.brightness, 2);
        assert_eq!(ctx.stats, RadioStats::default());
        assert_eq!(ctx.printed.matches("battery voltage").count(), 4);
        assert!(ctx.printed.contains("current -18dBm"));
        assert!(ctx.printed.contains("RF packets: 0\n"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let mut ctx = FakeMenuContext::new(&[0x04, 0x05, KC_F3]);
        assert_eq!(StatusMenu.run(&mut ctx), Ok(MenuExit::Lock));
        assert_eq!(ctx.printed.matches("battery voltage").count(), 1);
    }

    #[test]
    fn test_print_failure_aborts() {
        let mut ctx = FakeMenuContext::new(&[KC_ESC]);
        ctx.fail_print = true;
        assert_eq!(StatusMenu.run(&mut ctx), Err(Error::LinkTimeout));
    }
}
