//! Persisted keyboard settings.
//!
//! Storage (EEPROM on the reference hardware) lives outside this crate behind the
//! [`Settings`] trait and holds raw bytes. Erased cells read back as `0xFF`, so every
//! value is sanitized on the way in and on the way out.

use crate::driver::OutputPower;

/// Brightness used while the stored value is erased.
pub const DEFAULT_LED_BRIGHTNESS: u8 = 1;

/// Highest storable brightness; `0xFF` is reserved for "erased".
pub const MAX_LED_BRIGHTNESS: u8 = 254;

/// Brightness steps offered by the menu, dimmest first.
pub const LED_BRIGHTNESS_LEVELS: [u8; 12] = [1, 2, 4, 7, 12, 20, 32, 50, 80, 120, 180, 254];

/// Raw byte storage for settings.
pub trait Settings {
    /// Stored `RF_PWR` bits.
    fn output_power_raw(&mut self) -> u8;

    /// Stores `RF_PWR` bits.
    fn set_output_power_raw(&mut self, value: u8);

    /// Stored LED brightness.
    fn led_brightness_raw(&mut self) -> u8;

    /// Stores the LED brightness.
    fn set_led_brightness_raw(&mut self, value: u8);

    /// Output power, 0 dBm if the stored value is not a known step.
    fn output_power(&mut self) -> OutputPower {
        OutputPower::from_bits(self.output_power_raw())
    }

    /// Persists the output power.
    fn set_output_power(&mut self, power: OutputPower) {
        self.set_output_power_raw(power.bits());
    }

    /// LED brightness, [`DEFAULT_LED_BRIGHTNESS`] if erased.
    fn led_brightness(&mut self) -> u8 {
        match self.led_brightness_raw() {
            u8::MAX => DEFAULT_LED_BRIGHTNESS,
            value => value,
        }
    }

    /// Persists the LED brightness, clamped to [`MAX_LED_BRIGHTNESS`].
    fn set_led_brightness(&mut self, value: u8) {
        self.set_led_brightness_raw(value.min(MAX_LED_BRIGHTNESS));
    }
}

/// The menu step after `current`, wrapping to the dimmest.
pub fn next_brightness_level(current: u8) -> u8 {
    LED_BRIGHTNESS_LEVELS
        .iter()
        .copied()
        .find(|&level| level > current)
        .unwrap_or(LED_BRIGHTNESS_LEVELS[0])
}
