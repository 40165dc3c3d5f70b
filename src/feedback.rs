//! Receiver LED state carried back to the keyboard on acknowledgments.
//!
//! The keyboard side is purely reactive: every `LedStatus` ACK payload is handed to the
//! [`Indicator`] as it arrives. The dongle side keeps the host's LED report in a
//! [`HostLedState`], written by the USB stack from interrupt context and read by the
//! receive loop, which turns every change into one `LedStatus` ACK payload.

use core::cell::Cell;

use critical_section::Mutex;

/// Num Lock bit of the host LED report.
pub const LED_NUM_LOCK: u8 = 0x01;
/// Caps Lock bit of the host LED report.
pub const LED_CAPS_LOCK: u8 = 0x02;
/// Scroll Lock bit of the host LED report.
pub const LED_SCROLL_LOCK: u8 = 0x04;

/// The keyboard's LED array, driven by a PWM timer outside this crate.
pub trait Indicator {
    /// Lights the LEDs in `bits` for `cycles` wake-up timer cycles.
    fn show(&mut self, bits: u8, cycles: u8);

    /// Whether an animation is running. While it is, the CPU must not enter deep sleep.
    fn is_active(&self) -> bool;
}

/// Host LED report shared between the USB interrupt and the receive loop.
///
/// Meant to live in a `static`:
///
/// ```rust
/// use kbdlink::feedback::{HostLedState, LED_CAPS_LOCK};
///
/// static HOST_LEDS: HostLedState = HostLedState::new();
///
/// // USB SET_REPORT callback
/// HOST_LEDS.set(LED_CAPS_LOCK);
///
/// // receive loop
/// assert_eq!(HOST_LEDS.take_changed(), Some(LED_CAPS_LOCK));
/// assert_eq!(HOST_LEDS.take_changed(), None);
/// ```
#[derive(Debug)]
pub struct HostLedState {
    inner: Mutex<Cell<(u8, bool)>>,
}

impl HostLedState {
    /// No LEDs lit, nothing pending.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new((0, false))),
        }
    }

    /// Records the host's LED report. A value equal to the current one is not a change.
    pub fn set(&self, bits: u8) {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let (current, changed) = cell.get();
            cell.set((bits, changed || current != bits));
        });
    }

    /// Current LED bits.
    pub fn bits(&self) -> u8 {
        critical_section::with(|cs| self.inner.borrow(cs).get().0)
    }

    /// Returns the LED bits if they changed since the last call.
    pub fn take_changed(&self) -> Option<u8> {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let (bits, changed) = cell.get();
            cell.set((bits, false));
            changed.then_some(bits)
        })
    }
}

impl Default for HostLedState {
    fn default() -> Self {
        Self::new()
    }
}
