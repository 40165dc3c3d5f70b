use embedded_hal::delay::DelayNs;

use super::{NAP_COUNT_NS, SLEEP_CYCLE_NS, Sleep};

/// Implements [`Sleep`] with blocking delays.
///
/// Every kind of sleep becomes a busy wait of the same wall-clock length, so power is
/// not saved. Useful on boards without a power-save timer and on the host.
///
/// # Example
/// ```rust
/// use embedded_hal_mock::eh1::delay::NoopDelay;
/// use kbdlink::timer::{DelayTimer, Sleep};
///
/// let mut timer = DelayTimer::new(NoopDelay::new());
/// timer.sleep_cycles(40); // roughly 11 ms
/// ```
#[derive(Debug)]
pub struct DelayTimer<D> {
    delay: D,
}

impl<D: DelayNs> DelayTimer<D> {
    /// Wraps a delay provider.
    pub fn new(delay: D) -> Self {
        Self { delay }
    }

    /// Returns the delay provider.
    pub fn release(self) -> D {
        self.delay
    }
}

impl<D: DelayNs> Sleep for DelayTimer<D> {
    fn sleep_cycles(&mut self, cycles: u8) {
        self.delay.delay_ns(u32::from(cycles) * SLEEP_CYCLE_NS);
    }

    fn nap(&mut self, counts: u8) {
        self.delay.delay_ns(u32::from(counts) * NAP_COUNT_NS);
    }

    fn busy_wait_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}
