//! Sleep primitives and the adaptive polling scheduler of the keyboard.
//!
//! The keyboard spends almost all of its life asleep. Two wake-up sources are modelled
//! by the [`Sleep`] trait:
//!
//! - **Sleep cycles**: counts of the low-power wake-up timer at its slow prescaler
//!   (one count ≈ 277.78 µs), used between matrix scans and between text probes.
//! - **Naps**: counts of the same timer at its fast prescaler (one count ≈ 17.36 µs),
//!   used while a radio transaction is in flight.
//!
//! | Prescaler | Count      | Used for                      |
//! |-----------|------------|-------------------------------|
//! |        64 |   17.36 µs | [`Sleep::nap`]                |
//! |      1024 |  277.78 µs | [`Sleep::sleep_cycles`]       |
//!
//! [`SleepScheduler`] turns those into a back-off: fast polling right after activity,
//! slow polling when idle. The `wait_for_*` helpers wrap the scheduler around a
//! [`KeyMatrix`].
//!
//! A blocking [`DelayTimer`] backend over [`embedded_hal::delay::DelayNs`] is available
//! with the `delay-loop` feature, for boards without a power-save timer.

use libm::roundf;

use crate::fmt::trace;
use crate::mode::KeyMatrix;

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg_attr(feature = "delay-loop", allow(unused_imports))]
#[cfg(feature = "delay-loop")]
pub use delay::*;

/// Duration of one sleep cycle, in nanoseconds.
pub const SLEEP_CYCLE_NS: u32 = 277_778;
/// Duration of one nap count, in nanoseconds.
pub const NAP_COUNT_NS: u32 = 17_361;
/// Sleep cycles of one long lock-screen doze (≈ 70 ms).
pub const LONG_SLEEP_CYCLES: u8 = 0xfe;

/// Ways the keyboard can pass time.
pub trait Sleep {
    /// Sleeps for `cycles` wake-up timer cycles in power-save mode.
    fn sleep_cycles(&mut self, cycles: u8);

    /// Sleeps for `counts` short timer counts.
    fn nap(&mut self, counts: u8);

    /// Spins for `us` microseconds with the CPU awake.
    fn busy_wait_us(&mut self, us: u32);
}

impl<S: Sleep + ?Sized> Sleep for &mut S {
    fn sleep_cycles(&mut self, cycles: u8) {
        (**self).sleep_cycles(cycles);
    }

    fn nap(&mut self, counts: u8) {
        (**self).nap(counts);
    }

    fn busy_wait_us(&mut self, us: u32) {
        (**self).busy_wait_us(us);
    }
}

/// Back-off parameters of the [`SleepScheduler`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepConfig {
    /// Sleep length right after activity, in cycles.
    pub min_ticks: u8,
    /// Longest sleep the back-off may reach, in cycles.
    pub max_ticks: u8,
    /// Cycles added per back-off step.
    pub step: u8,
    /// Number of idle polls between two back-off steps.
    pub advance_every: u8,
    /// Duration of one cycle in microseconds.
    pub tick_us: f32,
}

impl SleepConfig {
    /// Checks that the back-off can make progress and stays within its bounds.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.min_ticks == 0 {
            return Err("min_ticks must be at least 1");
        }
        if self.min_ticks > self.max_ticks {
            return Err("min_ticks must not exceed max_ticks");
        }
        if self.step == 0 || self.advance_every == 0 {
            return Err("step and advance_every must be at least 1");
        }
        if !(self.tick_us > 0.0) {
            return Err("tick_us must be positive");
        }
        Ok(())
    }

    /// Converts a wall-clock duration into the nearest number of cycles, saturating at 255.
    pub fn cycles_for_us(&self, us: u32) -> u8 {
        let cycles = roundf(us as f32 / self.tick_us);
        if cycles >= 255.0 { u8::MAX } else { cycles as u8 }
    }
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            min_ticks: 8,
            max_ticks: 180,
            step: 4,
            advance_every: 4,
            tick_us: SLEEP_CYCLE_NS as f32 / 1_000.0,
        }
    }
}

/// Linear back-off between `min_ticks` and `max_ticks`.
///
/// ```rust
/// use kbdlink::timer::{SleepConfig, SleepScheduler};
///
/// let scheduler = SleepScheduler::new(SleepConfig::default()).unwrap();
/// assert_eq!(scheduler.ticks(), 8);
///
/// let inverted = SleepConfig { min_ticks: 20, max_ticks: 10, ..SleepConfig::default() };
/// assert!(SleepScheduler::new(inverted).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct SleepScheduler {
    config: SleepConfig,
    ticks: u8,
    counter: u8,
}

impl SleepScheduler {
    /// A scheduler at its minimum sleep length. Fails if `config` does not validate.
    pub fn new(config: SleepConfig) -> Result<Self, &'static str> {
        config.validate()?;
        Ok(Self {
            ticks: config.min_ticks,
            counter: 0,
            config,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &SleepConfig {
        &self.config
    }

    /// Length of the next sleep, in cycles.
    pub fn ticks(&self) -> u8 {
        self.ticks
    }

    /// Drops back to the shortest sleep. Called on any activity.
    pub fn reset(&mut self) {
        self.ticks = self.config.min_ticks;
        self.counter = 0;
    }

    /// Counts one idle poll, lengthens the sleep every `advance_every` polls, then sleeps.
    pub fn advance<S: Sleep>(&mut self, sleep: &mut S) {
        self.counter += 1;
        if self.counter >= self.config.advance_every {
            self.counter = 0;
            self.ticks = self
                .ticks
                .saturating_add(self.config.step)
                .min(self.config.max_ticks);
        }
        sleep.sleep_cycles(self.ticks);
    }
}

/// Sleeps until a scan reports that the pressed-key set changed.
pub fn wait_for_matrix_change<M: KeyMatrix, S: Sleep>(
    scheduler: &mut SleepScheduler,
    matrix: &mut M,
    sleep: &mut S,
) {
    scheduler.reset();
    while !matrix.scan() {
        scheduler.advance(sleep);
    }
    trace!("matrix changed after backing off to {} cycles", scheduler.ticks());
}

/// Sleeps until no key is pressed.
pub fn wait_for_all_keys_up<M: KeyMatrix, S: Sleep>(
    scheduler: &mut SleepScheduler,
    matrix: &mut M,
    sleep: &mut S,
) {
    scheduler.reset();
    loop {
        let _ = matrix.scan();
        if !matrix.any_pressed() {
            break;
        }
        scheduler.advance(sleep);
    }
}

/// Sleeps until at least one key is pressed.
pub fn wait_for_key_down<M: KeyMatrix, S: Sleep>(
    scheduler: &mut SleepScheduler,
    matrix: &mut M,
    sleep: &mut S,
) {
    scheduler.reset();
    loop {
        let _ = matrix.scan();
        if matrix.any_pressed() {
            break;
        }
        scheduler.advance(sleep);
    }
}
