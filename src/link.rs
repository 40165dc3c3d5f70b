//! The acknowledged-send primitive and ACK payload draining.
//!
//! A radio backend implements [`Link`] (keyboard, transmit role) and/or [`Listener`]
//! (dongle, receive role). [`Transmitter`] layers the blocking, budget-bounded send and
//! the ACK payload drain on top of a [`Link`], choosing how to wait for completion with
//! a [`WaitStrategy`].
//!
//! ## Send lifecycle
//!
//! 1. [`Link::start_send`] powers the radio up, loads the frame and fires it.
//! 2. [`Link::poll_send`] returns [`nb::Error::WouldBlock`] until the transceiver
//!    reports completion, then tears the transaction down and reports the outcome.
//! 3. If the wait budget runs out first, [`Link::abort_send`] tears it down instead.
//!
//! Whatever the outcome, the radio is left powered down with empty TX FIFO and clear
//! status flags.

use crate::consts::{LED_FEEDBACK_CYCLES, SEND_WAIT_BUDGET_US};
use crate::driver::OutputPower;
use crate::error::Error;
use crate::feedback::Indicator;
use crate::fmt::{debug, trace, warn};
use crate::message::{Frame, Message, TextBufFree};
use crate::timer::{NAP_COUNT_NS, Sleep};

/// Depth of the transceiver's RX FIFO. Bounds one drain.
pub const RX_FIFO_DEPTH: u8 = 3;

/// Nap counts before the first completion poll while dozing.
pub const FIRST_NAP_COUNTS: u8 = 50;

/// Nap counts between later completion polls while dozing.
pub const NEXT_NAP_COUNTS: u8 = 10;

/// Busy wait between completion polls while the indicator is animating, in µs.
pub const BUSY_POLL_STEP_US: u32 = 20;

/// Result of one radio transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum SendOutcome {
    /// The peer acknowledged the frame.
    Acked,
    /// Every hardware retransmit went unanswered, or the wait was aborted.
    NotAcked,
}

/// Cumulative radio counters since boot or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct RadioStats {
    /// Frames handed to the transceiver.
    pub packets: u32,
    /// Hardware retransmits spent on them.
    pub retransmits: u32,
    /// Frames never acknowledged.
    pub lost: u32,
}

impl RadioStats {
    /// Accounts one finished transaction.
    pub fn record(&mut self, retransmits: u8, outcome: SendOutcome) {
        self.packets = self.packets.saturating_add(1);
        self.retransmits = self.retransmits.saturating_add(u32::from(retransmits));
        if outcome == SendOutcome::NotAcked {
            self.lost = self.lost.saturating_add(1);
        }
    }
}

/// Transmit side of the radio.
pub trait Link {
    /// Powers the radio up with the current output power and fires `payload`.
    fn start_send(&mut self, payload: &[u8]) -> Result<(), Error>;

    /// Completes the transaction once the transceiver signals it.
    fn poll_send(&mut self) -> nb::Result<SendOutcome, Error>;

    /// Tears down a transaction that is still in flight.
    fn abort_send(&mut self) -> Result<SendOutcome, Error>;

    /// Pops one ACK payload from the RX FIFO, if any.
    fn read_ack_payload(&mut self) -> Result<Option<Frame>, Error>;

    /// Counters since boot or the last [`reset_stats`](Link::reset_stats).
    fn stats(&self) -> RadioStats;

    /// Zeroes the counters.
    fn reset_stats(&mut self);

    /// Output power used from the next send on.
    fn output_power(&self) -> OutputPower;

    /// Changes the output power of the next sends.
    fn set_output_power(&mut self, power: OutputPower);
}

/// Receive side of the radio.
pub trait Listener {
    /// Pops one received frame, if any.
    fn recv(&mut self) -> Result<Option<Frame>, Error>;

    /// Queues a payload for the acknowledgment of the next received frame.
    fn queue_ack_payload(&mut self, payload: &[u8]) -> Result<(), Error>;

    /// Discards every queued ACK payload.
    fn flush_ack_payloads(&mut self) -> Result<(), Error>;
}

/// How the CPU passes time while a transaction is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum WaitStrategy {
    /// Stay awake and spin between polls, so the LED PWM keeps running.
    BusyPoll,
    /// Nap on the wake-up timer between polls.
    Doze,
}

impl WaitStrategy {
    /// Busy polling while the indicator animates, dozing otherwise.
    pub fn select(indicator_active: bool) -> Self {
        if indicator_active {
            Self::BusyPoll
        } else {
            Self::Doze
        }
    }

    /// Waits once before the next poll and returns the time spent, in microseconds.
    pub fn wait<S: Sleep>(self, sleep: &mut S, first: bool) -> u32 {
        match self {
            Self::BusyPoll => {
                sleep.busy_wait_us(BUSY_POLL_STEP_US);
                BUSY_POLL_STEP_US
            }
            Self::Doze => {
                let counts = if first { FIRST_NAP_COUNTS } else { NEXT_NAP_COUNTS };
                sleep.nap(counts);
                u32::from(counts) * NAP_COUNT_NS / 1_000
            }
        }
    }
}

/// What one ACK payload drain yielded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct AckDrain {
    /// Latest receiver headroom seen.
    pub buf_state: Option<TextBufFree>,
    /// Latest LED bits seen. Already applied to the indicator.
    pub led_bits: Option<u8>,
    /// Number of frames pulled, malformed ones included.
    pub frames: u8,
}

/// Keyboard-side owner of the radio, the LED indicator and the sleep backend.
#[derive(Debug)]
pub struct Transmitter<L, I, S> {
    link: L,
    indicator: I,
    sleep: S,
    wait_budget_us: u32,
}

impl<L: Link, I: Indicator, S: Sleep> Transmitter<L, I, S> {
    /// Bundles the collaborators with the default wait budget.
    pub fn new(link: L, indicator: I, sleep: S) -> Self {
        Self {
            link,
            indicator,
            sleep,
            wait_budget_us: SEND_WAIT_BUDGET_US,
        }
    }

    /// Overrides how long one send may wait for completion.
    pub fn with_wait_budget_us(mut self, budget_us: u32) -> Self {
        self.wait_budget_us = budget_us;
        self
    }

    /// The radio.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// The radio, mutably.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// The LED indicator.
    pub fn indicator_mut(&mut self) -> &mut I {
        &mut self.indicator
    }

    /// The sleep backend.
    pub fn sleep_mut(&mut self) -> &mut S {
        &mut self.sleep
    }

    /// Splits the transmitter back into its parts.
    pub fn into_parts(self) -> (L, I, S) {
        (self.link, self.indicator, self.sleep)
    }

    /// Sends one frame and blocks until it is acknowledged, lost, or the budget is spent.
    pub fn send(&mut self, payload: &[u8]) -> Result<SendOutcome, Error> {
        self.link.start_send(payload)?;
        let strategy = WaitStrategy::select(self.indicator.is_active());
        let mut waited_us: u32 = 0;
        let mut first = true;
        loop {
            match self.link.poll_send() {
                Ok(outcome) => {
                    if outcome == SendOutcome::NotAcked {
                        debug!("frame of {} bytes not acknowledged", payload.len());
                    }
                    return Ok(outcome);
                }
                Err(nb::Error::Other(e)) => {
                    warn!("send failed while in flight: {:?}", e);
                    if let Err(abort) = self.link.abort_send() {
                        warn!("teardown after failed send: {:?}", abort);
                    }
                    return Err(e);
                }
                Err(nb::Error::WouldBlock) => {}
            }
            if waited_us >= self.wait_budget_us {
                warn!("send still in flight after {} us, aborting", waited_us);
                return self.link.abort_send();
            }
            waited_us = waited_us.saturating_add(strategy.wait(&mut self.sleep, first));
            first = false;
        }
    }

    /// Encodes and sends a message.
    pub fn send_message(&mut self, message: &Message) -> Result<SendOutcome, Error> {
        self.send(&message.encode())
    }

    /// Sends a frame up to `attempts` times until it is acknowledged.
    pub fn send_with_retries(&mut self, payload: &[u8], attempts: u8) -> Result<SendOutcome, Error> {
        for _ in 0..attempts {
            if self.send(payload)? == SendOutcome::Acked {
                return Ok(SendOutcome::Acked);
            }
        }
        Ok(SendOutcome::NotAcked)
    }

    /// Pulls every queued ACK payload, applying LED state on the way.
    ///
    /// Malformed and unexpected frames are skipped.
    pub fn drain_ack_payloads(&mut self) -> Result<AckDrain, Error> {
        let mut drain = AckDrain::default();
        while drain.frames < RX_FIFO_DEPTH {
            let Some(frame) = self.link.read_ack_payload()? else {
                break;
            };
            drain.frames += 1;
            match Message::decode(&frame) {
                Ok(Message::LedStatus(status)) => {
                    self.indicator.show(status.bits, LED_FEEDBACK_CYCLES);
                    drain.led_bits = Some(status.bits);
                }
                Ok(Message::TextBufFree(state)) => drain.buf_state = Some(state),
                Ok(other) => trace!("ignoring ack payload with tag {}", other.tag()),
                Err(e) => trace!("ignoring malformed ack payload: {:?}", e),
            }
        }
        Ok(drain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::MT_LED_STATUS;
    use crate::message::{KeyStateReport, TextChunk};
    use crate::mock::{FakeIndicator, FakeSleep, SimLink};

    fn transmitter() -> Transmitter<SimLink<33>, FakeIndicator, FakeSleep> {
        Transmitter::new(SimLink::new(), FakeIndicator::default(), FakeSleep::default())
    }

    #[test]
    fn test_wait_strategy_selection() {
        assert_eq!(WaitStrategy::select(true), WaitStrategy::BusyPoll);
        assert_eq!(WaitStrategy::select(false), WaitStrategy::Doze);
    }

    #[test]
    fn test_doze_naps_long_then_short() {
        let mut tx = transmitter();
        tx.link_mut().polls_before_done = 3;
        let outcome = tx.send_message(&KeyStateReport::new().into()).unwrap();
        assert_eq!(outcome, SendOutcome::Acked);
        assert_eq!(tx.sleep_mut().naps, vec![50, 10, 10]);
        assert_eq!(tx.sleep_mut().busy_us, 0);
    }

    #[test]
    fn test_busy_poll_while_animating() {
        let mut tx = transmitter();
        tx.indicator_mut().active = true;
        tx.link_mut().polls_before_done = 2;
        let _ = tx.send_message(&KeyStateReport::new().into()).unwrap();
        assert!(tx.sleep_mut().naps.is_empty());
        assert_eq!(tx.sleep_mut().busy_us, 2 * BUSY_POLL_STEP_US);
    }

    #[test]
    fn test_hung_transaction_is_aborted() {
        let mut tx = transmitter().with_wait_budget_us(1_000);
        tx.link_mut().hang = true;
        let outcome = tx.send_message(&KeyStateReport::new().into()).unwrap();
        assert_eq!(outcome, SendOutcome::NotAcked);
        assert_eq!(tx.link_mut().aborts, 1);
        assert_eq!(tx.link().stats().lost, 1);
    }

    #[test]
    fn test_poll_error_tears_down() {
        let mut tx = transmitter();
        tx.link_mut().fail_poll = true;
        let result = tx.send_message(&KeyStateReport::new().into());
        assert_eq!(result, Err(Error::Bus));
        assert_eq!(tx.link_mut().aborts, 1);
        assert_eq!(tx.link().stats().lost, 1);
    }

    #[test]
    fn test_retries_stop_at_limit() {
        let mut tx = transmitter();
        tx.link_mut().drop_all = true;
        let frame = Message::from(KeyStateReport::new()).encode();
        assert_eq!(tx.send_with_retries(&frame, 4).unwrap(), SendOutcome::NotAcked);
        assert_eq!(tx.link().stats().packets, 4);
        assert_eq!(tx.link().stats().lost, 4);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut tx = transmitter();
        assert_eq!(tx.send(&[0u8; 33]), Err(Error::PayloadTooLarge(33)));
    }

    #[test]
    fn test_drain_applies_led_status_and_lags_one_frame() {
        let mut tx = transmitter();
        tx.link_mut().host_leds.set(0x02);

        // The LED change is queued after this frame, so its ack carries nothing.
        let _ = tx.send_message(&KeyStateReport::new().into()).unwrap();
        let drain = tx.drain_ack_payloads().unwrap();
        assert_eq!(drain.frames, 0);

        let _ = tx.send_message(&KeyStateReport::new().into()).unwrap();
        let drain = tx.drain_ack_payloads().unwrap();
        assert_eq!(drain.led_bits, Some(0x02));
        assert_eq!(tx.indicator_mut().shown, vec![(0x02, LED_FEEDBACK_CYCLES)]);
    }

    #[test]
    fn test_drain_reports_headroom_and_skips_garbage() {
        let mut tx = transmitter();
        tx.link_mut().inject_ack(&[0x7f, 1, 2]);
        tx.link_mut().inject_ack(&[MT_LED_STATUS]);
        let _ = tx.send_message(&TextChunk::probe().into()).unwrap();
        let _ = tx.send_message(&TextChunk::probe().into()).unwrap();
        let drain = tx.drain_ack_payloads().unwrap();
        assert_eq!(drain.frames, 3);
        assert_eq!(drain.led_bits, None);
        assert_eq!(
            drain.buf_state,
            Some(TextBufFree {
                bytes_free: 32,
                bytes_capacity: 32
            })
        );
        assert!(tx.indicator_mut().shown.is_empty());
    }
}
