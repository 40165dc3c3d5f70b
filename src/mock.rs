//! In-memory stand-ins for the hardware seams, shared by the unit tests.
#![allow(dead_code)]

use std::collections::VecDeque;

use crate::consts::MAX_PAYLOAD_LEN;
use crate::driver::OutputPower;
use crate::error::Error;
use crate::feedback::{HostLedState, Indicator};
use crate::hid::HidTransport;
use crate::keycode::{KC_ESC, KC_NO};
use crate::link::{Link, Listener, RX_FIFO_DEPTH, RadioStats, SendOutcome};
use crate::menu::{Battery, Menu, MenuContext, MenuExit};
use crate::message::{Frame, Message};
use crate::mode::KeyMatrix;
use crate::receiver::Receiver;
use crate::settings::Settings;
use crate::timer::Sleep;
use usbd_hid::descriptor::{KeyboardReport, MediaKeyboardReport};

const ACK_FIFO_DEPTH: usize = 3;
const LOST_RETRANSMITS: u8 = 15;

fn frame(bytes: &[u8]) -> Result<Frame, Error> {
    Frame::from_slice(bytes).map_err(|_| Error::PayloadTooLarge(bytes.len()))
}

/// Dongle radio: scripted inbox, 3-deep ACK payload FIFO.
#[derive(Debug, Default)]
pub struct FakeListener {
    pub inbox: VecDeque<Vec<u8>>,
    pub acks: Vec<Vec<u8>>,
    pub flushes: usize,
}

impl Listener for FakeListener {
    fn recv(&mut self) -> Result<Option<Frame>, Error> {
        self.inbox.pop_front().map(|bytes| frame(&bytes)).transpose()
    }

    fn queue_ack_payload(&mut self, payload: &[u8]) -> Result<(), Error> {
        if self.acks.len() >= ACK_FIFO_DEPTH {
            self.flush_ack_payloads()?;
        }
        self.acks.push(payload.to_vec());
        Ok(())
    }

    fn flush_ack_payloads(&mut self) -> Result<(), Error> {
        self.acks.clear();
        self.flushes += 1;
        Ok(())
    }
}

/// Keyboard radio wired straight into a [`Receiver`] and a host that types
/// `host_pops_per_send` ring bytes after every delivered frame.
#[derive(Debug)]
pub struct SimLink<const N: usize> {
    pub receiver: Receiver<N>,
    pub dongle: FakeListener,
    pub host_leds: HostLedState,
    pub drop_all: bool,
    pub hang: bool,
    pub polls_before_done: u8,
    pub fail_poll: bool,
    /// Text chunks that reach the dongle but whose acknowledgment goes missing.
    pub lose_chunk_acks: usize,
    pub host_pops_per_send: usize,
    pub typed: Vec<u8>,
    pub delivered: Vec<Message>,
    pub aborts: u8,
    rx_fifo: VecDeque<Frame>,
    outcome: SendOutcome,
    polls: u8,
    stats: RadioStats,
    power: OutputPower,
}

impl<const N: usize> SimLink<N> {
    pub fn new() -> Self {
        Self {
            receiver: Receiver::new(),
            dongle: FakeListener::default(),
            host_leds: HostLedState::new(),
            drop_all: false,
            hang: false,
            polls_before_done: 0,
            fail_poll: false,
            lose_chunk_acks: 0,
            host_pops_per_send: 0,
            typed: Vec::new(),
            delivered: Vec::new(),
            aborts: 0,
            rx_fifo: VecDeque::new(),
            outcome: SendOutcome::NotAcked,
            polls: 0,
            stats: RadioStats::default(),
            power: OutputPower::default(),
        }
    }

    /// Puts a payload straight into the keyboard's RX FIFO.
    pub fn inject_ack(&mut self, bytes: &[u8]) {
        if let Ok(ack) = frame(bytes) {
            self.push_rx(ack);
        }
    }

    fn push_rx(&mut self, ack: Frame) {
        if self.rx_fifo.len() < usize::from(RX_FIFO_DEPTH) {
            self.rx_fifo.push_back(ack);
        }
    }

    fn deliver(&mut self, payload: &[u8], ack_lost: bool) {
        if !self.dongle.acks.is_empty() {
            let ack = self.dongle.acks.remove(0);
            if !ack_lost {
                if let Ok(ack) = frame(&ack) {
                    self.push_rx(ack);
                }
            }
        }
        let _ = self
            .receiver
            .on_frame(payload, &mut self.dongle, &self.host_leds);
        if let Ok(message) = Message::decode(payload) {
            self.delivered.push(message);
        }
        for _ in 0..self.host_pops_per_send {
            match self.receiver.ring_mut().pop() {
                Some(0) => {}
                Some(byte) => self.typed.push(byte),
                None => break,
            }
        }
    }

    fn finish(&mut self, outcome: SendOutcome) -> SendOutcome {
        let retransmits = match outcome {
            SendOutcome::Acked => 0,
            SendOutcome::NotAcked => LOST_RETRANSMITS,
        };
        self.stats.record(retransmits, outcome);
        outcome
    }
}

impl<const N: usize> Link for SimLink<N> {
    fn start_send(&mut self, payload: &[u8]) -> Result<(), Error> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge(payload.len()));
        }
        self.polls = 0;
        let is_chunk = matches!(Message::decode(payload), Ok(Message::Text(chunk)) if !chunk.is_probe());
        if self.drop_all || self.hang {
            self.outcome = SendOutcome::NotAcked;
        } else if is_chunk && self.lose_chunk_acks > 0 {
            self.lose_chunk_acks -= 1;
            self.deliver(payload, true);
            self.outcome = SendOutcome::NotAcked;
        } else {
            self.deliver(payload, false);
            self.outcome = SendOutcome::Acked;
        }
        Ok(())
    }

    fn poll_send(&mut self) -> nb::Result<SendOutcome, Error> {
        if self.fail_poll {
            return Err(nb::Error::Other(Error::Bus));
        }
        if self.hang || self.polls < self.polls_before_done {
            self.polls += 1;
            return Err(nb::Error::WouldBlock);
        }
        Ok(self.finish(self.outcome))
    }

    fn abort_send(&mut self) -> Result<SendOutcome, Error> {
        self.aborts += 1;
        Ok(self.finish(SendOutcome::NotAcked))
    }

    fn read_ack_payload(&mut self) -> Result<Option<Frame>, Error> {
        Ok(self.rx_fifo.pop_front())
    }

    fn stats(&self) -> RadioStats {
        self.stats
    }

    fn reset_stats(&mut self) {
        self.stats = RadioStats::default();
    }

    fn output_power(&self) -> OutputPower {
        self.power
    }

    fn set_output_power(&mut self, power: OutputPower) {
        self.power = power;
    }
}

#[derive(Debug, Default)]
pub struct FakeIndicator {
    pub shown: Vec<(u8, u8)>,
    pub active: bool,
}

impl Indicator for FakeIndicator {
    fn show(&mut self, bits: u8, cycles: u8) {
        self.shown.push((bits, cycles));
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Default)]
pub struct FakeSleep {
    pub cycles: Vec<u8>,
    pub naps: Vec<u8>,
    pub busy_us: u32,
}

impl Sleep for FakeSleep {
    fn sleep_cycles(&mut self, cycles: u8) {
        self.cycles.push(cycles);
    }

    fn nap(&mut self, counts: u8) {
        self.naps.push(counts);
    }

    fn busy_wait_us(&mut self, us: u32) {
        self.busy_us += us;
    }
}

/// One-row matrix whose scans walk through a script of pressed sets.
///
/// Column `i` holds the `i`-th keycode of the current set. Once the script runs out the
/// last set stays and scans report no change.
#[derive(Debug, Default)]
pub struct FakeMatrix {
    script: VecDeque<Vec<u8>>,
    current: Vec<u8>,
}

impl FakeMatrix {
    pub fn new(script: &[&[u8]]) -> Self {
        Self {
            script: script.iter().map(|keys| keys.to_vec()).collect(),
            current: Vec::new(),
        }
    }

    /// A matrix already holding `keys`.
    pub fn pressed(keys: &[u8]) -> Self {
        Self {
            script: VecDeque::new(),
            current: keys.to_vec(),
        }
    }
}

impl KeyMatrix for FakeMatrix {
    const ROWS: usize = 1;
    const COLS: usize = 16;

    fn scan(&mut self) -> bool {
        match self.script.pop_front() {
            Some(next) => {
                let changed = next != self.current;
                self.current = next;
                changed
            }
            None => false,
        }
    }

    fn is_pressed(&self, row: usize, col: usize) -> bool {
        row == 0 && col < self.current.len()
    }

    fn keycode_for(&self, _row: usize, col: usize) -> u8 {
        self.current.get(col).copied().unwrap_or(KC_NO)
    }
}

#[derive(Debug, Default)]
pub struct FakeHid {
    pub keyboard: Vec<KeyboardReport>,
    pub media: Vec<u16>,
    pub busy: bool,
    pub idle: bool,
}

impl HidTransport for FakeHid {
    fn send_keyboard(&mut self, report: &KeyboardReport) -> bool {
        if self.busy {
            return false;
        }
        self.keyboard.push(*report);
        true
    }

    fn send_media(&mut self, report: &MediaKeyboardReport) -> bool {
        if self.busy {
            return false;
        }
        self.media.push(report.usage_id);
        true
    }

    fn idle_elapsed(&mut self) -> bool {
        self.idle
    }
}

#[derive(Debug)]
pub struct FakeSettings {
    pub power: u8,
    pub brightness: u8,
}

impl FakeSettings {
    pub fn erased() -> Self {
        Self {
            power: 0xFF,
            brightness: 0xFF,
        }
    }
}

impl Settings for FakeSettings {
    fn output_power_raw(&mut self) -> u8 {
        self.power
    }

    fn set_output_power_raw(&mut self, value: u8) {
        self.power = value;
    }

    fn led_brightness_raw(&mut self) -> u8 {
        self.brightness
    }

    fn set_led_brightness_raw(&mut self, value: u8) {
        self.brightness = value;
    }
}

#[derive(Debug)]
pub struct FakeBattery(pub u16);

impl Battery for FakeBattery {
    fn voltage_centivolts(&mut self) -> u16 {
        self.0
    }
}

/// Menu that returns scripted exits, resuming once the script is empty.
#[derive(Debug, Default)]
pub struct ScriptedMenu {
    exits: VecDeque<Result<MenuExit, Error>>,
}

impl ScriptedMenu {
    pub fn new(exits: &[Result<MenuExit, Error>]) -> Self {
        Self {
            exits: exits.iter().copied().collect(),
        }
    }
}

impl Menu for ScriptedMenu {
    fn run(&mut self, _ctx: &mut dyn MenuContext) -> Result<MenuExit, Error> {
        self.exits.pop_front().unwrap_or(Ok(MenuExit::Resume))
    }
}

/// Menu context that records output and replays keys, Esc once they run out.
#[derive(Debug)]
pub struct FakeMenuContext {
    keys: VecDeque<u8>,
    pub printed: String,
    pub battery: u16,
    pub stats: RadioStats,
    pub power: OutputPower,
    pub brightness: u8,
    pub drain_waits: usize,
    pub fail_print: bool,
}

impl FakeMenuContext {
    pub fn new(keys: &[u8]) -> Self {
        Self {
            keys: keys.iter().copied().collect(),
            printed: String::new(),
            battery: 300,
            stats: RadioStats::default(),
            power: OutputPower::default(),
            brightness: 1,
            drain_waits: 0,
            fail_print: false,
        }
    }
}

impl MenuContext for FakeMenuContext {
    fn print(&mut self, text: &str, wait_for_drain: bool) -> Result<(), Error> {
        if self.fail_print {
            return Err(Error::LinkTimeout);
        }
        self.printed.push_str(text);
        if wait_for_drain {
            self.drain_waits += 1;
        }
        Ok(())
    }

    fn read_key(&mut self) -> u8 {
        self.keys.pop_front().unwrap_or(KC_ESC)
    }

    fn battery_centivolts(&mut self) -> u16 {
        self.battery
    }

    fn stats(&self) -> RadioStats {
        self.stats
    }

    fn reset_stats(&mut self) {
        self.stats = RadioStats::default();
    }

    fn output_power(&mut self) -> OutputPower {
        self.power
    }

    fn set_output_power(&mut self, power: OutputPower) {
        self.power = power;
    }

    fn led_brightness(&mut self) -> u8 {
        self.brightness
    }

    fn set_led_brightness(&mut self, value: u8) {
        self.brightness = value;
    }
}
