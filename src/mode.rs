//! Top-level loop of the keyboard: normal typing, the menu, and the locked state.
//!
//! ```text
//!            Fn+Esc                 Esc
//!  Normal ──────────────► Menu ─────────────► Normal
//!    │                     │ F3 / dead link
//!    │ Fn+L                ▼
//!    └──────────────────► Locked ──Fn+Ctrl+Del──► Normal
//! ```
//!
//! Chords fire once every key has been released, so the host never sees half of one.

use core::convert::Infallible;

use crate::consts::KEY_STATE_SEND_ATTEMPTS;
use crate::driver::OutputPower;
use crate::error::Error;
use crate::feedback::Indicator;
use crate::fmt::{debug, error, info};
use crate::hid::consumer;
use crate::keycode::{
    KC_DEL, KC_ESC, KC_F1, KC_F2, KC_F3, KC_F4, KC_F5, KC_F6, KC_FN, KC_KP_DOT, KC_KP_MINUS,
    KC_KP_PLUS, KC_L, KC_LCTRL, KC_NO, KC_RCTRL, is_modifier, modifier_bit,
};
use crate::link::{Link, RadioStats, SendOutcome, Transmitter};
use crate::menu::{Battery, Menu, MenuContext, MenuExit};
use crate::message::{KeyStateReport, Message};
use crate::settings::Settings;
use crate::text::{TextConfig, TextSender};
use crate::timer::{
    LONG_SLEEP_CYCLES, Sleep, SleepScheduler, wait_for_all_keys_up,
    wait_for_key_down, wait_for_matrix_change,
};

/// Media keys of the Fn layer.
const FN_MEDIA_KEYS: [(u8, u8); 6] = [
    (KC_F1, consumer::MUTE),
    (KC_F2, consumer::VOLUME_DOWN),
    (KC_F3, consumer::VOLUME_UP),
    (KC_F4, consumer::PLAY_PAUSE),
    (KC_F5, consumer::PREV_TRACK),
    (KC_F6, consumer::NEXT_TRACK),
];

/// Long dozes between scans while locked.
const LOCKED_DOZES: usize = 3;

/// The switch matrix, scanned outside this crate.
pub trait KeyMatrix {
    /// Number of rows.
    const ROWS: usize;
    /// Number of columns.
    const COLS: usize;

    /// Scans the switches. Returns `true` if the pressed set changed since the last scan.
    fn scan(&mut self) -> bool;

    /// Whether the switch at `row`, `col` was down at the last scan.
    fn is_pressed(&self, row: usize, col: usize) -> bool;

    /// Keycode assigned to the switch at `row`, `col`.
    fn keycode_for(&self, row: usize, col: usize) -> u8;

    /// Keycodes of every pressed switch, in scan order.
    fn pressed_keycodes(&self) -> impl Iterator<Item = u8> {
        (0..Self::ROWS).flat_map(move |row| {
            (0..Self::COLS)
                .filter(move |&col| self.is_pressed(row, col))
                .map(move |col| self.keycode_for(row, col))
        })
    }

    /// Whether any switch is down.
    fn any_pressed(&self) -> bool {
        self.pressed_keycodes().next().is_some()
    }

    /// Number of switches down.
    fn pressed_count(&self) -> usize {
        self.pressed_keycodes().count()
    }

    /// Whether a switch with `keycode` is down.
    fn is_keycode_pressed(&self, keycode: u8) -> bool {
        self.pressed_keycodes().any(|k| k == keycode)
    }
}

/// What the keyboard is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Mode {
    /// Reporting keys to the host.
    Normal,
    /// Running the menu.
    Menu,
    /// Ignoring everything but the unlock chord.
    Locked,
}

/// Fn chords recognized in normal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Chord {
    /// Fn+Esc.
    EnterMenu,
    /// Fn+L.
    Lock,
    /// Fn+keypad minus.
    PowerDown,
    /// Fn+keypad plus.
    PowerUp,
}

/// Builds the key-state report of the current scan.
///
/// With Fn held only the media bits are reported. Otherwise modifiers become bits and
/// the first six other keys, in scan order, become keycodes.
pub fn key_state<M: KeyMatrix>(matrix: &M) -> KeyStateReport {
    let mut report = KeyStateReport::new();
    if matrix.is_keycode_pressed(KC_FN) {
        for (keycode, bit) in FN_MEDIA_KEYS {
            if matrix.is_keycode_pressed(keycode) {
                report.consumer |= bit;
            }
        }
        return report;
    }
    for keycode in matrix.pressed_keycodes() {
        if is_modifier(keycode) {
            report.modifiers |= modifier_bit(keycode);
        } else if keycode != KC_NO {
            let _ = report.push_key(keycode);
        }
    }
    report
}

/// The chord held right now: Fn plus exactly one other key.
pub fn chord<M: KeyMatrix>(matrix: &M) -> Option<Chord> {
    if matrix.pressed_count() != 2 || !matrix.is_keycode_pressed(KC_FN) {
        return None;
    }
    match matrix.pressed_keycodes().find(|&k| k != KC_FN)? {
        KC_ESC => Some(Chord::EnterMenu),
        KC_L => Some(Chord::Lock),
        KC_KP_MINUS => Some(Chord::PowerDown),
        KC_KP_PLUS => Some(Chord::PowerUp),
        _ => None,
    }
}

/// Whether exactly Fn + Ctrl + Del (either Ctrl, Del or keypad dot) is held.
pub fn is_unlock_chord<M: KeyMatrix>(matrix: &M) -> bool {
    matrix.pressed_count() == 3
        && matrix.is_keycode_pressed(KC_FN)
        && (matrix.is_keycode_pressed(KC_LCTRL) || matrix.is_keycode_pressed(KC_RCTRL))
        && (matrix.is_keycode_pressed(KC_DEL) || matrix.is_keycode_pressed(KC_KP_DOT))
}

/// Waits for one key to be pressed and released and returns its keycode.
pub fn read_key<M: KeyMatrix, S: Sleep>(
    scheduler: &mut SleepScheduler,
    matrix: &mut M,
    sleep: &mut S,
) -> u8 {
    wait_for_all_keys_up(scheduler, matrix, sleep);
    wait_for_key_down(scheduler, matrix, sleep);
    let keycode = matrix.pressed_keycodes().last().unwrap_or(KC_NO);
    wait_for_all_keys_up(scheduler, matrix, sleep);
    keycode
}

/// Owns the keyboard's collaborators and switches between modes.
#[derive(Debug)]
pub struct Coordinator<L, I, S, M, ST> {
    tx: Transmitter<L, I, S>,
    matrix: M,
    settings: ST,
    scheduler: SleepScheduler,
    text: TextSender,
    mode: Mode,
}

impl<L, I, S, M, ST> Coordinator<L, I, S, M, ST>
where
    L: Link,
    I: Indicator,
    S: Sleep,
    M: KeyMatrix,
    ST: Settings,
{
    /// Starts in normal mode with the persisted output power applied.
    pub fn new(
        mut tx: Transmitter<L, I, S>,
        matrix: M,
        mut settings: ST,
        scheduler: SleepScheduler,
        text_config: TextConfig,
    ) -> Self {
        tx.link_mut().set_output_power(settings.output_power());
        Self {
            tx,
            matrix,
            settings,
            scheduler,
            text: TextSender::new(text_config),
            mode: Mode::Normal,
        }
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Forces a mode, e.g. to start locked.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// The transmitter.
    pub fn transmitter(&mut self) -> &mut Transmitter<L, I, S> {
        &mut self.tx
    }

    /// The persisted settings.
    pub fn settings(&mut self) -> &mut ST {
        &mut self.settings
    }

    /// The text channel, for firmware messages outside the menu.
    pub fn text_sender(&mut self) -> &mut TextSender {
        &mut self.text
    }

    /// Runs forever. Returns only on a transceiver fault.
    pub fn run<MN: Menu, B: Battery>(
        &mut self,
        menu: &mut MN,
        battery: &mut B,
    ) -> Result<Infallible, Error> {
        loop {
            let _ = self.step(menu, battery)?;
        }
    }

    /// Runs the current mode until it hands over, and returns the next mode.
    pub fn step<MN: Menu, B: Battery>(
        &mut self,
        menu: &mut MN,
        battery: &mut B,
    ) -> Result<Mode, Error> {
        let next = match self.mode {
            Mode::Normal => self.run_normal()?,
            Mode::Menu => self.run_menu(menu, battery),
            Mode::Locked => self.run_locked(),
        };
        info!("mode {:?} -> {:?}", self.mode, next);
        self.mode = next;
        Ok(next)
    }

    fn run_normal(&mut self) -> Result<Mode, Error> {
        let mut pending_chord = None;
        loop {
            wait_for_matrix_change(&mut self.scheduler, &mut self.matrix, self.tx.sleep_mut());

            let report = key_state(&self.matrix);
            if let Some(held) = chord(&self.matrix) {
                pending_chord = Some(held);
            }
            let frame = Message::from(report).encode();
            let outcome = self.tx.send_with_retries(&frame, KEY_STATE_SEND_ATTEMPTS)?;
            if outcome == SendOutcome::NotAcked {
                debug!("key state dropped after {} attempts", KEY_STATE_SEND_ATTEMPTS);
            }
            let _ = self.tx.drain_ack_payloads()?;

            if self.matrix.any_pressed() {
                continue;
            }
            match pending_chord.take() {
                Some(Chord::EnterMenu) => return Ok(Mode::Menu),
                Some(Chord::Lock) => return Ok(Mode::Locked),
                Some(Chord::PowerDown) => self.change_output_power(OutputPower::step_down),
                Some(Chord::PowerUp) => self.change_output_power(OutputPower::step_up),
                None => {}
            }
        }
    }

    fn change_output_power(&mut self, step: fn(OutputPower) -> OutputPower) {
        let power = step(self.settings.output_power());
        self.settings.set_output_power(power);
        self.tx.link_mut().set_output_power(power);
        info!("output power now {} dBm", power.dbm());
    }

    fn run_menu<MN: Menu, B: Battery>(&mut self, menu: &mut MN, battery: &mut B) -> Mode {
        let mut ctx = KeyboardMenuContext {
            tx: &mut self.tx,
            text: &mut self.text,
            matrix: &mut self.matrix,
            scheduler: &mut self.scheduler,
            settings: &mut self.settings,
            battery,
        };
        match menu.run(&mut ctx) {
            Ok(MenuExit::Resume) => Mode::Normal,
            Ok(MenuExit::Lock) => Mode::Locked,
            Err(e) => {
                error!("menu aborted: {:?}", e);
                Mode::Locked
            }
        }
    }

    fn run_locked(&mut self) -> Mode {
        loop {
            for _ in 0..LOCKED_DOZES {
                self.tx.sleep_mut().sleep_cycles(LONG_SLEEP_CYCLES);
            }
            if self.matrix.scan() && is_unlock_chord(&self.matrix) {
                return Mode::Normal;
            }
        }
    }
}

/// [`MenuContext`] backed by the keyboard's own collaborators.
struct KeyboardMenuContext<'a, L, I, S, M, ST, B> {
    tx: &'a mut Transmitter<L, I, S>,
    text: &'a mut TextSender,
    matrix: &'a mut M,
    scheduler: &'a mut SleepScheduler,
    settings: &'a mut ST,
    battery: &'a mut B,
}

impl<L, I, S, M, ST, B> MenuContext for KeyboardMenuContext<'_, L, I, S, M, ST, B>
where
    L: Link,
    I: Indicator,
    S: Sleep,
    M: KeyMatrix,
    ST: Settings,
    B: Battery,
{
    fn print(&mut self, text: &str, wait_for_drain: bool) -> Result<(), Error> {
        self.text.send_str(self.tx, text, wait_for_drain)
    }

    fn read_key(&mut self) -> u8 {
        read_key(self.scheduler, self.matrix, self.tx.sleep_mut())
    }

    fn battery_centivolts(&mut self) -> u16 {
        self.battery.voltage_centivolts()
    }

    fn stats(&self) -> RadioStats {
        self.tx.link().stats()
    }

    fn reset_stats(&mut self) {
        self.tx.link_mut().reset_stats();
    }

    fn output_power(&mut self) -> OutputPower {
        self.settings.output_power()
    }

    fn set_output_power(&mut self, power: OutputPower) {
        self.settings.set_output_power(power);
        self.tx.link_mut().set_output_power(power);
    }

    fn led_brightness(&mut self) -> u8 {
        self.settings.led_brightness()
    }

    fn set_led_brightness(&mut self, value: u8) {
        self.settings.set_led_brightness(value);
    }
}
