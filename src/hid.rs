//! HID reports handed to the dongle's USB stack, and the keystroke synthesizer that
//! types out the text ring.
//!
//! Reports are the `usbd-hid` boot keyboard and media key reports, so the USB side can
//! push them with their stock descriptors.

use usbd_hid::descriptor::{KeyboardReport, MediaKey, MediaKeyboardReport};

use crate::consts::MAX_KEYS;
use crate::keycode::{KC_NO, keycode_for_char};
use crate::message::KeyStateReport;
use crate::ring::TextRingBuffer;

/// Bits of the one-byte consumer field of a key-state frame.
pub mod consumer {
    /// Mute.
    pub const MUTE: u8 = 1 << 0;
    /// Volume down.
    pub const VOLUME_DOWN: u8 = 1 << 1;
    /// Volume up.
    pub const VOLUME_UP: u8 = 1 << 2;
    /// Play / pause.
    pub const PLAY_PAUSE: u8 = 1 << 3;
    /// Previous track.
    pub const PREV_TRACK: u8 = 1 << 4;
    /// Next track.
    pub const NEXT_TRACK: u8 = 1 << 5;
}

const MEDIA_USAGES: [(u8, u16); 6] = [
    (consumer::MUTE, MediaKey::Mute as u16),
    (consumer::VOLUME_DOWN, MediaKey::VolumeDecrement as u16),
    (consumer::VOLUME_UP, MediaKey::VolumeIncrement as u16),
    (consumer::PLAY_PAUSE, MediaKey::PlayPause as u16),
    (consumer::PREV_TRACK, MediaKey::PrevTrack as u16),
    (consumer::NEXT_TRACK, MediaKey::NextTrack as u16),
];

/// All keys up.
pub const fn released() -> KeyboardReport {
    KeyboardReport {
        modifier: 0,
        reserved: 0,
        leds: 0,
        keycodes: [KC_NO; MAX_KEYS],
    }
}

/// Exactly one key, with modifiers.
pub fn keystroke(keycode: u8, modifiers: u8) -> KeyboardReport {
    let mut report = released();
    report.modifier = modifiers;
    report.keycodes[0] = keycode;
    report
}

/// The keyboard part of a received key-state frame.
pub fn keyboard_report(state: &KeyStateReport) -> KeyboardReport {
    let mut report = released();
    report.modifier = state.modifiers;
    report.keycodes[..state.keys.len()].copy_from_slice(&state.keys);
    report
}

/// Whether no key or modifier is down.
pub fn is_released(report: &KeyboardReport) -> bool {
    report.modifier == 0 && report.keycodes.iter().all(|&k| k == KC_NO)
}

/// The media report for a consumer bitmask.
///
/// The report carries one usage, so the lowest set bit wins. No bit means no key.
pub fn media_report(bits: u8) -> MediaKeyboardReport {
    let usage_id = MEDIA_USAGES
        .iter()
        .find(|(bit, _)| bits & bit != 0)
        .map_or(MediaKey::Zero as u16, |&(_, usage)| usage);
    MediaKeyboardReport { usage_id }
}

/// The dongle's USB HID endpoints.
pub trait HidTransport {
    /// Queues a keyboard report. Returns `false` if the endpoint is still busy.
    fn send_keyboard(&mut self, report: &KeyboardReport) -> bool;

    /// Queues a media key report. Returns `false` if the endpoint is still busy.
    fn send_media(&mut self, report: &MediaKeyboardReport) -> bool;

    /// Whether the host's idle rate demands a repeat of the current report.
    fn idle_elapsed(&mut self) -> bool;
}

/// Turns queued text into one-key reports.
///
/// Two identical keycodes in a row get an all-keys-up report in between, so the host
/// sees a release before the second press.
#[derive(Debug, Clone, Default)]
pub struct KeystrokeSynth {
    prev_keycode: u8,
}

impl KeystrokeSynth {
    /// A synthesizer that has emitted nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The next report to type, or `None` when the ring is empty.
    pub fn next_report<const N: usize>(
        &mut self,
        ring: &mut TextRingBuffer<N>,
    ) -> Option<KeyboardReport> {
        let (keycode, modifiers) = keycode_for_char(ring.peek()?);
        if keycode != KC_NO && keycode == self.prev_keycode {
            self.prev_keycode = KC_NO;
            return Some(released());
        }
        let _ = ring.pop();
        self.prev_keycode = keycode;
        Some(keystroke(keycode, modifiers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::{KC_A, KC_L, MOD_LSHIFT};

    fn typed<const N: usize>(ring: &mut TextRingBuffer<N>) -> Vec<KeyboardReport> {
        let mut synth = KeystrokeSynth::new();
        core::iter::from_fn(|| synth.next_report(ring)).collect()
    }

    #[test]
    fn test_repeated_character_gets_release() {
        let mut ring = TextRingBuffer::<16>::new();
        ring.push_chunk(b"ll").unwrap();
        let reports = typed(&mut ring);
        assert_eq!(
            reports,
            vec![keystroke(KC_L, 0), released(), keystroke(KC_L, 0), released()]
        );
    }

    #[test]
    fn test_case_change_of_same_key_gets_release() {
        let mut ring = TextRingBuffer::<16>::new();
        ring.push_chunk(b"aA").unwrap();
        let reports = typed(&mut ring);
        assert_eq!(reports[0], keystroke(KC_A, 0));
        assert!(is_released(&reports[1]));
        assert_eq!(reports[2], keystroke(KC_A, MOD_LSHIFT));
    }

    #[test]
    fn test_never_two_identical_key_reports_in_a_row() {
        let mut ring = TextRingBuffer::<64>::new();
        ring.push_chunk(b"aaa bb\n\nxyz").unwrap();
        let reports = typed(&mut ring);
        for pair in reports.windows(2) {
            assert!(is_released(&pair[0]) || pair[0] != pair[1]);
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_keyboard_report_from_key_state() {
        let mut state = KeyStateReport::new();
        state.modifiers = 0x22;
        let _ = state.push_key(0x04);
        let _ = state.push_key(0x05);
        let report = keyboard_report(&state);
        assert_eq!(report.modifier, 0x22);
        assert_eq!(report.keycodes, [0x04, 0x05, 0, 0, 0, 0]);
        assert_eq!(report.leds, 0);
    }

    #[test]
    fn test_media_usages() {
        assert_eq!({ media_report(0).usage_id }, 0);
        assert_eq!({ media_report(consumer::MUTE).usage_id }, 0xE2);
        assert_eq!({ media_report(consumer::VOLUME_UP).usage_id }, 0xE9);
        assert_eq!({ media_report(consumer::VOLUME_DOWN).usage_id }, 0xEA);
        assert_eq!({ media_report(consumer::NEXT_TRACK).usage_id }, 0xB5);
        assert_eq!(
            { media_report(consumer::PLAY_PAUSE | consumer::NEXT_TRACK).usage_id },
            MediaKey::PlayPause as u16
        );
    }
}
