//! Wire shapes of every frame exchanged between keyboard and dongle.
//!
//! Each frame starts with a one-byte tag followed by a kind-specific payload, and the
//! whole frame fits in the transceiver's 32-byte payload.
//!
//! | Tag | Kind          | Extra bytes                                   |
//! |-----|---------------|-----------------------------------------------|
//! | 1   | `KeyState`    | modifiers, consumer, 0..=6 keycodes           |
//! | 2   | `Text`        | msg id (optional), 0..=30 text bytes          |
//! | 3   | `TextBufFree` | bytes free, bytes capacity (ACK payload only) |
//! | 4   | `LedStatus`   | LED bits (ACK payload only)                   |
//!
//! A `Text` frame consisting of the tag alone is accepted as a probe without id, for
//! compatibility with senders that omit the id byte.

use heapless::Vec;

use crate::consts::{
    KEY_STATE_HEADER_LEN, MAX_KEYS, MAX_PAYLOAD_LEN, MAX_TEXT_LEN, MT_KEY_STATE, MT_LED_STATUS,
    MT_TEXT, MT_TEXT_BUFF_FREE, NO_MSG_ID, TEXT_HEADER_LEN,
};
use crate::error::FrameError;

/// A raw frame as moved by the transceiver.
pub type Frame = Vec<u8, MAX_PAYLOAD_LEN>;

/// Pressed-key snapshot sent by the keyboard whenever the pressed set changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct KeyStateReport {
    /// HID modifier bitmask (bit 0 = left control ... bit 7 = right GUI).
    pub modifiers: u8,
    /// Media key bitmask, see [`crate::hid::consumer`].
    pub consumer: u8,
    /// Non-modifier keycodes, at most [`MAX_KEYS`].
    pub keys: Vec<u8, MAX_KEYS>,
}

impl KeyStateReport {
    /// An all-keys-up report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a keycode. Keys beyond the six-key cap are dropped and `false` is returned.
    pub fn push_key(&mut self, keycode: u8) -> bool {
        self.keys.push(keycode).is_ok()
    }

    /// Whether the report has no keys, modifiers or media bits.
    pub fn is_empty(&self) -> bool {
        self.modifiers == 0 && self.consumer == 0 && self.keys.is_empty()
    }
}

/// One slice of an outbound text stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct TextChunk {
    /// Rolling id in `1..=255`, or [`NO_MSG_ID`] for a probe.
    pub msg_id: u8,
    /// Text bytes, at most [`MAX_TEXT_LEN`].
    pub bytes: Vec<u8, MAX_TEXT_LEN>,
}

impl TextChunk {
    /// An empty frame whose only purpose is to elicit a fresh headroom report.
    pub fn probe() -> Self {
        Self::default()
    }

    /// A chunk with the given id. Fails if `bytes` is longer than [`MAX_TEXT_LEN`].
    pub fn new(msg_id: u8, bytes: &[u8]) -> Result<Self, FrameError> {
        let bytes = Vec::from_slice(bytes).map_err(|_| FrameError::TooLong(bytes.len()))?;
        Ok(Self { msg_id, bytes })
    }

    /// Whether this frame is a headroom probe.
    pub fn is_probe(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Receiver text buffer headroom, returned as ACK payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct TextBufFree {
    /// Bytes currently free.
    pub bytes_free: u8,
    /// Bytes the buffer holds when empty.
    pub bytes_capacity: u8,
}

impl TextBufFree {
    /// Whether the receiver has typed out everything it was sent.
    pub fn is_drained(&self) -> bool {
        self.bytes_capacity != 0 && self.bytes_free == self.bytes_capacity
    }
}

/// Receiver indicator LED state, returned as ACK payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct LedStatus {
    /// LED bits, see [`crate::feedback`].
    pub bits: u8,
}

/// Every message kind understood by the link.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Message {
    /// Keyboard → dongle key state.
    KeyState(KeyStateReport),
    /// Keyboard → dongle text chunk or probe.
    Text(TextChunk),
    /// Dongle → keyboard text buffer headroom.
    TextBufFree(TextBufFree),
    /// Dongle → keyboard LED state.
    LedStatus(LedStatus),
}

impl Message {
    /// The tag byte of this message.
    pub fn tag(&self) -> u8 {
        match self {
            Self::KeyState(_) => MT_KEY_STATE,
            Self::Text(_) => MT_TEXT,
            Self::TextBufFree(_) => MT_TEXT_BUFF_FREE,
            Self::LedStatus(_) => MT_LED_STATUS,
        }
    }

    /// Serializes the message into a frame.
    ///
    /// Every message kind fits the payload ceiling by construction, so this cannot fail.
    pub fn encode(&self) -> Frame {
        let mut frame = Frame::new();
        // Capacities of the payload vectors keep every push below MAX_PAYLOAD_LEN.
        let _ = frame.push(self.tag());
        match self {
            Self::KeyState(report) => {
                let _ = frame.push(report.modifiers);
                let _ = frame.push(report.consumer);
                let _ = frame.extend_from_slice(&report.keys);
            }
            Self::Text(chunk) => {
                let _ = frame.push(chunk.msg_id);
                let _ = frame.extend_from_slice(&chunk.bytes);
            }
            Self::TextBufFree(state) => {
                let _ = frame.push(state.bytes_free);
                let _ = frame.push(state.bytes_capacity);
            }
            Self::LedStatus(status) => {
                let _ = frame.push(status.bits);
            }
        }
        frame
    }

    /// Parses a frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let (&tag, body) = bytes.split_first().ok_or(FrameError::Empty)?;
        if bytes.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::TooLong(bytes.len()));
        }
        let truncated = FrameError::Truncated {
            kind: tag,
            len: bytes.len(),
        };
        match tag {
            MT_KEY_STATE => {
                if bytes.len() < KEY_STATE_HEADER_LEN {
                    return Err(truncated);
                }
                let keys = Vec::from_slice(&body[2..]).map_err(|_| FrameError::TooLong(bytes.len()))?;
                Ok(Self::KeyState(KeyStateReport {
                    modifiers: body[0],
                    consumer: body[1],
                    keys,
                }))
            }
            MT_TEXT => {
                if bytes.len() < TEXT_HEADER_LEN {
                    return Ok(Self::Text(TextChunk::probe()));
                }
                Ok(Self::Text(TextChunk {
                    msg_id: body[0],
                    bytes: Vec::from_slice(&body[1..])
                        .map_err(|_| FrameError::TooLong(bytes.len()))?,
                }))
            }
            MT_TEXT_BUFF_FREE => match body {
                [bytes_free, bytes_capacity, ..] => Ok(Self::TextBufFree(TextBufFree {
                    bytes_free: *bytes_free,
                    bytes_capacity: *bytes_capacity,
                })),
                _ => Err(truncated),
            },
            MT_LED_STATUS => match body {
                [bits, ..] => Ok(Self::LedStatus(LedStatus { bits: *bits })),
                _ => Err(truncated),
            },
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

impl From<KeyStateReport> for Message {
    fn from(report: KeyStateReport) -> Self {
        Self::KeyState(report)
    }
}

impl From<TextChunk> for Message {
    fn from(chunk: TextChunk) -> Self {
        Self::Text(chunk)
    }
}

/// Whether `msg_id` marks a real chunk rather than a probe.
pub fn has_msg_id(msg_id: u8) -> bool {
    msg_id != NO_MSG_ID
}

/// The id following `msg_id`, wrapping from 255 back to 1 so that 0 is never produced.
pub fn next_msg_id(msg_id: u8) -> u8 {
    if msg_id == u8::MAX { 1 } else { msg_id + 1 }
}
