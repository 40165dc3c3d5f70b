//! Constants used across the keyboard link protocol.
//!
//! This module defines the protocol-wide constants used for frame sizing,
//! message tags, radio addressing and the timing of the retransmit machinery.
//!
//! ## Key Concepts
//!
//! - **Payload ceiling**: the transceiver moves at most 32 bytes per frame, ACK payloads included.
//! - **Tags**: byte 0 of every frame selects the message kind.
//! - **Text chunks**: a tag byte and a message id byte leave 30 bytes for text.
//! - **Retransmits**: the hardware retries 15 times, 250 µs apart, before giving up.
//!
//! These values should be used wherever framing or buffer logic is implemented so both
//! nodes agree on message boundaries.

/// Largest frame the transceiver can carry, in bytes.
pub const MAX_PAYLOAD_LEN: usize = 32;

/// Maximum number of non-modifier keycodes in one key-state report.
pub const MAX_KEYS: usize = 6;

/// Bytes in front of the keycodes of a key-state frame: tag, modifiers, consumer.
pub const KEY_STATE_HEADER_LEN: usize = 3;

/// Bytes in front of the text of a text frame: tag and message id.
pub const TEXT_HEADER_LEN: usize = 2;

/// Maximum number of text bytes carried by one text frame.
pub const MAX_TEXT_LEN: usize = MAX_PAYLOAD_LEN - TEXT_HEADER_LEN;

/// Tag of a key-state report.
pub const MT_KEY_STATE: u8 = 1;

/// Tag of a text chunk (or an empty headroom probe).
pub const MT_TEXT: u8 = 2;

/// Tag of the receiver's text buffer headroom, sent only as ACK payload.
pub const MT_TEXT_BUFF_FREE: u8 = 3;

/// Tag of the receiver's indicator LED state, sent only as ACK payload.
pub const MT_LED_STATUS: u8 = 4;

/// Message id carried by probes; never assigned to a real chunk.
pub const NO_MSG_ID: u8 = 0;

/// Address of the dongle. The keyboard transmits to it and listens for ACKs on it.
pub const DONGLE_ADDRESS: [u8; 5] = [0x36, 0xC4, 0x31, 0x40, 0x03];

/// RF channel both nodes are tuned to (2402 MHz).
pub const RF_CHANNEL: u8 = 2;

/// Hardware retransmit attempts before a frame is declared lost.
pub const AUTO_RETRANSMIT_COUNT: u8 = 15;

/// Delay between hardware retransmit attempts, in microseconds.
pub const AUTO_RETRANSMIT_DELAY_US: u32 = 250;

/// Upper bound on the on-air time of one attempt at 2 Mbps, ACK included, in microseconds.
pub const ATTEMPT_AIRTIME_US: u32 = 200;

/// Longest a single send may keep the application waiting, in microseconds.
///
/// Every attempt the hardware can make fits into this budget; once it is spent the
/// transaction is torn down and reported as not acknowledged.
pub const SEND_WAIT_BUDGET_US: u32 =
    (AUTO_RETRANSMIT_COUNT as u32 + 1) * (AUTO_RETRANSMIT_DELAY_US + ATTEMPT_AIRTIME_US) * 2;

/// Number of wake-up timer cycles a received LED status stays visible on the keyboard.
pub const LED_FEEDBACK_CYCLES: u8 = 25;

/// Attempts made for one key-state report before it is given up on.
pub const KEY_STATE_SEND_ATTEMPTS: u8 = 10;
