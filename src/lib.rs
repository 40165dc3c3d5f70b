//! # kbdlink
//!
//! A portable, no_std link layer for a two-node wireless keyboard built on nRF24L01+
//! transceivers: a battery-powered keyboard (primary transmitter) and a USB dongle
//! (primary receiver) that presents itself to the host as a HID keyboard.
//!
//! The keyboard only ever talks when something changes. Everything flowing back to it
//! rides on acknowledgment payloads:
//! - key-state snapshots go keyboard → dongle and become HID reports
//! - a text channel lets the keyboard "type" firmware output on the host, paced by the
//!   dongle's ring buffer headroom
//! - host lock-LED changes come back to the keyboard and light its indicator
//!
//! ## Crate features
//! | Feature                | Description |
//! |------------------------|-------------|
//! | `std`                  | Builds with `std` instead of `#![no_std]` |
//! | `delay-loop` (default) | Provides [`timer::DelayTimer`], a [`timer::Sleep`] backend over `embedded_hal::delay::DelayNs` |
//! | `defmt-0-3`            | Uses `defmt` logging |
//! | `log`                  | Uses `log` logging |
//!
//! ## Layout
//!
//! - [`message`]: frame kinds and their byte layout
//! - [`driver`]: the nRF24L01+ over `embedded-hal` SPI
//! - [`link`]: acknowledged sends and ACK payload draining
//! - [`text`] / [`ring`] / [`hid`]: both ends of the text channel
//! - [`receiver`]: the dongle's frame handling and HID pump
//! - [`timer`]: sleep primitives and the polling back-off
//! - [`mode`] / [`menu`]: the keyboard's top-level loop
//!
//! ## Usage
//!
//! ```rust
//! use kbdlink::message::{KeyStateReport, Message};
//!
//! let mut state = KeyStateReport::new();
//! assert!(state.push_key(0x04));
//! let frame = Message::from(state).encode();
//! assert_eq!(&frame[..], &[1, 0, 0, 0x04]);
//! assert!(matches!(Message::decode(&frame), Ok(Message::KeyState(_))));
//! ```
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

pub use critical_section;
pub use heapless;

mod fmt;

pub mod consts;
pub mod driver;
pub mod error;
pub mod feedback;
pub mod hid;
pub mod keycode;
pub mod link;
pub mod menu;
pub mod message;
pub mod mode;
pub mod receiver;
pub mod ring;
pub mod settings;
pub mod text;
pub mod timer;

#[cfg(test)]
mod mock;
