//! Dongle-side frame processing and the HID report pump.
//!
//! [`Receiver::on_frame`] applies one received frame and queues the ACK payloads it
//! calls for; [`Receiver::poll`] runs one iteration of the dongle's main loop.
//!
//! ACK payload policy:
//!
//! - Every `Text` frame, probe or not, flushes the ACK FIFO and queues the current
//!   [`TextBufFree`], so the next acknowledgment always carries the freshest headroom.
//! - A host LED change is queued as `LedStatus` after the next `KeyState` frame.

use crate::consts::NO_MSG_ID;
use crate::error::Error;
use crate::feedback::HostLedState;
use crate::fmt::{debug, trace, warn};
use usbd_hid::descriptor::{KeyboardReport, MediaKeyboardReport};

use crate::hid::{self, HidTransport, KeystrokeSynth};
use crate::link::{Listener, RX_FIFO_DEPTH};
use crate::message::{LedStatus, Message, TextBufFree, TextChunk, has_msg_id};
use crate::ring::TextRingBuffer;

/// State of the dongle: text ring, pending reports and dedup memory.
#[derive(Debug)]
pub struct Receiver<const N: usize> {
    ring: TextRingBuffer<N>,
    synth: KeystrokeSynth,
    last_msg_id: u8,
    keyboard: KeyboardReport,
    keyboard_pending: bool,
    consumer: u8,
    consumer_pending: bool,
    led_pending: Option<u8>,
}

impl<const N: usize> Receiver<N> {
    /// An idle receiver with an empty ring.
    pub fn new() -> Self {
        Self {
            ring: TextRingBuffer::new(),
            synth: KeystrokeSynth::new(),
            last_msg_id: NO_MSG_ID,
            keyboard: hid::released(),
            keyboard_pending: false,
            consumer: 0,
            consumer_pending: false,
            led_pending: None,
        }
    }

    /// The text ring.
    pub fn ring(&self) -> &TextRingBuffer<N> {
        &self.ring
    }

    /// The text ring, mutably.
    pub fn ring_mut(&mut self) -> &mut TextRingBuffer<N> {
        &mut self.ring
    }

    /// The current keyboard report.
    pub fn keyboard_report(&self) -> &KeyboardReport {
        &self.keyboard
    }

    /// The current consumer bits.
    pub fn consumer_bits(&self) -> u8 {
        self.consumer
    }

    /// The current media key report.
    pub fn media_report(&self) -> MediaKeyboardReport {
        hid::media_report(self.consumer)
    }

    /// Applies one received frame.
    ///
    /// Errors only for undecodable frames and radio faults; a chunk that does not fit
    /// is dropped and reported through the headroom instead.
    pub fn on_frame<L: Listener>(
        &mut self,
        frame: &[u8],
        listener: &mut L,
        host_leds: &HostLedState,
    ) -> Result<(), Error> {
        if let Some(bits) = host_leds.take_changed() {
            self.led_pending = Some(bits);
        }
        match Message::decode(frame)? {
            Message::KeyState(state) => {
                self.keyboard = hid::keyboard_report(&state);
                self.keyboard_pending = true;
                self.consumer = state.consumer;
                self.consumer_pending = true;
                if let Some(bits) = self.led_pending.take() {
                    listener.queue_ack_payload(&Message::LedStatus(LedStatus { bits }).encode())?;
                }
            }
            Message::Text(chunk) => {
                self.accept_text(&chunk);
                listener.flush_ack_payloads()?;
                let headroom = self.ring.headroom();
                listener.queue_ack_payload(&Message::TextBufFree(headroom).encode())?;
            }
            other => debug!("ignoring frame with tag {} from keyboard", other.tag()),
        }
        Ok(())
    }

    fn accept_text(&mut self, chunk: &TextChunk) {
        if chunk.is_probe() {
            return;
        }
        if has_msg_id(chunk.msg_id) && chunk.msg_id == self.last_msg_id {
            debug!("duplicate text chunk {}", chunk.msg_id);
            return;
        }
        match self.ring.push_chunk(&chunk.bytes) {
            Ok(()) => {
                if has_msg_id(chunk.msg_id) {
                    self.last_msg_id = chunk.msg_id;
                }
                trace!("queued text chunk {} of {} bytes", chunk.msg_id, chunk.bytes.len());
            }
            Err(e) => warn!("dropping text chunk {}: {:?}", chunk.msg_id, e),
        }
    }

    /// Receives pending frames, then hands at most one report per endpoint to the host.
    pub fn poll<L: Listener, H: HidTransport>(
        &mut self,
        listener: &mut L,
        hid: &mut H,
        host_leds: &HostLedState,
    ) -> Result<(), Error> {
        for _ in 0..RX_FIFO_DEPTH {
            let Some(frame) = listener.recv()? else {
                break;
            };
            match self.on_frame(&frame, listener, host_leds) {
                Err(Error::MalformedFrame(e)) => debug!("dropping malformed frame: {:?}", e),
                other => other?,
            }
        }
        self.pump(hid);
        Ok(())
    }

    /// Moves pending reports, or the next typed keystroke, to the HID endpoints.
    pub fn pump<H: HidTransport>(&mut self, hid: &mut H) {
        if !self.keyboard_pending {
            if let Some(report) = self.synth.next_report(&mut self.ring) {
                self.keyboard = report;
                self.keyboard_pending = true;
            }
        }
        if (self.keyboard_pending || hid.idle_elapsed()) && hid.send_keyboard(&self.keyboard) {
            self.keyboard_pending = false;
        }
        if self.consumer_pending && hid.send_media(&self.media_report()) {
            self.consumer_pending = false;
        }
    }

    /// Current headroom of the text ring.
    pub fn headroom(&self) -> TextBufFree {
        self.ring.headroom()
    }
}

impl<const N: usize> Default for Receiver<N> {
    fn default() -> Self {
        Self::new()
    }
}
