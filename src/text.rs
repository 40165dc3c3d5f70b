//! Keyboard side of the text channel.
//!
//! Text is cut into chunks that travel as `Text` frames. Before every chunk the sender
//! probes the dongle's headroom with an empty `Text` frame, because the ACK payload of a
//! frame always describes the dongle's state *before* that frame arrived: the headroom
//! learned from a chunk's own acknowledgment is one frame stale.
//!
//! Each chunk carries a rolling message id so that a chunk whose acknowledgment got lost
//! can be sent again without being typed twice.

use crate::consts::MAX_TEXT_LEN;
use crate::error::Error;
use crate::feedback::Indicator;
use crate::fmt::{debug, warn};
use crate::link::{Link, SendOutcome, Transmitter};
use crate::message::{Message, TextBufFree, TextChunk, next_msg_id};
use crate::timer::Sleep;

/// Tuning of the text channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct TextConfig {
    /// Bytes per chunk, at most [`MAX_TEXT_LEN`].
    pub chunk_len: usize,
    /// Probes per chunk before giving up.
    pub max_probes: u16,
    /// Sleep cycles between probes that found too little headroom.
    pub probe_sleep_cycles: u8,
    /// Sends per chunk before giving up.
    pub chunk_attempts: u8,
    /// Probes spent waiting for the dongle to type everything out.
    pub max_drain_probes: u16,
}

impl TextConfig {
    /// Checks that the channel can make progress.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.chunk_len == 0 || self.chunk_len > MAX_TEXT_LEN {
            return Err("chunk_len must be between 1 and MAX_TEXT_LEN");
        }
        if self.max_probes == 0 || self.chunk_attempts == 0 {
            return Err("max_probes and chunk_attempts must be at least 1");
        }
        Ok(())
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            chunk_len: MAX_TEXT_LEN,
            max_probes: 200,
            probe_sleep_cycles: 40,
            chunk_attempts: 10,
            max_drain_probes: 1_000,
        }
    }
}

/// Chunks and paces outbound text.
#[derive(Debug, Clone)]
pub struct TextSender {
    config: TextConfig,
    msg_id: u8,
}

impl TextSender {
    /// A sender whose first chunk gets id 1.
    pub fn new(config: TextConfig) -> Self {
        Self { config, msg_id: 0 }
    }

    /// The configuration in use.
    pub fn config(&self) -> &TextConfig {
        &self.config
    }

    /// Id of the last chunk sent, 0 before the first.
    pub fn last_msg_id(&self) -> u8 {
        self.msg_id
    }

    /// Sends `text`, optionally waiting until the dongle has typed all of it.
    ///
    /// Chunks shrink to fit a receiver whose buffer is smaller than the configured chunk
    /// length. Fails with [`Error::LinkTimeout`] when the dongle stops acknowledging, with
    /// [`Error::ProbeExhausted`] when it never reports enough headroom and with
    /// [`Error::ReceiverTooSmall`] when its buffer cannot take even a one-byte chunk.
    pub fn send_text<L, I, S>(
        &mut self,
        tx: &mut Transmitter<L, I, S>,
        text: &[u8],
        wait_for_drain: bool,
    ) -> Result<(), Error>
    where
        L: Link,
        I: Indicator,
        S: Sleep,
    {
        let chunk_len = self.config.chunk_len.clamp(1, MAX_TEXT_LEN);
        let mut rest = text;
        while !rest.is_empty() {
            // whatever arrived so far predates the last chunk
            let _ = tx.drain_ack_payloads()?;
            let len = self.wait_for_headroom(tx, rest.len().min(chunk_len))?;
            let (bytes, tail) = rest.split_at(len);
            self.msg_id = next_msg_id(self.msg_id);
            self.send_chunk(tx, bytes)?;
            rest = tail;
        }
        if wait_for_drain {
            self.wait_for_drain(tx)?;
        }
        Ok(())
    }

    /// Sends `text` as UTF-8 bytes.
    pub fn send_str<L, I, S>(
        &mut self,
        tx: &mut Transmitter<L, I, S>,
        text: &str,
        wait_for_drain: bool,
    ) -> Result<(), Error>
    where
        L: Link,
        I: Indicator,
        S: Sleep,
    {
        self.send_text(tx, text.as_bytes(), wait_for_drain)
    }

    /// Sends one empty `Text` frame and returns the headroom its acknowledgment carried.
    fn probe<L, I, S>(tx: &mut Transmitter<L, I, S>) -> Result<Option<TextBufFree>, Error>
    where
        L: Link,
        I: Indicator,
        S: Sleep,
    {
        if tx.send_message(&Message::Text(TextChunk::probe()))? == SendOutcome::NotAcked {
            warn!("headroom probe not acknowledged");
            return Err(Error::LinkTimeout);
        }
        Ok(tx.drain_ack_payloads()?.buf_state)
    }

    /// Probes until a chunk of at most `want` bytes fits, and returns its length.
    fn wait_for_headroom<L, I, S>(
        &self,
        tx: &mut Transmitter<L, I, S>,
        want: usize,
    ) -> Result<usize, Error>
    where
        L: Link,
        I: Indicator,
        S: Sleep,
    {
        for _ in 0..self.config.max_probes {
            if let Some(state) = Self::probe(tx)? {
                // chunk, terminator and one spare byte
                let largest = usize::from(state.bytes_capacity).saturating_sub(2);
                if largest == 0 {
                    warn!("receiver buffer of {} bytes takes no chunk", state.bytes_capacity);
                    return Err(Error::ReceiverTooSmall {
                        capacity: state.bytes_capacity,
                    });
                }
                let len = want.min(largest);
                if usize::from(state.bytes_free) > len + 1 {
                    return Ok(len);
                }
            }
            tx.sleep_mut().sleep_cycles(self.config.probe_sleep_cycles);
        }
        warn!("no headroom for {} bytes after {} probes", want, self.config.max_probes);
        Err(Error::ProbeExhausted {
            attempts: self.config.max_probes,
        })
    }

    fn send_chunk<L, I, S>(&self, tx: &mut Transmitter<L, I, S>, bytes: &[u8]) -> Result<(), Error>
    where
        L: Link,
        I: Indicator,
        S: Sleep,
    {
        let chunk = TextChunk::new(self.msg_id, bytes)?;
        let frame = Message::Text(chunk).encode();
        if tx.send_with_retries(&frame, self.config.chunk_attempts)? == SendOutcome::Acked {
            debug!("text chunk {} sent", self.msg_id);
            return Ok(());
        }
        warn!(
            "text chunk {} lost after {} attempts",
            self.msg_id, self.config.chunk_attempts
        );
        Err(Error::LinkTimeout)
    }

    fn wait_for_drain<L, I, S>(&self, tx: &mut Transmitter<L, I, S>) -> Result<(), Error>
    where
        L: Link,
        I: Indicator,
        S: Sleep,
    {
        for _ in 0..self.config.max_drain_probes {
            if Self::probe(tx)?.is_some_and(|state| state.is_drained()) {
                return Ok(());
            }
            tx.sleep_mut().sleep_cycles(self.config.probe_sleep_cycles);
        }
        warn!("dongle still typing after {} probes", self.config.max_drain_probes);
        Err(Error::ProbeExhausted {
            attempts: self.config.max_drain_probes,
        })
    }
}

impl Default for TextSender {
    fn default() -> Self {
        Self::new(TextConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FakeIndicator, FakeSleep, SimLink};

    type Tx<const N: usize> = Transmitter<SimLink<N>, FakeIndicator, FakeSleep>;

    fn transmitter<const N: usize>(host_pops_per_send: usize) -> Tx<N> {
        let mut link = SimLink::new();
        link.host_pops_per_send = host_pops_per_send;
        Transmitter::new(link, FakeIndicator::default(), FakeSleep::default())
    }

    fn chunks<const N: usize>(tx: &Tx<N>) -> Vec<(u8, usize)> {
        tx.link()
            .delivered
            .iter()
            .filter_map(|message| match message {
                Message::Text(chunk) if !chunk.is_probe() => Some((chunk.msg_id, chunk.bytes.len())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_45_bytes_in_chunks_of_20() {
        let mut tx = transmitter::<33>(3);
        let mut sender = TextSender::new(TextConfig {
            chunk_len: 20,
            ..TextConfig::default()
        });
        let text: Vec<u8> = (0..45u8).map(|i| b'a' + i % 26).collect();

        sender.send_text(&mut tx, &text, true).unwrap();

        assert_eq!(chunks(&tx), vec![(1, 20), (2, 20), (3, 5)]);
        assert_eq!(tx.link().typed, text);

        // the second chunk had to wait for the first one to be typed out
        let delivered = &tx.link().delivered;
        let first = delivered
            .iter()
            .position(|m| matches!(m, Message::Text(c) if c.msg_id == 1))
            .unwrap();
        let second = delivered
            .iter()
            .position(|m| matches!(m, Message::Text(c) if c.msg_id == 2))
            .unwrap();
        assert!(second - first > 2);
        assert!(!tx.sleep_mut().cycles.is_empty());
    }

    #[test]
    fn test_long_stream_round_trips() {
        let mut tx = transmitter::<33>(8);
        let mut sender = TextSender::default();
        let text: Vec<u8> = (0..3_000u32).map(|i| b' ' + (i % 90) as u8).collect();

        sender.send_text(&mut tx, &text, true).unwrap();

        assert_eq!(tx.link().typed, text);
        assert_eq!(sender.last_msg_id(), 100);
    }

    #[test]
    fn test_msg_id_rolls_over_skipping_zero() {
        let mut tx = transmitter::<33>(32);
        let mut sender = TextSender::new(TextConfig {
            chunk_len: 1,
            ..TextConfig::default()
        });
        let text = vec![b'x'; 300];

        sender.send_text(&mut tx, &text, false).unwrap();

        let ids: Vec<u8> = chunks(&tx).iter().map(|&(id, _)| id).collect();
        assert_eq!(ids[254], 255);
        assert_eq!(ids[255], 1);
        assert!(!ids.contains(&0));
    }

    #[test]
    fn test_persistent_loss_fails_fast() {
        let mut tx = transmitter::<33>(3);
        tx.link_mut().drop_all = true;
        let mut sender = TextSender::default();

        assert_eq!(sender.send_text(&mut tx, b"hello", true), Err(Error::LinkTimeout));
        assert_eq!(tx.link().stats().packets, 1);
    }

    #[test]
    fn test_stuck_receiver_exhausts_probes() {
        let mut tx = transmitter::<33>(0);
        let mut sender = TextSender::new(TextConfig {
            chunk_len: 20,
            max_probes: 5,
            ..TextConfig::default()
        });

        let result = sender.send_text(&mut tx, &[b'z'; 40], false);

        assert_eq!(result, Err(Error::ProbeExhausted { attempts: 5 }));
        assert_eq!(chunks(&tx), vec![(1, 20)]);
        // one sleep before the very first headroom report, five for the second chunk
        assert_eq!(tx.sleep_mut().cycles, vec![40; 6]);
    }

    #[test]
    fn test_drain_wait_gives_up() {
        let mut tx = transmitter::<33>(0);
        let mut sender = TextSender::new(TextConfig {
            max_drain_probes: 3,
            ..TextConfig::default()
        });

        let result = sender.send_text(&mut tx, b"hi", true);

        assert_eq!(result, Err(Error::ProbeExhausted { attempts: 3 }));
        assert_eq!(tx.link().receiver.ring().len(), 3);
    }

    #[test]
    fn test_chunks_shrink_to_small_receiver() {
        let mut tx = transmitter::<32>(32);
        let mut sender = TextSender::default();
        let text = [b'x'; 30];

        sender.send_text(&mut tx, &text, true).unwrap();

        // 31 byte ring: 29 bytes, the terminator and one spare
        assert_eq!(chunks(&tx), vec![(1, 29), (2, 1)]);
        assert_eq!(tx.link().typed, text);
    }

    #[test]
    fn test_tiny_receiver_is_reported() {
        let mut tx = transmitter::<3>(3);
        let mut sender = TextSender::default();

        let result = sender.send_text(&mut tx, b"hi", false);

        assert_eq!(result, Err(Error::ReceiverTooSmall { capacity: 2 }));
        assert!(chunks(&tx).is_empty());
    }

    #[test]
    fn test_chunk_with_lost_ack_is_typed_once() {
        let mut tx = transmitter::<33>(32);
        tx.link_mut().lose_chunk_acks = 1;
        let mut sender = TextSender::default();

        sender.send_text(&mut tx, b"hello world", true).unwrap();

        // delivered twice under the same id, typed once
        assert_eq!(chunks(&tx), vec![(1, 11), (1, 11)]);
        assert_eq!(tx.link().typed, b"hello world");
        assert_eq!(tx.link().stats().lost, 1);
    }

    #[test]
    fn test_validate() {
        assert!(TextConfig::default().validate().is_ok());
        let too_long = TextConfig {
            chunk_len: MAX_TEXT_LEN + 1,
            ..TextConfig::default()
        };
        assert_eq!(
            too_long.validate(),
            Err("chunk_len must be between 1 and MAX_TEXT_LEN")
        );
        let empty = TextConfig {
            chunk_len: 0,
            ..TextConfig::default()
        };
        assert!(empty.validate().is_err());
    }
}
