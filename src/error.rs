//! Error taxonomy of the link subsystem.
//!
//! None of these are fatal. Each one tells the caller what to do next: retry the
//! send, drop the chunk, or abandon the current screen.

/// Reasons a received or constructed frame cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum FrameError {
    /// The frame has no tag byte.
    #[error("empty frame")]
    Empty,
    /// The tag byte names no known message kind.
    #[error("unknown message tag {0}")]
    UnknownKind(u8),
    /// The frame is shorter than its kind requires.
    #[error("frame of kind {kind} truncated to {len} bytes")]
    Truncated {
        /// Tag of the truncated frame.
        kind: u8,
        /// Number of bytes present.
        len: usize,
    },
    /// The frame carries more bytes than its kind allows.
    #[error("frame of {0} bytes is too long")]
    TooLong(usize),
}

/// Errors surfaced by the radio link, the text channel and the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Error {
    /// The peer never acknowledged a frame, even after all hardware retransmits.
    #[error("no acknowledgment from the peer")]
    LinkTimeout,
    /// The receiver's text buffer cannot take a whole chunk plus its terminator.
    #[error("text buffer full: {needed} bytes needed, {free} free")]
    BufferFull {
        /// Bytes the chunk needs, terminator included.
        needed: usize,
        /// Bytes currently free.
        free: usize,
    },
    /// The receiver never reported enough headroom within the probe budget.
    #[error("headroom probing gave up after {attempts} probes")]
    ProbeExhausted {
        /// Number of probes sent.
        attempts: u16,
    },
    /// The receiver's text buffer is too small to ever take a chunk.
    #[error("text buffer of {capacity} bytes cannot hold a chunk")]
    ReceiverTooSmall {
        /// Capacity the receiver reported.
        capacity: u8,
    },
    /// A frame could not be decoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),
    /// The SPI bus to the transceiver failed.
    #[error("transceiver bus error")]
    Bus,
    /// A control pin of the transceiver failed.
    #[error("transceiver pin error")]
    Pin,
    /// A payload exceeds the transceiver's frame size.
    #[error("payload of {0} bytes exceeds the frame size")]
    PayloadTooLarge(usize),
}
