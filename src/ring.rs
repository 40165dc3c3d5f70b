//! Fixed-capacity byte ring of the dongle's text channel.

use crate::error::Error;
use crate::message::TextBufFree;

/// Circular byte buffer with one slot kept empty to tell full from empty.
///
/// `N` slots hold `N - 1` bytes, and `N - 1` must fit in a `u8` so the headroom can be
/// reported in a [`TextBufFree`] frame.
///
/// ```rust
/// use kbdlink::ring::TextRingBuffer;
///
/// let mut ring = TextRingBuffer::<8>::new();
/// ring.push_chunk(b"hi").unwrap();
/// assert_eq!(ring.free(), 4);
/// assert_eq!(ring.pop(), Some(b'h'));
/// ```
#[derive(Debug, Clone)]
pub struct TextRingBuffer<const N: usize> {
    buf: [u8; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> TextRingBuffer<N> {
    const SIZE_OK: () = assert!(N >= 2 && N <= 256, "ring needs 2..=256 slots");

    /// An empty ring.
    pub fn new() -> Self {
        let () = Self::SIZE_OK;
        Self {
            buf: [0; N],
            head: 0,
            tail: 0,
        }
    }

    /// Bytes the ring holds when empty.
    pub fn capacity(&self) -> usize {
        N - 1
    }

    /// Bytes currently stored.
    pub fn len(&self) -> usize {
        (self.head + N - self.tail) % N
    }

    /// Bytes that can still be pushed.
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Appends one byte. Returns `false` when full.
    pub fn push(&mut self, byte: u8) -> bool {
        let next = (self.head + 1) % N;
        if next == self.tail {
            return false;
        }
        self.buf[self.head] = byte;
        self.head = next;
        true
    }

    /// The oldest byte, without removing it.
    pub fn peek(&self) -> Option<u8> {
        (!self.is_empty()).then(|| self.buf[self.tail])
    }

    /// Removes and returns the oldest byte.
    pub fn pop(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.tail = (self.tail + 1) % N;
        Some(byte)
    }

    /// Stores a whole chunk followed by a `0` terminator, or nothing at all.
    pub fn push_chunk(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let needed = bytes.len() + 1;
        let free = self.free();
        if free < needed {
            return Err(Error::BufferFull { needed, free });
        }
        for &byte in bytes.iter().chain(core::iter::once(&0)) {
            let _ = self.push(byte);
        }
        Ok(())
    }

    /// Current headroom, as reported to the keyboard.
    pub fn headroom(&self) -> TextBufFree {
        TextBufFree {
            bytes_free: self.free() as u8,
            bytes_capacity: self.capacity() as u8,
        }
    }
}

impl<const N: usize> Default for TextRingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
