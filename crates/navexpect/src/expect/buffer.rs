//! Ring buffer for child output.
//!
//! Holds output that has not yet been consumed by a match, and doubles as the
//! bounded transcript kept for diagnostics.

use std::collections::VecDeque;
use std::fmt;

/// Default buffer capacity (1 MB).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// A ring buffer for accumulating process output.
///
/// When the maximum size is reached the oldest bytes are discarded.
#[derive(Clone)]
pub struct RingBuffer {
    /// The underlying storage.
    data: VecDeque<u8>,
    /// Maximum capacity.
    max_size: usize,
    /// Total bytes written (may exceed `max_size` due to wrapping).
    total_written: usize,
    /// Bytes discarded due to overflow.
    bytes_discarded: usize,
}

impl RingBuffer {
    /// Create a new ring buffer with the specified maximum size.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            data: VecDeque::with_capacity(max_size.min(DEFAULT_CAPACITY)),
            max_size,
            total_written: 0,
            bytes_discarded: 0,
        }
    }

    /// Append data to the buffer.
    ///
    /// If the buffer would exceed its maximum size, oldest data is discarded.
    pub fn append(&mut self, data: &[u8]) {
        self.total_written += data.len();

        // If new data alone exceeds max_size, only keep the tail
        if data.len() >= self.max_size {
            self.bytes_discarded += self.data.len() + data.len() - self.max_size;
            self.data.clear();
            let start = data.len() - self.max_size;
            self.data.extend(&data[start..]);
            return;
        }

        let needed_space = (self.data.len() + data.len()).saturating_sub(self.max_size);
        if needed_space > 0 {
            self.bytes_discarded += needed_space;
            self.data.drain(..needed_space);
        }

        self.data.extend(data);
    }

    /// Get the current buffer contents as a contiguous slice.
    #[must_use]
    pub fn as_slice(&mut self) -> &[u8] {
        self.data.make_contiguous()
    }

    /// Get the current buffer contents as a string (lossy UTF-8 conversion).
    #[must_use]
    pub fn as_str_lossy(&mut self) -> String {
        String::from_utf8_lossy(self.as_slice()).into_owned()
    }

    /// Copy the current contents out as a string (lossy UTF-8 conversion).
    #[must_use]
    pub fn snapshot(&self) -> String {
        let (head, tail) = self.data.as_slices();
        let mut bytes = Vec::with_capacity(self.data.len());
        bytes.extend_from_slice(head);
        bytes.extend_from_slice(tail);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Get the current length of the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the maximum size of the buffer.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the total bytes written to the buffer.
    #[must_use]
    pub const fn total_written(&self) -> usize {
        self.total_written
    }

    /// Get the number of bytes that have been discarded due to overflow.
    #[must_use]
    pub const fn bytes_discarded(&self) -> usize {
        self.bytes_discarded
    }

    /// Consume the first `n` bytes and return them.
    pub fn consume(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.data.len());
        self.data.drain(..n).collect()
    }

    /// Consume the first `n` bytes and return them as a string (lossy conversion).
    pub fn consume_str(&mut self, n: usize) -> String {
        let data = self.consume(n);
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Drain everything, returning it as a string (lossy conversion).
    pub fn take_str(&mut self) -> String {
        self.consume_str(self.data.len())
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("len", &self.len())
            .field("max_size", &self.max_size)
            .field("total_written", &self.total_written)
            .field("bytes_discarded", &self.bytes_discarded)
            .finish()
    }
}
