//! Bounded pool of marshalling buffers.
//!
//! Frames up to 32 KiB are assembled and reassembled constantly; the pool
//! hands out cleared `BytesMut` buffers and takes them back after use so the
//! steady state allocates nothing. The pool is an ordinary value owned by a
//! session and passed by `&mut`. Two sessions never share buffers.
//!
//! Growth is bounded twice: at most `max_buffers` buffers are retained, and a
//! buffer that grew past [`BufferPool::OVERSIZE_FACTOR`] times the nominal
//! capacity (after carrying a large segmented message) is dropped instead of
//! being kept around.

use bytes::BytesMut;

/// Pool of reusable buffers.
#[derive(Debug)]
pub struct BufferPool {
    free: Vec<BytesMut>,
    max_buffers: usize,
    buffer_capacity: usize,
    hits: u64,
    misses: u64,
}

impl BufferPool {
    /// Buffers larger than this multiple of the nominal capacity are not
    /// returned to the pool.
    pub const OVERSIZE_FACTOR: usize = 4;

    /// Create an empty pool.
    pub fn new(max_buffers: usize, buffer_capacity: usize) -> Self {
        Self { free: Vec::with_capacity(max_buffers), max_buffers, buffer_capacity, hits: 0, misses: 0 }
    }

    /// Take a cleared buffer, reusing a pooled one when available.
    pub fn acquire(&mut self) -> BytesMut {
        if let Some(buf) = self.free.pop() {
            self.hits += 1;
            buf
        } else {
            self.misses += 1;
            BytesMut::with_capacity(self.buffer_capacity)
        }
    }

    /// Return a buffer to the pool.
    ///
    /// The buffer is cleared. It is dropped if the pool is full or the buffer
    /// is oversized.
    pub fn release(&mut self, mut buf: BytesMut) {
        if self.free.len() >= self.max_buffers
            || buf.capacity() > self.buffer_capacity * Self::OVERSIZE_FACTOR
        {
            return;
        }

        buf.clear();
        self.free.push(buf);
    }

    /// Buffers currently idle in the pool.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Acquisitions served from the pool.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Acquisitions that had to allocate.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(8, crate::FrameHeader::MAX_FRAME_LENGTH)
    }
}
